use eframe::egui::ColorImage;

/// Download and decode a thumbnail for display next to the fetched media.
///
/// Any network or decoding failure yields `None`; thumbnails are cosmetic.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    let resp = match reqwest::blocking::get(url).and_then(|r| r.error_for_status()) {
        Ok(resp) => resp.bytes().ok()?,
        Err(err) => {
            tracing::debug!(url, error = %err, "thumbnail fetch failed");
            return None;
        }
    };
    decode_thumbnail(&resp)
}

/// Decode image bytes into an egui image, shrinking large thumbnails.
pub fn decode_thumbnail(bytes: &[u8]) -> Option<ColorImage> {
    let img = image::load_from_memory(bytes).ok()?;
    let img = if img.width() > 320 {
        img.thumbnail(320, 320)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_small_images_as_is() {
        let image = decode_thumbnail(&png(4, 3)).unwrap();
        assert_eq!(image.size, [4, 3]);
    }

    #[test]
    fn shrinks_large_images() {
        let image = decode_thumbnail(&png(640, 480)).unwrap();
        assert_eq!(image.size, [320, 240]);
    }

    #[test]
    fn garbage_is_ignored() {
        assert!(decode_thumbnail(b"not an image").is_none());
    }
}
