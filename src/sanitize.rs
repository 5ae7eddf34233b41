//! Strips tracking junk from YouTube links before they reach yt-dlp.

use url::Url;

/// Return a cleaned copy of `raw` for YouTube links, or `raw` itself.
///
/// `youtube.com/watch` keeps only `v` and `list`; `youtu.be` loses its whole
/// query. Other hosts are left alone.
pub fn sanitize_url(raw: &str) -> String {
    let input = raw.trim();
    let Ok(parsed) = Url::parse(input) else {
        return input.to_string();
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();

    let cleaned = if host.contains("youtube.com") && parsed.path() == "/watch" {
        clean_watch_url(&parsed)
    } else if host.contains("youtu.be") {
        let mut short = parsed.clone();
        short.set_query(None);
        short.set_fragment(None);
        Some(short)
    } else {
        None
    };

    match cleaned.map(String::from) {
        Some(clean) if clean != input => {
            tracing::debug!(from = input, to = %clean, "sanitized url");
            clean
        }
        _ => input.to_string(),
    }
}

fn clean_watch_url(parsed: &Url) -> Option<Url> {
    let first = |key: &str| {
        parsed
            .query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };
    let video = first("v");
    let list = first("list");
    if video.is_none() && list.is_none() {
        return None;
    }

    let mut clean = parsed.clone();
    clean.set_fragment(None);
    clean.set_query(None);
    {
        let mut pairs = clean.query_pairs_mut();
        if let Some(v) = &video {
            pairs.append_pair("v", v);
        }
        if let Some(list) = &list {
            pairs.append_pair("list", list);
        }
    }
    Some(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_video_and_list_only() {
        let raw = "https://www.youtube.com/watch?v=abc123&list=PL9&index=4&si=track&t=42";
        assert_eq!(
            sanitize_url(raw),
            "https://www.youtube.com/watch?v=abc123&list=PL9"
        );
    }

    #[test]
    fn list_order_is_normalized() {
        let raw = "https://youtube.com/watch?list=PL9&feature=share&v=abc";
        assert_eq!(sanitize_url(raw), "https://youtube.com/watch?v=abc&list=PL9");
    }

    #[test]
    fn blank_params_are_dropped() {
        let raw = "https://www.youtube.com/watch?v=&list=PL1&si=x";
        assert_eq!(sanitize_url(raw), "https://www.youtube.com/watch?list=PL1");
    }

    #[test]
    fn short_links_drop_query() {
        assert_eq!(
            sanitize_url("https://youtu.be/abc123?si=xyz"),
            "https://youtu.be/abc123"
        );
    }

    #[test]
    fn watch_without_params_is_untouched() {
        let raw = "https://www.youtube.com/watch?feature=share";
        assert_eq!(sanitize_url(raw), raw);
    }

    #[test]
    fn other_hosts_and_paths_are_untouched() {
        let vimeo = "https://vimeo.com/12345?share=copy";
        assert_eq!(sanitize_url(vimeo), vimeo);

        let shorts = "https://www.youtube.com/shorts/abc?feature=share";
        assert_eq!(sanitize_url(shorts), shorts);
    }

    #[test]
    fn garbage_is_returned_trimmed() {
        assert_eq!(sanitize_url("  not a url  "), "not a url");
        assert_eq!(sanitize_url(""), "");
    }

    #[test]
    fn clean_input_is_returned_as_is() {
        let raw = "https://www.youtube.com/watch?v=abc123";
        assert_eq!(sanitize_url(raw), raw);
    }
}
