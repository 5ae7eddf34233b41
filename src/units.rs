const LABELS: [&str; 5] = ["", "K", "M", "G", "T"];

/// Render a byte count as `"1.50 MB"`; unknown or zero sizes become `"N/A"`.
pub fn format_size(bytes: Option<u64>) -> String {
    let bytes = match bytes {
        None | Some(0) => return "N/A".to_string(),
        Some(bytes) => bytes,
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < LABELS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}B", LABELS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sizes() {
        assert_eq!(format_size(None), "N/A");
        assert_eq!(format_size(Some(0)), "N/A");
    }

    #[test]
    fn scales_through_units() {
        assert_eq!(format_size(Some(512)), "512.00 B");
        assert_eq!(format_size(Some(1024)), "1.00 KB");
        assert_eq!(format_size(Some(1536 * 1024)), "1.50 MB");
        assert_eq!(format_size(Some(3 * 1024 * 1024 * 1024)), "3.00 GB");
    }

    #[test]
    fn caps_at_terabytes() {
        let two_pib = 2u64 * 1024 * 1024 * 1024 * 1024 * 1024;
        assert_eq!(format_size(Some(two_pib)), "2048.00 TB");
    }
}
