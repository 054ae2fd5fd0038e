pub struct FileSizeUtils;

impl FileSizeUtils {
    /// Human readable size for upload limits and the selected-file list.
    pub fn format_size(size: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

        if size < 1024 {
            return format!("{} {}", size, UNITS[0]);
        }

        let mut value = size as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::FileSizeUtils;

    #[test]
    fn formats_common_sizes() {
        assert_eq!(FileSizeUtils::format_size(0), "0 B");
        assert_eq!(FileSizeUtils::format_size(1023), "1023 B");
        assert_eq!(FileSizeUtils::format_size(1536), "1.50 KB");
        assert_eq!(FileSizeUtils::format_size(10 * 1024 * 1024), "10.00 MB");
    }
}
