use std::path::Path;

/// The file name without its directory.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// The name of the precinct of a batch: its file name without the extension.
/// "wards/Madison City Wards 1-3.zip" is "Madison City Wards 1-3".
pub fn precinct_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| simplify_file_name(path))
}

/// The extension in lower case, if any.
pub fn file_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|s| s.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_names() {
        let p = "wards/Madison City Wards 1-3, 5.zip";
        assert_eq!(simplify_file_name(p), "Madison City Wards 1-3, 5.zip");
        assert_eq!(precinct_name(p), "Madison City Wards 1-3, 5");
        assert_eq!(file_extension(p), Some("zip".to_string()));
        assert_eq!(file_extension("a/B.PBM"), Some("pbm".to_string()));
        assert_eq!(file_extension("a/README"), None);
    }
}
