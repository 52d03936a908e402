use std::path::Path;

/// Derive a document title: the first line when it is a level-1 heading,
/// otherwise the file name without its extension.
#[must_use]
pub fn derive_title(content: &str, path: &Path) -> String {
    let first_line = content.lines().next().unwrap_or("");
    if let Some(rest) = first_line.strip_prefix("# ") {
        let title = rest.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
