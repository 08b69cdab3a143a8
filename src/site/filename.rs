//! Output path helpers shared by site modules.

/// Maps a title to a single safe path component.
///
/// Path separators, characters reserved on common filesystems and control
/// characters each become `_`. Everything else, spaces included, is kept so
/// the directory name follows the title. Leading and trailing whitespace and
/// dots are stripped. Returns `fallback` when nothing usable remains.
pub(crate) fn sanitize_path_component(value: &str, fallback: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = mapped.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for the `index`-th (1-based) page image.
pub(crate) fn page_file_name(index: usize) -> String {
    format!("{index:03}.png")
}
