//! Conversion of video titles into names that are safe to use as a file stem
//! on all major platforms.

const FALLBACK_NAME: &str = "untitled";
const MAX_NAME_CHARS: usize = 200;
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
// Windows refuses these as file stems regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Produce a filesystem safe name from a raw title. Never fails and never
/// returns an empty string.
pub fn sanitize_title(raw_title: &str) -> String {
    let replaced = raw_title
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                ' '
            } else {
                c
            }
        })
        .collect::<String>();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated = collapsed.chars().take(MAX_NAME_CHARS).collect::<String>();
    let trimmed = truncated
        .trim_start_matches(['.', ' '])
        .trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    if RESERVED_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(trimmed))
    {
        return format!("{trimmed}_");
    }
    trimmed.to_string()
}
