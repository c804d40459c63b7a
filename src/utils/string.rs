//! String helpers for previews and tool-call display.
//!
//! The preview helpers take the first (or last) N Unicode scalar values
//! instead of slicing by byte index, which can panic on multibyte characters.

use std::path::Path;

use serde_json::Value;

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return the last `n` characters of `s` as a `String` (no ellipsis).
pub fn suffix_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Strip the current working directory prefix from a path for display.
pub fn clean_path(path: &str) -> String {
    match std::env::current_dir() {
        Ok(cwd) => clean_path_in(path, &cwd),
        Err(_) => path.to_string(),
    }
}

/// Strip `cwd` from the front of `path`. The directory itself becomes `"."`.
/// Paths outside `cwd` are returned unchanged.
pub fn clean_path_in(path: &str, cwd: &Path) -> String {
    let cwd = cwd.to_string_lossy();
    match path.strip_prefix(cwd.as_ref()) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                ".".to_string()
            } else {
                rest.to_string()
            }
        }
        _ => path.to_string(),
    }
}

/// Render tool arguments for prompts and announcements, e.g.
/// `file_path='src/main.rs', recursive=true`.
///
/// `file_paths` lists are shown as bare comma-separated paths.
pub fn format_tool_args(args: &Value) -> String {
    let Some(map) = args.as_object() else {
        return args.to_string();
    };

    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}='{}'", key, clean_path(s)),
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let paths: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(clean_path)
                    .collect();
                if key == "file_paths" {
                    paths.join(", ")
                } else {
                    let quoted: Vec<String> = paths.iter().map(|p| format!("'{}'", p)).collect();
                    format!("{}=[{}]", key, quoted.join(", "))
                }
            }
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
