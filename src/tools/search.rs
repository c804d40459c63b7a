//! File search tools: glob matching and regex content search.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::RegexBuilder;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::display::OutputEvent;
use crate::error::Result;

use super::{
    announce, opt_bool, opt_str, opt_usize, required_str, Tool, ToolContext, ToolParam,
};

/// Finds files matching a glob pattern, newest first.
pub struct GlobFilesTool;

impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "glob_files"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new(
                "pattern",
                "string",
                "Glob pattern to match (e.g., \"*.py\", \"**/*.json\")",
            ),
            ToolParam::new(
                "base_dir",
                "string",
                "Base directory to start the search from (defaults to current directory)",
            ),
            ToolParam::new(
                "recursive",
                "boolean",
                "Whether to search recursively (automatically set to true for \"**\" patterns)",
            ),
            ToolParam::new(
                "include_hidden",
                "boolean",
                "Whether to include hidden files (starting with .)",
            ),
        ]
    }

    fn required(&self) -> Option<Vec<String>> {
        Some(vec!["pattern".to_string()])
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = required_str(&args, "pattern")?;
        let base_dir = opt_str(&args, "base_dir").unwrap_or(".");
        let include_hidden = opt_bool(&args, "include_hidden", false);
        announce(ctx, self.name(), &args);

        let base = ctx.resolve_path(base_dir);
        let base = base.canonicalize().unwrap_or(base);
        if !base.is_dir() {
            ctx.emit(OutputEvent::Error(format!(
                "Base directory does not exist or is not a directory: {}",
                base.display()
            )));
            return Ok(json!([]));
        }

        Ok(json!(glob_in(&base, pattern, include_hidden)))
    }
}

/// Match `pattern` under `base`. `**` always recurses. Invalid patterns match
/// nothing.
fn glob_in(base: &Path, pattern: &str, include_hidden: bool) -> Vec<String> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&base.to_string_lossy()),
        pattern
    );
    let options = glob::MatchOptions {
        require_literal_leading_dot: !include_hidden,
        ..glob::MatchOptions::new()
    };

    let Ok(paths) = glob::glob_with(&full, options) else {
        debug!(pattern = %full, "Invalid glob pattern");
        return Vec::new();
    };

    let mut matches: Vec<(PathBuf, SystemTime)> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            include_hidden
                || !p
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
        })
        .map(|p| {
            let modified = std::fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (p, modified)
        })
        .collect();

    matches.sort_by(|a, b| b.1.cmp(&a.1));
    matches
        .into_iter()
        .map(|(p, _)| p.to_string_lossy().to_string())
        .collect()
}

/// Searches file contents for a regular expression.
///
/// Returns an object mapping each file with matches to `[[line_no, text], ...]`.
pub struct GrepFilesTool;

impl Tool for GrepFilesTool {
    fn name(&self) -> &str {
        "grep_files"
    }

    fn description(&self) -> &str {
        "Search file contents for a regular expression pattern"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new(
                "pattern",
                "string",
                "Regular expression pattern to search for in file contents",
            ),
            ToolParam::string_list(
                "file_paths",
                "List of specific file paths to search (optional)",
            ),
            ToolParam::new(
                "directory",
                "string",
                "Directory to search in (optional, default: current directory)",
            ),
            ToolParam::new(
                "include_pattern",
                "string",
                "File pattern to include (e.g., \"*.py\", \"*.{js,ts}\")",
            ),
            ToolParam::new(
                "recursive",
                "boolean",
                "Whether to search subdirectories recursively (default: true)",
            ),
            ToolParam::new(
                "case_sensitive",
                "boolean",
                "Whether the search should be case-sensitive",
            ),
            ToolParam::new(
                "include_hidden",
                "boolean",
                "Whether to include hidden files (starting with .)",
            ),
            ToolParam::new("max_results", "integer", "Maximum number of results to return"),
            ToolParam::new(
                "context_lines",
                "integer",
                "Number of context lines to include before and after matches",
            ),
        ]
    }

    fn required(&self) -> Option<Vec<String>> {
        Some(vec!["pattern".to_string()])
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = required_str(&args, "pattern")?;
        let options = GrepOptions {
            recursive: opt_bool(&args, "recursive", true),
            include_hidden: opt_bool(&args, "include_hidden", false),
            max_results: opt_usize(&args, "max_results", 1000),
            context_lines: opt_usize(&args, "context_lines", 0),
        };
        announce(ctx, self.name(), &args);

        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(!opt_bool(&args, "case_sensitive", false))
            .build()
        {
            Ok(re) => re,
            Err(e) => return Ok(error_result(&format!("Invalid regex pattern: {}", e))),
        };

        let file_paths: Vec<String> = args
            .get("file_paths")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let directory = opt_str(&args, "directory").filter(|d| !d.is_empty());
        let include_pattern = opt_str(&args, "include_pattern").filter(|p| !p.is_empty());

        let files = if !file_paths.is_empty() {
            let mut files = Vec::new();
            for path in &file_paths {
                let resolved = ctx.resolve_path(path);
                let resolved = resolved.canonicalize().unwrap_or(resolved);
                if resolved.is_file() {
                    files.push(resolved);
                } else {
                    ctx.emit(OutputEvent::Warning(format!("{} is not a file", path)));
                }
            }
            files
        } else if directory.is_some() || include_pattern.is_some() {
            let dir = directory.unwrap_or(".");
            let base = ctx.resolve_path(dir);
            let base = base.canonicalize().unwrap_or(base);
            if !base.is_dir() {
                return Ok(error_result(&format!("{} is not a valid directory", dir)));
            }
            collect_files(&base, options.recursive, options.include_hidden, include_pattern)
        } else {
            let base = ctx.resolve_path(".");
            let base = base.canonicalize().unwrap_or(base);
            collect_files(&base, false, options.include_hidden, None)
        };

        ctx.emit(OutputEvent::Notice(format!("Searching in: {} files", files.len())));
        let (result, total) = search_files(&files, &regex, &options, ctx);
        ctx.emit(OutputEvent::Notice(format!(
            "Found: {} matches in {} files",
            total,
            result.len()
        )));
        Ok(Value::Object(result))
    }
}

struct GrepOptions {
    recursive: bool,
    include_hidden: bool,
    max_results: usize,
    context_lines: usize,
}

fn error_result(message: &str) -> Value {
    json!({ "error": [[-1, message]] })
}

/// Files under `base`, sorted by path.
fn collect_files(
    base: &Path,
    recursive: bool,
    include_hidden: bool,
    include_pattern: Option<&str>,
) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![base.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(read) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut entries: Vec<_> = read.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            if !include_hidden && name.starts_with('.') {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            // Symlinked directories are never descended into.
            if file_type.is_dir() {
                if recursive {
                    stack.push(path);
                }
            } else if path.is_file()
                && include_pattern.map_or(true, |p| matches_include_pattern(&name, p))
            {
                out.push(path);
            }
        }
    }

    out.sort();
    out
}

/// Match a file name against `*.ext`, `prefix*`, an exact name, or a single
/// brace group such as `*.{js,ts}`.
pub fn matches_include_pattern(filename: &str, pattern: &str) -> bool {
    if let (Some(open), Some(close)) = (pattern.find('{'), pattern.find('}')) {
        if open < close {
            let prefix = &pattern[..open];
            let suffix = &pattern[close + 1..];
            return pattern[open + 1..close]
                .split(',')
                .any(|alt| simple_match(filename, &format!("{}{}{}", prefix, alt, suffix)));
        }
    }
    simple_match(filename, pattern)
}

fn simple_match(filename: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        filename.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        filename.starts_with(prefix)
    } else {
        filename == pattern
    }
}

/// Search `files` line by line. The budget counts matches, not context lines.
fn search_files(
    files: &[PathBuf],
    regex: &regex::Regex,
    options: &GrepOptions,
    ctx: &ToolContext,
) -> (Map<String, Value>, usize) {
    let mut result = Map::new();
    let mut total = 0usize;

    for file in files {
        if total >= options.max_results {
            ctx.emit(OutputEvent::Warning(format!(
                "Reached maximum results limit ({})",
                options.max_results
            )));
            break;
        }

        let bytes = match std::fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                ctx.emit(OutputEvent::Warning(format!(
                    "Error reading {}: {}",
                    file.display(),
                    e
                )));
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();

        let mut matches = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            let start = idx.saturating_sub(options.context_lines);
            let end = (idx + options.context_lines + 1).min(lines.len());
            for (j, text) in lines.iter().enumerate().take(end).skip(start) {
                matches.push(json!([j + 1, text]));
            }
            total += 1;
            if total >= options.max_results {
                break;
            }
        }

        if !matches.is_empty() {
            result.insert(file.to_string_lossy().to_string(), Value::Array(matches));
        }
    }

    (result, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySink;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ctx_in(dir: &Path) -> ToolContext {
        ToolContext::new(Arc::new(MemorySink::new())).with_workspace(dir)
    }

    fn names(paths: &Value) -> Vec<String> {
        let mut names: Vec<String> = paths
            .as_array()
            .unwrap()
            .iter()
            .map(|p| {
                Path::new(p.as_str().unwrap())
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_glob_top_level_only() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("sub/b.rs"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.rs"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();
        let ctx = ctx_in(dir.path());

        let result = GlobFilesTool.execute(json!({"pattern": "*.rs"}), &ctx).unwrap();
        assert_eq!(names(&result), vec!["a.rs"]);

        let result = GlobFilesTool
            .execute(json!({"pattern": "**/*.rs"}), &ctx)
            .unwrap();
        assert_eq!(names(&result), vec!["a.rs", "b.rs"]);

        let result = GlobFilesTool
            .execute(json!({"pattern": "*.rs", "include_hidden": true}), &ctx)
            .unwrap();
        assert_eq!(names(&result), vec![".hidden.rs", "a.rs"]);
    }

    #[test]
    fn test_glob_skips_directories_and_bad_base() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder.rs")).unwrap();
        let ctx = ctx_in(dir.path());

        let result = GlobFilesTool.execute(json!({"pattern": "*.rs"}), &ctx).unwrap();
        assert_eq!(result, json!([]));

        let result = GlobFilesTool
            .execute(json!({"pattern": "*", "base_dir": "missing"}), &ctx)
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[test]
    fn test_include_pattern_matching() {
        assert!(matches_include_pattern("main.rs", "*.rs"));
        assert!(!matches_include_pattern("main.rs", "*.py"));
        assert!(matches_include_pattern("test_utils.py", "test_*"));
        assert!(matches_include_pattern("Makefile", "Makefile"));
        assert!(matches_include_pattern("app.ts", "*.{js,ts}"));
        assert!(matches_include_pattern("app.js", "*.{js,ts}"));
        assert!(!matches_include_pattern("app.rs", "*.{js,ts}"));
    }

    #[test]
    fn test_grep_directory_recursive() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "Alpha release\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = GrepFilesTool
            .execute(json!({"pattern": "alpha", "directory": "."}), &ctx)
            .unwrap();
        let map = result.as_object().unwrap();
        assert_eq!(map.len(), 2);
        let lib = map
            .iter()
            .find(|(k, _)| k.ends_with("lib.rs"))
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(lib, json!([[1, "fn alpha() {}"]]));

        let result = GrepFilesTool
            .execute(
                json!({"pattern": "alpha", "directory": ".", "case_sensitive": true, "include_pattern": "*.rs"}),
                &ctx,
            )
            .unwrap();
        assert_eq!(result.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_grep_context_and_budget() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("log.txt"), "a\nhit 1\nb\nc\nhit 2\nd\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = GrepFilesTool
            .execute(
                json!({"pattern": "hit", "file_paths": ["log.txt"], "context_lines": 1}),
                &ctx,
            )
            .unwrap();
        let lines = result.as_object().unwrap().values().next().unwrap().clone();
        assert_eq!(
            lines,
            json!([[1, "a"], [2, "hit 1"], [3, "b"], [4, "c"], [5, "hit 2"], [6, "d"]])
        );

        let result = GrepFilesTool
            .execute(
                json!({"pattern": "hit", "file_paths": ["log.txt"], "max_results": 1}),
                &ctx,
            )
            .unwrap();
        let lines = result.as_object().unwrap().values().next().unwrap().clone();
        assert_eq!(lines, json!([[2, "hit 1"]]));
    }

    #[test]
    fn test_grep_errors() {
        let dir = tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let result = GrepFilesTool.execute(json!({"pattern": "("}), &ctx).unwrap();
        let err = &result["error"][0];
        assert_eq!(err[0], -1);
        assert!(err[1].as_str().unwrap().starts_with("Invalid regex pattern:"));

        let result = GrepFilesTool
            .execute(json!({"pattern": "x", "directory": "nowhere"}), &ctx)
            .unwrap();
        assert_eq!(result, json!({"error": [[-1, "nowhere is not a valid directory"]]}));
    }

    #[cfg(unix)]
    #[test]
    fn test_grep_skips_symlinked_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), "needle\n").unwrap();
        std::os::unix::fs::symlink("..", dir.path().join("sub/up")).unwrap();
        std::os::unix::fs::symlink("a.txt", dir.path().join("sub/link.txt")).unwrap();
        let ctx = ctx_in(dir.path());

        let result = GrepFilesTool
            .execute(json!({"pattern": "needle", "directory": "."}), &ctx)
            .unwrap();
        let mut found: Vec<&String> = result.as_object().unwrap().keys().collect();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("sub/a.txt"));
        assert!(found[1].ends_with("sub/link.txt"));
    }
}
