//! Filesystem tools for ZeptoAgent
//!
//! Whole-file read, write and patch, plus directory listing. Per-file failures
//! are reported in the result (`null` / `false`) instead of aborting a batch.
//! Relative paths resolve against the workspace in the tool context.

use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde_json::{json, Map, Value};

use crate::display::OutputEvent;
use crate::error::Result;

use super::confirm::ConfirmationHandler;
use super::diff::{PatchConfirmation, WriteConfirmation};
use super::{
    announce, opt_bool, opt_usize, required_str, string_list, ResultFormatter, Tool, ToolContext,
    ToolParam,
};

/// Reads several files in one call.
///
/// Returns an object mapping every requested path to its content, or `null`
/// when the file could not be read.
pub struct ReadFilesTool;

impl Tool for ReadFilesTool {
    fn name(&self) -> &str {
        "read_files"
    }

    fn description(&self) -> &str {
        "Read the contents of one or more files in a single operation for improved efficiency"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::string_list(
            "file_paths",
            "List of file paths to read (for efficiency, include multiple files when needed)",
        )]
    }

    fn result_formatter(&self) -> Option<ResultFormatter> {
        Some(Arc::new(format_read_result))
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let paths = string_list(&args, "file_paths")?;
        announce(ctx, self.name(), &args);

        let mut results = Map::new();
        for path in paths {
            let content = match std::fs::read_to_string(ctx.resolve_path(&path)) {
                Ok(text) => Value::String(text),
                Err(e) => {
                    ctx.emit(OutputEvent::Error(format!("Error reading file {}: {}", path, e)));
                    Value::Null
                }
            };
            results.insert(path, content);
        }
        Ok(Value::Object(results))
    }
}

/// `✓ Read N files`, or `✓ Read K/N files (F failed)` when some failed.
fn format_read_result(result: &Value) -> String {
    let Some(map) = result.as_object() else {
        return "✓ Read files".to_string();
    };
    let total = map.len();
    let failed = map.values().filter(|v| v.is_null()).count();
    if failed > 0 {
        format!("✓ Read {}/{} files ({} failed)", total - failed, total, failed)
    } else if total == 1 {
        "✓ Read 1 file".to_string()
    } else {
        format!("✓ Read {} files", total)
    }
}

/// Writes a whole file, creating parent directories. Confirmed with a diff.
pub struct WriteFileTool;

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new("file_path", "string", "Path to the file to write"),
            ToolParam::new("content", "string", "Content to write to the file"),
        ]
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_handler(&self) -> Option<Arc<dyn ConfirmationHandler>> {
        Some(Arc::new(WriteConfirmation))
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let file_path = required_str(&args, "file_path")?;
        let content = required_str(&args, "content")?;
        announce(ctx, self.name(), &json!({ "file_path": file_path }));

        let path = ctx.resolve_path(file_path);
        let written = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| std::fs::write(&path, content));

        match written {
            Ok(()) => Ok(json!(true)),
            Err(e) => {
                ctx.emit(OutputEvent::Error(format!("Error writing file: {}", e)));
                Ok(json!(false))
            }
        }
    }
}

/// Replaces every occurrence of a literal string in a file.
///
/// Fails without touching the file when the old text is absent.
pub struct PatchFileTool;

impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Patch a file by replacing specific content with new content"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new("file_path", "string", "Path to the file to patch"),
            ToolParam::new(
                "old_content",
                "string",
                "Exact content to be replaced (every occurrence is replaced)",
            ),
            ToolParam::new("new_content", "string", "New content to insert"),
        ]
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_handler(&self) -> Option<Arc<dyn ConfirmationHandler>> {
        Some(Arc::new(PatchConfirmation))
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let file_path = required_str(&args, "file_path")?;
        let old_content = required_str(&args, "old_content")?;
        let new_content = required_str(&args, "new_content")?;
        announce(ctx, self.name(), &json!({ "file_path": file_path }));

        let path = ctx.resolve_path(file_path);
        let current = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                ctx.emit(OutputEvent::Error(format!("Error patching file: {}", e)));
                return Ok(json!(false));
            }
        };

        if old_content.is_empty() || !current.contains(old_content) {
            ctx.emit(OutputEvent::Error(format!(
                "Old content not found in {}",
                file_path
            )));
            return Ok(json!(false));
        }

        match std::fs::write(&path, current.replace(old_content, new_content)) {
            Ok(()) => Ok(json!(true)),
            Err(e) => {
                ctx.emit(OutputEvent::Error(format!("Error patching file: {}", e)));
                Ok(json!(false))
            }
        }
    }
}

/// Lists a directory as a nested `{path, name, dirs, files}` structure.
pub struct ListDirectoryTool;

impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List directories and files in a given directory path"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new("directory_path", "string", "Path to the directory to list"),
            ToolParam::new(
                "show_hidden",
                "boolean",
                "Whether to include hidden files and directories (those starting with .)",
            ),
            ToolParam::new("recursive", "boolean", "Whether to list subdirectories recursively"),
            ToolParam::new(
                "max_depth",
                "integer",
                "Maximum recursion depth (only used if recursive=true)",
            ),
        ]
    }

    fn required(&self) -> Option<Vec<String>> {
        Some(vec!["directory_path".to_string()])
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let directory_path = required_str(&args, "directory_path")?;
        let show_hidden = opt_bool(&args, "show_hidden", false);
        let recursive = opt_bool(&args, "recursive", false);
        let max_depth = opt_usize(&args, "max_depth", 3);
        announce(ctx, self.name(), &args);

        let requested = ctx.resolve_path(directory_path);
        let path = requested.canonicalize().unwrap_or(requested);
        if !path.exists() {
            return Ok(json!({ "error": format!("Path does not exist: {}", path.display()) }));
        }
        if !path.is_dir() {
            return Ok(json!({ "error": format!("Not a directory: {}", path.display()) }));
        }

        match scan_directory(&path, show_hidden, recursive, max_depth, 0) {
            Ok(listing) => Ok(listing),
            Err(e) => Ok(json!({ "error": e.to_string() })),
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn scan_directory(
    path: &Path,
    show_hidden: bool,
    recursive: bool,
    max_depth: usize,
    depth: usize,
) -> std::io::Result<Value> {
    let mut entries: Vec<_> = std::fs::read_dir(path)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if !show_hidden && is_hidden(&name) {
            continue;
        }
        let entry_path = entry.path();
        let Ok(metadata) = std::fs::metadata(&entry_path) else {
            continue;
        };

        if metadata.is_dir() {
            let mut info = json!({
                "name": name,
                "path": entry_path.to_string_lossy(),
            });
            if recursive && depth < max_depth {
                if let Ok(sub) = scan_directory(&entry_path, show_hidden, recursive, max_depth, depth + 1) {
                    info["children"] = json!({ "dirs": sub["dirs"], "files": sub["files"] });
                }
            }
            dirs.push(info);
        } else if metadata.is_file() {
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            files.push(json!({
                "name": name,
                "path": entry_path.to_string_lossy(),
                "size": metadata.len(),
                "modified": modified,
            }));
        }
    }

    Ok(json!({
        "path": path.to_string_lossy(),
        "name": path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        "dirs": dirs,
        "files": files,
    }))
}
