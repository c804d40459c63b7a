//! Diff previews for file-changing tools.
//!
//! `write_file` and `patch_file` show a git-style diff of what they are about
//! to do and then ask for confirmation.

use std::path::Path;

use serde_json::Value;
use similar::TextDiff;

use crate::error::{Result, ZeptoError};
use crate::utils::string::clean_path;

use super::confirm::{is_affirmative, ConfirmationHandler, Prompter};
use super::types::ToolContext;

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Render a git-style diff between `old` and `new` for `path`.
///
/// An empty `old` renders as a new file. Identical contents render as an
/// empty string.
///
/// # Example
///
/// ```
/// use zeptoagent::tools::diff::create_git_diff_view;
///
/// let diff = create_git_diff_view("notes.txt", "", "hello\n");
/// assert!(diff.contains("new file mode 100644"));
/// assert!(diff.contains("+hello"));
/// ```
pub fn create_git_diff_view(path: &str, old: &str, new: &str) -> String {
    if old.is_empty() {
        let lines: Vec<&str> = new.lines().collect();
        let mut out = format!(
            "diff --git a/{p} b/{p}\nnew file mode 100644\n--- /dev/null\n+++ b/{p}\n@@ -0,0 +1,{n} @@\n",
            p = path,
            n = lines.len()
        );
        for line in lines {
            out.push('+');
            out.push_str(line);
            out.push('\n');
        }
        return out;
    }

    let old_header = format!("a/{}", path);
    let new_header = format!("b/{}", path);
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&old_header, &new_header)
        .to_string()
}

/// Preview of writing `content` to `path`. An unreadable file counts as new.
pub fn diff_for_write(path: &Path, content: &str) -> String {
    let old = std::fs::read_to_string(path).unwrap_or_default();
    create_git_diff_view(&clean_path(&path.to_string_lossy()), &old, content)
}

/// Preview of replacing every `old_content` with `new_content` in `path`.
///
/// Returns a message starting with `ERROR`/`Error` when no preview can be made.
pub fn diff_for_patch(path: &Path, old_content: &str, new_content: &str) -> String {
    let current = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => return format!("Error creating diff: {}", e),
    };
    let display = clean_path(&path.to_string_lossy());
    if old_content.is_empty() || !current.contains(old_content) {
        return format!("ERROR: Old content not found in {}", display);
    }
    let patched = current.replace(old_content, new_content);
    create_git_diff_view(&display, &current, &patched)
}

fn is_preview_error(preview: &str) -> bool {
    preview.starts_with("ERROR") || preview.starts_with("Error")
}

fn ask_for_file(tool_name: &str, file_path: &str, prompter: &mut dyn Prompter) -> Result<bool> {
    let prompt = format!(
        "Confirm {}(file_path='{}')? [Y/n] ",
        tool_name,
        clean_path(file_path)
    );
    Ok(is_affirmative(&prompter.ask(&prompt)?))
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ZeptoError::ToolValidation(format!("Missing '{}' argument", key)))
}

/// Shows the diff of a whole-file write before asking.
#[derive(Debug, Default)]
pub struct WriteConfirmation;

impl ConfirmationHandler for WriteConfirmation {
    fn confirm(
        &self,
        tool_name: &str,
        args: &Value,
        ctx: &ToolContext,
        prompter: &mut dyn Prompter,
    ) -> Result<bool> {
        let file_path = str_arg(args, "file_path")?;
        let content = str_arg(args, "content")?;
        let preview = diff_for_write(&ctx.resolve_path(file_path), content);
        if preview.is_empty() {
            prompter.show("(no changes)");
        } else {
            prompter.show(&preview);
        }
        ask_for_file(tool_name, file_path, prompter)
    }
}

/// Shows the diff of a patch before asking; rejects patches that cannot apply.
#[derive(Debug, Default)]
pub struct PatchConfirmation;

impl ConfirmationHandler for PatchConfirmation {
    fn confirm(
        &self,
        tool_name: &str,
        args: &Value,
        ctx: &ToolContext,
        prompter: &mut dyn Prompter,
    ) -> Result<bool> {
        let file_path = str_arg(args, "file_path")?;
        let old_content = str_arg(args, "old_content")?;
        let new_content = str_arg(args, "new_content")?;

        let preview = diff_for_patch(&ctx.resolve_path(file_path), old_content, new_content);
        if is_preview_error(&preview) {
            return Err(ZeptoError::ToolValidation(preview));
        }
        prompter.show(&preview);
        ask_for_file(tool_name, file_path, prompter)
    }
}
