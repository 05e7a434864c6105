use std::sync::Arc;

use regex::Regex;

use krshell_types::{CommandExecutor, ShellOutput};

use super::resources::{ResourceKind, ResourceTable};

/// Resolves resource references and image directives in shell output
///
/// Supported row forms:
/// - `@string:home_shell_01` or `@string/home_shell_01` (also `@dimen`)
/// - `@string:missing[(fallback text)]`, used when the lookup fails
/// - `@img:/sdcard/pic.png` and `@img:/sdcard/pic.png[(caption)]`
#[derive(Clone)]
pub struct ShellTranslation {
    resources: Arc<dyn ResourceTable>,
    resource_regex: Regex,
    img_regex: Regex,
}

impl std::fmt::Debug for ShellTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellTranslation").finish_non_exhaustive()
    }
}

impl ShellTranslation {
    pub fn new(resources: Arc<dyn ResourceTable>) -> Self {
        Self {
            resources,
            resource_regex: Regex::new(r"(?i)^@(string|dimen)[:/]([_a-zA-Z0-9]+)(?:\[\(.*\)\])?$")
                .expect("resource pattern is valid"),
            img_regex: Regex::new(r"(?is)^@img:(.+?)(?:\[\((.*)\)\])?$")
                .expect("image pattern is valid"),
        }
    }

    /// Resolve a single row to text, ignoring image directives
    pub fn resolve_row(&self, origin_row: &str) -> String {
        let row = origin_row.trim();
        let Some(captures) = self.resource_regex.captures(row) else {
            return origin_row.to_string();
        };

        let name = &captures[2];
        let resolved = captures[1]
            .parse::<ResourceKind>()
            .and_then(|kind| self.resources.lookup(kind, name));

        match resolved {
            Ok(value) => value.render(),
            Err(_) => bracket_fallback(row)
                .map(str::to_string)
                .unwrap_or_else(|| origin_row.to_string()),
        }
    }

    /// Translate rows into text and image items
    pub fn resolve_lines<S: AsRef<str>>(&self, rows: &[S]) -> Vec<ShellOutput> {
        rows.iter()
            .map(|row| {
                let row = row.as_ref();
                match self.img_regex.captures(row.trim()) {
                    Some(captures) => {
                        let path = captures[1].trim().to_string();
                        let caption = captures
                            .get(2)
                            .map(|caption| caption.as_str().to_string())
                            .filter(|caption| !caption.is_empty());
                        ShellOutput::Image { path, caption }
                    }
                    None => ShellOutput::Text(self.resolve_row(row)),
                }
            })
            .collect()
    }

    /// Translate rows and join the text items with newlines
    pub fn resolve_rows<S: AsRef<str>>(&self, rows: &[S]) -> String {
        krshell_types::join_text(&self.resolve_lines(rows))
    }

    /// Run `shell_command` on `executor` and translate its output
    pub fn get_translated_result(&self, shell_command: &str, executor: &dyn CommandExecutor) -> String {
        let output = executor.do_cmd_sync(shell_command);
        let rows: Vec<&str> = output.split('\n').collect();
        self.resolve_rows(&rows)
    }
}

/// Literal between the first `[(` and the `)]` following it
fn bracket_fallback(row: &str) -> Option<&str> {
    let start = row.find("[(")? + 2;
    let end = row[start..].find(")]")? + start;
    Some(&row[start..end])
}
