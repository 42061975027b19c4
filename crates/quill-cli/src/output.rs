//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use quill_core::{SyncProgress, SyncResult};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print one progress event of a running sync
    ///
    /// Human mode prints status lines, JSON mode prints one object per
    /// event, quiet mode prints nothing.
    pub fn print_progress(&self, event: &SyncProgress) {
        match self.format {
            OutputFormat::Human => println!("{}", event),
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{}", line);
                }
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print the end-of-run summary
    pub fn print_summary(&self, action: &str, folder: Option<&Path>, result: &SyncResult) {
        match self.format {
            OutputFormat::Human => {
                println!();
                match folder {
                    Some(folder) => println!("{} into {}", action, folder.display()),
                    None => println!("{}", action),
                }
                println!("  {}", result);
                if !result.errors.is_empty() {
                    println!();
                    println!("── Errors ({}) ──", result.errors.len());
                    for error in &result.errors {
                        println!("  {}", error);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", summary_json(action, folder, result));
            }
            OutputFormat::Quiet => {
                for error in &result.errors {
                    eprintln!("{}", error);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn summary_json(action: &str, folder: Option<&Path>, result: &SyncResult) -> serde_json::Value {
    serde_json::json!({
        "status": if result.has_failures() { "partial" } else { "success" },
        "action": action,
        "folder": folder,
        "created": result.created,
        "updated": result.updated,
        "unchanged": result.skipped,
        "removed": result.removed,
        "failed": result.failed,
        "errors": result.errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_summary_json() {
        let result = SyncResult {
            created: 1,
            skipped: 4,
            failed: 1,
            errors: vec!["row-2: Remote returned 400".to_string()],
            ..SyncResult::default()
        };
        let json = summary_json("Refreshed", Some(Path::new("Remote/Tasks")), &result);

        assert_eq!(json["status"], "partial");
        assert_eq!(json["folder"], "Remote/Tasks");
        assert_eq!(json["unchanged"], 4);
        assert_eq!(json["errors"][0], "row-2: Remote returned 400");
    }

    #[test]
    fn test_summary_json_success() {
        let json = summary_json("Imported", None, &SyncResult::default());
        assert_eq!(json["status"], "success");
        assert!(json["folder"].is_null());
    }
}
