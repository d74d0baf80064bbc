//! Builtin tools: shell introspection and SQL schema inspection.
//!
//! These are the reference tools advertised to the model: `is_installed`,
//! `get_command_info`, `sql_commands_available`, `list_tables`, and
//! `get_table_schema`. Each is constructed via [`AgentTool::new`] and
//! returned as `Arc<dyn Tool>`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::db::Database;
use super::tool::{AgentTool, Tool};
use super::types::ToolParameters;
use crate::error::CmdsageError;
use crate::util::timeout::with_timeout;

const DOC_OUTPUT_MAX_BYTES: usize = 32_768;
const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(3);

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s[..cutoff].to_string()
}

/// Search `PATH` for an executable with the given name.
fn executable_on_path(name: &str) -> bool {
    if name.is_empty() || name.contains('/') {
        // Relative or absolute paths are checked directly.
        return Path::new(name).is_file();
    }
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
}

/// Run a command with the bounded subprocess timeout, capturing stdout.
async fn capture_output(
    program: &str,
    args: &[&str],
    include_stderr: bool,
) -> Result<Option<String>, CmdsageError> {
    let mut command = tokio::process::Command::new(program);
    command.args(args);
    if include_stderr {
        command.stderr(std::process::Stdio::piped());
    } else {
        command.stderr(std::process::Stdio::null());
    }

    let output = with_timeout(SUBPROCESS_TIMEOUT, async {
        command
            .output()
            .await
            .map_err(|e| CmdsageError::tool(program, e.to_string()))
    })
    .await?;

    if !output.status.success() {
        return Ok(None);
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if include_stderr {
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    Ok(Some(text))
}

/// `is_installed`: whether an executable with the given name is on `PATH`.
pub fn is_installed_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "is_installed",
        "Check whether an executable with the given name is installed",
        ToolParameters::object()
            .string("executable", "The name of the executable, e.g. curl", true)
            .build(),
        |args| async move {
            let executable = args.get_str("executable")?;
            Ok(json!({ "installed": executable_on_path(executable) }))
        },
    ))
}

/// `get_command_info`: documentation for a command via `man`, falling back
/// to `--help` and `-h`. Each subprocess is bounded by a 3-second timeout.
pub fn get_command_info_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_command_info",
        "Retrieve documentation for a command with man if available, otherwise with --help",
        ToolParameters::object()
            .string("command", "The name of the command, e.g. curl", true)
            .build(),
        |args| async move {
            let command = args.get_str("command")?.to_string();

            if executable_on_path("man") {
                match capture_output("man", &[&command], false).await {
                    Ok(Some(page)) => {
                        return Ok(json!({
                            "documentation": truncate_utf8(&page, DOC_OUTPUT_MAX_BYTES)
                        }));
                    }
                    Ok(None) => {} // no man page, try the help flags
                    Err(CmdsageError::Timeout(_)) => {
                        return Ok(json!({ "documentation": "man page lookup timed out" }));
                    }
                    Err(e) => return Err(e),
                }
            }

            for help_flag in ["--help", "-h"] {
                if let Ok(Some(help)) = capture_output(&command, &[help_flag], true).await {
                    return Ok(json!({
                        "documentation": truncate_utf8(&help, DOC_OUTPUT_MAX_BYTES)
                    }));
                }
            }

            Ok(json!({
                "documentation": format!("No documentation found for {command}.")
            }))
        },
    ))
}

/// `sql_commands_available`: whether a relational store is configured.
pub fn sql_commands_available_tool(db: Option<Arc<Database>>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "sql_commands_available",
        "Check whether SQL schema inspection is available",
        ToolParameters::empty(),
        move |_args| {
            let available = db.is_some();
            async move { Ok(json!({ "available": available })) }
        },
    ))
}

/// `list_tables`: user-defined tables in the configured database.
pub fn list_tables_tool(db: Option<Arc<Database>>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "list_tables",
        "List all user-defined tables in the configured database",
        ToolParameters::empty(),
        move |_args| {
            let db = db.clone();
            async move {
                let db = db.ok_or_else(|| {
                    CmdsageError::tool("list_tables", "no database connection string configured")
                })?;
                let tables = db.list_tables().await?;
                Ok(json!({ "tables": tables }))
            }
        },
    ))
}

/// `get_table_schema`: column and index metadata for one table.
pub fn get_table_schema_tool(db: Option<Arc<Database>>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_table_schema",
        "Retrieve column, key, and index metadata for a table",
        ToolParameters::object()
            .string("table_name", "The name of the table to describe", true)
            .build(),
        move |args| {
            let db = db.clone();
            async move {
                let table = args.get_str("table_name")?;
                let db = db.ok_or_else(|| {
                    CmdsageError::tool(
                        "get_table_schema",
                        "no database connection string configured",
                    )
                })?;
                db.table_schema(table).await
            }
        },
    ))
}

/// The full builtin catalog.
pub fn all_tools(db: Option<Arc<Database>>) -> Vec<Arc<dyn Tool>> {
    vec![
        is_installed_tool(),
        get_command_info_tool(),
        sql_commands_available_tool(db.clone()),
        list_tables_tool(db.clone()),
        get_table_schema_tool(db),
    ]
}
