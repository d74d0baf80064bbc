//! CLI argument parsing and console rendering.

use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::types::{FinalResponse, Role, Turn, TurnBody};

/// Translate a natural-language request into a shell or SQL command.
#[derive(Debug, Parser)]
#[command(name = "cmdsage", version, about)]
pub struct Cli {
    /// The instruction, e.g. `cmdsage list all files in the current directory`.
    #[arg(required = true, num_args = 1..)]
    pub instruction: Vec<String>,

    /// Resume an existing session by id instead of starting a new one.
    #[arg(long, value_name = "SESSION_ID")]
    pub resume: Option<String>,

    /// Print intermediate turns (tool activity) as they happen.
    #[arg(long)]
    pub stream: bool,

    /// Model identifier override.
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Session directory override.
    #[arg(long, value_name = "DIR")]
    pub session_dir: Option<PathBuf>,
}

impl Cli {
    /// The instruction words joined into one request.
    pub fn instruction_text(&self) -> String {
        self.instruction.join(" ")
    }
}

/// Print the final structured answer.
pub fn render_final(response: &FinalResponse) {
    println!(
        "COMMAND: {}\nCONFIDENCE: {}\nEXPLANATION: {}",
        response.command.as_deref().unwrap_or("<none>"),
        response.confidence,
        response.explanation,
    );
}

/// Print one intermediate turn in streaming mode.
pub fn render_turn(turn: &Result<Turn>) {
    let turn = match turn {
        Ok(turn) => turn,
        Err(e) => {
            eprintln!("error: {e}");
            return;
        }
    };
    match (&turn.role, &turn.body) {
        (Role::System, _) => {}
        (Role::User, TurnBody::Text { text }) => println!("> {text}"),
        (Role::Agent, TurnBody::Text { text }) => println!("[agent] {text}"),
        (Role::Agent, TurnBody::ToolCalls { calls }) => {
            for call in calls {
                println!("[tool call] {}({})", call.tool_name, call.arguments);
            }
        }
        (Role::ToolResult, TurnBody::ToolResult { result }) => match (&result.output, &result.error)
        {
            (Some(output), _) => println!("[tool result] {output}"),
            (None, Some(error)) => println!("[tool error] {error}"),
            (None, None) => {}
        },
        _ => {}
    }
}
