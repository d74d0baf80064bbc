//! cmdsage: a conversational agent that turns natural-language requests
//! into shell and SQL command recommendations.
//!
//! The core is a turn-based loop: the model either requests a wave of tool
//! calls (shell introspection, SQL schema inspection) or signals it is done,
//! at which point a structured finalize call produces a
//! [`FinalResponse`](types::FinalResponse). Every turn is durably appended
//! to a [`SessionStore`](session::SessionStore), so a conversation can be
//! paused and resumed by its opaque session id.
//!
//! # Quick start
//!
//! ```no_run
//! use cmdsage::agent::App;
//! use cmdsage::config::CmdsageConfig;
//!
//! # async fn example() -> cmdsage::error::Result<()> {
//! let app = App::new(&CmdsageConfig::from_env())?;
//! let (session_id, response) = app.start("list all files in the current directory").await?;
//! println!("{session_id}: {:?}", response.command);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod prompt;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;
