//! Tool system: registry, call contract, and the builtin shell/SQL tools.

pub mod arguments;
pub mod builtin;
pub mod db;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::ToolRegistry;
pub use tool::{AgentTool, Tool};
pub use types::ToolParameters;
