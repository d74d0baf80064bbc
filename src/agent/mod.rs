//! Public session façade.

pub mod app;

pub use app::{App, TurnStream};
