pub mod autopilot;
pub mod config;
pub mod runtime;

pub use runtime::{ClientCommand, ClientEvent, ClientSessionConfig, Notice, spawn_client_session};
