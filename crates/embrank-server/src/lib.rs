//! HTTP surfaces and process modes for the embrank binary.

pub mod gateway;
pub mod mode;

pub use mode::{ModeError, ServerMode};
