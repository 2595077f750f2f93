//! Prelude module for convenient imports.

pub use crate::error::{Result, RunError, SandboxError};
pub use crate::sandbox::{
    capture::DebugPolicy,
    config::SandboxConfig,
    executor::{SandboxContext, SandboxRunner},
};
