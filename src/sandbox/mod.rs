//! Sandbox module containing all lifecycle components.

pub mod capture;
pub mod config;
pub mod directory;
pub mod executor;
pub mod matcher;
pub mod transfer;
