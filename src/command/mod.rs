// src/command/mod.rs

//! Command definitions: the static half of a command, as opposed to the
//! process supervision in [`crate::exec`].

pub mod definition;

pub use definition::{CommandDefinition, Invocation, PACKAGE_RUNNER};
