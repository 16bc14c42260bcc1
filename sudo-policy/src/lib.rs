//! # SGNL sudo policy plugin
//!
//! A sudo policy plugin that defers every invocation to the SGNL access
//! service. The decision logic lives in [policy]; [ffi] binds it to the
//! sudo plugin ABI and owns the pointer discipline across that boundary.

pub mod command_info;
pub mod ffi;
pub mod policy;
pub mod principal;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
