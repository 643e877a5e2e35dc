//! Specializing code generation for fold functions.
//!
//! [FoldProgram] lowers a [crate::FoldSpec] into straight-line register
//! operations. On x86-64 the program is assembled into executable memory
//! (see [FoldJit]); elsewhere only the interpreted path is available.

pub mod program;

#[cfg(target_arch = "x86_64")]
pub mod x64;

pub use program::*;

#[cfg(target_arch = "x86_64")]
pub use x64::*;

/// Whether native fold functions can be generated for this target.
pub const NATIVE_SUPPORTED: bool = cfg!(target_arch = "x86_64");

/// Stand-in for the native code buffer on targets without a backend.
///
/// It has no values, so no native fold can ever be looked up in one.
#[cfg(not(target_arch = "x86_64"))]
#[derive(Debug)]
pub enum FoldCode {}
