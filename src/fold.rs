//! Folding a global history register into a table index.

pub mod spec;
pub mod interp;

#[cfg(test)]
mod proptests;

pub use spec::*;
pub use interp::*;

/// Interface to something that folds history for one [FoldSpec].
///
/// The interpreted folder, the lowered [crate::jit::FoldProgram] and the
/// native [crate::jit::GeneratedFold] all implement this, and must agree
/// bit-for-bit under the current scheme.
pub trait FoldAlgorithm {
    /// A short name for diagnostics.
    fn name(&self) -> &'static str;

    /// The parameters this fold is bound to.
    fn spec(&self) -> FoldSpec;

    /// Fold a 128-bit history. Only the low 'chunk_width' bits of the
    /// result may be set.
    fn fold(&self, ghr: u128) -> u64;
}
