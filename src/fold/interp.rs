//! Interpreted fold schemes on a logical 128-bit history.

use crate::config::FoldScheme;
use crate::fold::{ FoldAlgorithm, FoldSpec, low_mask };

/// Fold with the current scheme.
///
/// XOR together `times` disjoint 'chunk_width'-wide slices starting at bit 0,
/// then the trailing 'remainder'-wide slice if there is one.
pub fn fold_current(spec: &FoldSpec, mut ghr: u128) -> u64 {
    let bits = spec.chunk_width();
    let mask = spec.chunk_mask() as u128;
    let mut folded = 0u64;
    for _ in 0..spec.times() {
        folded ^= (ghr & mask) as u64;
        ghr >>= bits;
    }
    let remain = spec.remainder();
    if remain != 0 {
        folded ^= (ghr & low_mask(remain) as u128) as u64;
    }
    folded
}

/// Fold with the legacy scheme.
///
/// Masks are formed the way the legacy model formed them: `(1 << w) - 1` in
/// 32-bit signed arithmetic (see [legacy_mask]), so widths of 32 or more do
/// not give the mathematically expected mask.
pub fn fold_legacy(spec: &FoldSpec, ghr: u128) -> u64 {
    let bits = spec.chunk_width();
    let chunk_mask = legacy_mask(bits);
    let total_iter_cnt = legacy_iterations(spec);

    let mut folded = 0u64;
    for i in 0..(total_iter_cnt - 1) {
        folded = ((folded as u128 ^ (ghr >> (i * bits))) & chunk_mask) as u64;
    }

    let shift = (total_iter_cnt - 1) * bits;
    let final_mask = legacy_mask(legacy_final_width(spec));
    let last = (ghr >> shift) & final_mask;
    ((folded as u128 ^ last) & chunk_mask) as u64
}

/// `ceil(history_len / chunk_width)`.
pub fn legacy_iterations(spec: &FoldSpec) -> usize {
    spec.times() + (spec.remainder() != 0) as usize
}

/// Width of the last slice folded by the legacy scheme.
///
/// This is `history_len - (ceil(history_len / chunk_width) - 1) * chunk_width`,
/// which is a full 'chunk_width' when the history length is an exact
/// multiple of the chunk width.
pub fn legacy_final_width(spec: &FoldSpec) -> usize {
    spec.history_len() - (legacy_iterations(spec) - 1) * spec.chunk_width()
}

/// `(1 << bits) - 1` as a 32-bit signed integer, widened to 128 bits.
///
/// The shift count wraps at 32, so `bits = 32` yields zero and `bits = 40`
/// yields an 8-bit mask.
pub fn legacy_mask(bits: usize) -> u128 {
    let m = 1i32.wrapping_shl(bits as u32).wrapping_sub(1);
    m as i128 as u128
}

/// An interpreted fold bound to one [FoldSpec].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpretedFold {
    spec: FoldSpec,
    scheme: FoldScheme,
}
impl InterpretedFold {
    pub fn new(spec: FoldSpec, scheme: FoldScheme) -> Self {
        Self { spec, scheme }
    }
    pub fn scheme(&self) -> FoldScheme { self.scheme }
}
impl FoldAlgorithm for InterpretedFold {
    fn name(&self) -> &'static str {
        match self.scheme {
            FoldScheme::Current => "InterpretedFold(current)",
            FoldScheme::Legacy => "InterpretedFold(legacy)",
        }
    }
    fn spec(&self) -> FoldSpec { self.spec }
    fn fold(&self, ghr: u128) -> u64 {
        match self.scheme {
            FoldScheme::Current => fold_current(&self.spec, ghr),
            FoldScheme::Legacy => fold_legacy(&self.spec, ghr),
        }
    }
}
