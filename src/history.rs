use bitvec::prelude::*;
use std::ops::{ RangeInclusive };

/// The widest history a fold function accepts.
pub const MAX_HISTORY_BITS: usize = 128;

/// A global history register of up to [MAX_HISTORY_BITS] bits.
///
/// Bit 0 is the most recent outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRegister {
    data: BitVec<u64, Lsb0>,
    len: usize,
}

// NOTE: This *reverses* the all of the bits and presents them in a format
// where the leftmost bit is the most-significant (index n) and the rightmost
// bit is the least-significant (index 0).
impl std::fmt::Display for HistoryRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let x: String = self.data.as_bitslice().iter().by_vals()
            .map(|b| if b { '1' } else { '0' })
            .rev()
            .collect();
        write!(f, "{}", x)
    }
}

impl HistoryRegister {
    /// Create a register with the specified length in bits.
    /// All bits in the register are initialized to zero.
    pub fn new(len: usize) -> Self {
        assert!(len > 0 && len <= MAX_HISTORY_BITS,
            "history register length {} out of range", len);
        Self {
            data: bitvec![u64, Lsb0; 0; len],
            len,
        }
    }

    /// Create a register holding the low 'len' bits of 'value'.
    pub fn from_u128(len: usize, value: u128) -> Self {
        let mut res = Self::new(len);
        let (lo, hi) = split_halves(value);
        let lo_bits = len.min(64);
        res.data[..lo_bits].store_le(lo);
        if len > 64 {
            res.data[64..].store_le(hi);
        }
        res
    }

    pub fn len(&self) -> usize { self.len }
}

impl HistoryRegister {
    /// Shift the register by 'n' bits.
    /// The bottom 'n' bits become zero, and the top 'n' bits are discarded.
    pub fn shift_by(&mut self, n: usize) {
        self.data.shift_right(n);
    }

    /// Shift a new outcome into bit 0.
    pub fn push(&mut self, outcome: crate::Outcome) {
        self.shift_by(1);
        self.data.set(0, outcome.into());
    }

    /// Return the register as the pair of 64-bit halves `(low, high)`.
    pub fn halves(&self) -> (u64, u64) {
        let lo_bits = self.len.min(64);
        let lo = self.data[..lo_bits].load_le::<u64>();
        let hi = if self.len > 64 {
            self.data[64..].load_le::<u64>()
        } else {
            0
        };
        (lo, hi)
    }

    /// Return the register as a single 128-bit value.
    pub fn as_u128(&self) -> u128 {
        let (lo, hi) = self.halves();
        join_halves(lo, hi)
    }

    /// Fold [with XOR] some slice of bits.
    ///
    /// The slice is cut into 'output_bits'-wide chunks starting from the
    /// low end. The last chunk may be narrower.
    pub fn fold(&self, range: RangeInclusive<usize>, output_bits: usize)
        -> u64
    {
        assert!(output_bits > 0 && output_bits < 64);
        let output_mask = (1u64 << output_bits) - 1;
        let slice = &self.data[range];
        let res = slice.chunks(output_bits).fold(0, |res, x| {
            res ^ x.load_le::<u64>()
        });
        res & output_mask
    }
}

/// Split a 128-bit history into `(low, high)`.
#[inline(always)]
pub fn split_halves(value: u128) -> (u64, u64) {
    (value as u64, (value >> 64) as u64)
}

/// Join `(low, high)` into a 128-bit history.
#[inline(always)]
pub fn join_halves(lo: u64, hi: u64) -> u128 {
    ((hi as u128) << 64) | lo as u128
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Outcome;

    #[test]
    fn push_and_display() {
        let mut ghr = HistoryRegister::new(8);
        ghr.push(Outcome::T);
        ghr.push(Outcome::N);
        ghr.push(Outcome::T);
        assert_eq!(ghr.to_string(), "00000101");
        assert_eq!(ghr.as_u128(), 0b101);
    }

    #[test]
    fn u128_roundtrip_across_halves() {
        let value = 0x0123_4567_89ab_cdef_fedc_ba98_7654_3210u128;
        let ghr = HistoryRegister::from_u128(128, value);
        assert_eq!(ghr.as_u128(), value);
        assert_eq!(ghr.halves(), (0xfedc_ba98_7654_3210, 0x0123_4567_89ab_cdef));
    }

    #[test]
    fn from_u128_truncates_to_len() {
        let ghr = HistoryRegister::from_u128(100, u128::MAX);
        assert_eq!(ghr.as_u128(), (1u128 << 100) - 1);
        assert_eq!(ghr.halves().1, (1u64 << 36) - 1);
    }

    #[test]
    fn oldest_bit_falls_off() {
        let mut ghr = HistoryRegister::from_u128(4, 0b1000);
        ghr.shift_by(1);
        assert_eq!(ghr.as_u128(), 0);
    }

    #[test]
    fn fold_chunks() {
        let ghr = HistoryRegister::from_u128(16, 0x00ff);
        assert_eq!(ghr.fold(0..=15, 8), 0xff);

        // 0b1111_11111_11111 -> 0b11111 ^ 0b11111 ^ 0b11
        let ghr = HistoryRegister::from_u128(12, 0xfff);
        assert_eq!(ghr.fold(0..=11, 5), 0b00011);
    }
}
