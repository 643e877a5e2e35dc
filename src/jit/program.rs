//! Lowering a [FoldSpec] into a straight-line register program.
//!
//! The program works on a 128-bit history held as two 64-bit halves. The
//! fold loop is fully unrolled, and the lowering tracks how many unconsumed
//! history bits remain in each half so that a slice straddling the halves is
//! assembled by pulling bits down from the high half.

use crate::fold::{ FoldAlgorithm, FoldSpec, low_mask };
use crate::history::split_halves;

/// A 64-bit register used by a [FoldProgram].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    /// Low half of the history (first argument)
    Low,
    /// High half of the history (second argument)
    High,
    /// Accumulator (return value)
    Acc,
    /// Scratch
    Tmp,
}
impl Reg {
    fn slot(self) -> usize {
        match self {
            Self::Low => 0,
            Self::High => 1,
            Self::Acc => 2,
            Self::Tmp => 3,
        }
    }

    /// The x86-64 register this is assigned to under the SysV calling
    /// convention.
    pub fn x64_name(self) -> &'static str {
        match self {
            Self::Low => "rdi",
            Self::High => "rsi",
            Self::Acc => "rax",
            Self::Tmp => "rdx",
        }
    }
}

/// One instruction in a [FoldProgram]. Two-operand forms write the first
/// register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldOp {
    Zero(Reg),
    MovImm(Reg, u64),
    Mov(Reg, Reg),
    Xor(Reg, Reg),
    Or(Reg, Reg),
    And(Reg, Reg),
    Shl(Reg, u8),
    Shr(Reg, u8),
    Ret,
}

impl std::fmt::Display for FoldOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Zero(r) => write!(f, "xor {0}, {0}", r.x64_name()),
            Self::MovImm(r, imm) => write!(f, "mov {}, {:#x}", r.x64_name(), imm),
            Self::Mov(d, s) => write!(f, "mov {}, {}", d.x64_name(), s.x64_name()),
            Self::Xor(d, s) => write!(f, "xor {}, {}", d.x64_name(), s.x64_name()),
            Self::Or(d, s) => write!(f, "or {}, {}", d.x64_name(), s.x64_name()),
            Self::And(d, s) => write!(f, "and {}, {}", d.x64_name(), s.x64_name()),
            Self::Shl(r, n) => write!(f, "shl {}, {}", r.x64_name(), n),
            Self::Shr(r, n) => write!(f, "shr {}, {}", r.x64_name(), n),
            Self::Ret => write!(f, "ret"),
        }
    }
}

/// Bookkeeping for the number of unconsumed history bits in each half.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Remain {
    low: usize,
    high: usize,
}

/// Accumulates [FoldOp]s while lowering.
struct Emitter {
    ops: Vec<FoldOp>,
}
impl Emitter {
    fn new() -> Self { Self { ops: Vec::new() } }
    fn push(&mut self, op: FoldOp) { self.ops.push(op); }
}

/// A straight-line program computing the current fold scheme for one
/// [FoldSpec].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldProgram {
    spec: FoldSpec,
    ops: Vec<FoldOp>,
}
impl FoldProgram {
    /// Lower a [FoldSpec] into a [FoldProgram].
    ///
    /// Panics if the bit bookkeeping ever needs history from a half that has
    /// none left. This cannot happen for a validated [FoldSpec].
    pub fn lower(spec: &FoldSpec) -> Self {
        use FoldOp::*;
        use Reg::*;

        let bits = spec.chunk_width();
        let times = spec.times();
        let mut e = Emitter::new();
        let mut rem = Remain { low: 64, high: 64 };

        e.push(Zero(Acc));
        for n in 0..times {
            e.push(Xor(Acc, Low));
            e.push(Shr(Low, bits as u8));
            rem.low -= bits;

            // Refill the low half until it holds at least one full chunk.
            while rem.low < bits {
                if rem.high == 0 {
                    assert!(n + 1 == times,
                        "{}: high half exhausted at step {} of {}",
                        spec, n + 1, times);
                    break;
                }
                e.push(Mov(Tmp, High));
                e.push(Shl(Tmp, rem.low as u8));
                e.push(Or(Low, Tmp));
                if rem.low + rem.high > 64 {
                    // Only an untouched high half can overflow the low half.
                    assert!(rem.high == 64,
                        "{}: partial refill from a consumed high half ({:?})",
                        spec, rem);
                    rem.high = rem.low;
                    rem.low = 64;
                    e.push(Shr(High, (64 - rem.high) as u8));
                } else {
                    rem.low += rem.high;
                    rem.high = 0;
                }
                tracing::trace!(%spec, step = n, low = rem.low, high = rem.high,
                    "refilled low half");
            }
        }

        e.push(MovImm(Tmp, spec.chunk_mask()));
        e.push(And(Acc, Tmp));

        let remain = spec.remainder();
        if remain != 0 {
            assert!(rem.low > remain,
                "{}: {} bits left for a {}-bit tail", spec, rem.low, remain);
            e.push(MovImm(Tmp, low_mask(remain)));
            e.push(And(Low, Tmp));
            e.push(Xor(Acc, Low));
        }
        e.push(Ret);

        Self { spec: *spec, ops: e.ops }
    }

    pub fn ops(&self) -> &[FoldOp] { &self.ops }
    pub fn len(&self) -> usize { self.ops.len() }

    /// Run the program on the halves of a history register.
    pub fn eval(&self, lo: u64, hi: u64) -> u64 {
        let mut regs = [0u64; 4];
        regs[Reg::Low.slot()] = lo;
        regs[Reg::High.slot()] = hi;
        for op in self.ops.iter() {
            match *op {
                FoldOp::Zero(r) => regs[r.slot()] = 0,
                FoldOp::MovImm(r, imm) => regs[r.slot()] = imm,
                FoldOp::Mov(d, s) => regs[d.slot()] = regs[s.slot()],
                FoldOp::Xor(d, s) => regs[d.slot()] ^= regs[s.slot()],
                FoldOp::Or(d, s) => regs[d.slot()] |= regs[s.slot()],
                FoldOp::And(d, s) => regs[d.slot()] &= regs[s.slot()],
                FoldOp::Shl(r, n) => regs[r.slot()] <<= n,
                FoldOp::Shr(r, n) => regs[r.slot()] >>= n,
                FoldOp::Ret => break,
            }
        }
        regs[Reg::Acc.slot()]
    }
}

impl FoldAlgorithm for FoldProgram {
    fn name(&self) -> &'static str { "FoldProgram" }
    fn spec(&self) -> FoldSpec { self.spec }
    fn fold(&self, ghr: u128) -> u64 {
        let (lo, hi) = split_halves(ghr);
        self.eval(lo, hi)
    }
}

impl std::fmt::Display for FoldProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}:", self.spec)?;
        for op in self.ops.iter() {
            writeln!(f, "    {}", op)?;
        }
        Ok(())
    }
}
