//! Native fold functions for x86-64.
//!
//! A [FoldJit] owns a code buffer and assembles one function per
//! [FoldSpec] into it. Finalizing it produces a [FoldCode], which owns the
//! executable memory and hands out [GeneratedFold] handles that borrow it.
//!
//! Every generated function has the signature
//! `extern "sysv64" fn(low: u64, high: u64) -> u64` and touches only
//! `rdi`, `rsi`, `rax` and `rdx`.

use std::marker::PhantomData;
use std::sync::atomic::{ AtomicUsize, Ordering };

use dynasmrt::{ dynasm, DynasmApi, AssemblyOffset, ExecutableBuffer };
use dynasmrt::x64::Assembler;

use crate::config::DEFAULT_CODE_CAPACITY;
use crate::error::JitError;
use crate::fold::{ FoldAlgorithm, FoldSpec };
use crate::history::split_halves;
use crate::jit::{ FoldOp, FoldProgram, Reg };

/// Entry points are aligned to this many bytes.
pub const FUNCTION_ALIGN: usize = 16;

/// Signature of a generated fold function.
pub type FoldFnPtr = unsafe extern "sysv64" fn(lo: u64, hi: u64) -> u64;

static NEXT_BUFFER_ID: AtomicUsize = AtomicUsize::new(0);

impl Reg {
    /// Register number used in the instruction encoding.
    fn x64_code(self) -> u8 {
        match self {
            Self::Acc => 0,  // rax
            Self::Tmp => 2,  // rdx
            Self::High => 6, // rsi
            Self::Low => 7,  // rdi
        }
    }
}

impl FoldOp {
    /// Upper bound on the encoded size of this instruction.
    pub fn max_x64_len(&self) -> usize {
        match self {
            Self::MovImm(_, _) => 10,
            Self::Ret => 1,
            _ => 4,
        }
    }
}

/// Encode one [FoldOp].
fn encode(ops: &mut Assembler, op: FoldOp) {
    match op {
        FoldOp::Zero(r) => {
            let r = r.x64_code();
            dynasm!(ops ; .arch x64 ; xor Rd(r), Rd(r));
        },
        FoldOp::MovImm(r, imm) => {
            let r = r.x64_code();
            dynasm!(ops ; .arch x64 ; mov Rq(r), QWORD imm as i64);
        },
        FoldOp::Mov(d, s) => {
            let (d, s) = (d.x64_code(), s.x64_code());
            dynasm!(ops ; .arch x64 ; mov Rq(d), Rq(s));
        },
        FoldOp::Xor(d, s) => {
            let (d, s) = (d.x64_code(), s.x64_code());
            dynasm!(ops ; .arch x64 ; xor Rq(d), Rq(s));
        },
        FoldOp::Or(d, s) => {
            let (d, s) = (d.x64_code(), s.x64_code());
            dynasm!(ops ; .arch x64 ; or Rq(d), Rq(s));
        },
        FoldOp::And(d, s) => {
            let (d, s) = (d.x64_code(), s.x64_code());
            dynasm!(ops ; .arch x64 ; and Rq(d), Rq(s));
        },
        FoldOp::Shl(r, n) => {
            let r = r.x64_code();
            dynasm!(ops ; .arch x64 ; shl Rq(r), n as i8);
        },
        FoldOp::Shr(r, n) => {
            let r = r.x64_code();
            dynasm!(ops ; .arch x64 ; shr Rq(r), n as i8);
        },
        FoldOp::Ret => {
            dynasm!(ops ; .arch x64 ; ret);
        },
    }
}

/// Identifies a function emitted by a [FoldJit].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FoldEntry {
    spec: FoldSpec,
    buffer: usize,
    offset: usize,
    len: usize,
}
impl FoldEntry {
    pub fn spec(&self) -> FoldSpec { self.spec }
    /// Offset of the entry point in the code buffer.
    pub fn offset(&self) -> usize { self.offset }
    /// Encoded size in bytes.
    pub fn len(&self) -> usize { self.len }
}

/// Generates native fold functions into a single code buffer.
pub struct FoldJit {
    ops: Assembler,
    entries: Vec<FoldEntry>,
    capacity: usize,
    id: usize,
}
impl FoldJit {
    /// Create a generator with a [DEFAULT_CODE_CAPACITY]-byte buffer.
    pub fn new() -> Result<Self, JitError> {
        Self::with_capacity(DEFAULT_CODE_CAPACITY)
    }

    /// Create a generator whose buffer holds at most 'capacity' bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, JitError> {
        Ok(Self {
            ops: Assembler::new()?,
            entries: Vec::new(),
            capacity,
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn capacity(&self) -> usize { self.capacity }

    /// Number of bytes emitted so far.
    pub fn code_len(&self) -> usize { self.ops.offset().0 }

    pub fn entries(&self) -> &[FoldEntry] { &self.entries }

    /// Lower and emit the fold function for 'spec'.
    pub fn emit(&mut self, spec: &FoldSpec) -> Result<FoldEntry, JitError> {
        self.emit_program(&FoldProgram::lower(spec))
    }

    /// Emit an already lowered [FoldProgram].
    ///
    /// Nothing is written if the function might not fit in the remaining
    /// capacity.
    pub fn emit_program(&mut self, program: &FoldProgram)
        -> Result<FoldEntry, JitError>
    {
        let start = self.code_len().next_multiple_of(FUNCTION_ALIGN);
        let worst: usize = program.ops().iter().map(|op| op.max_x64_len()).sum();
        let needed = start + worst;
        if needed > self.capacity {
            return Err(JitError::BufferExhausted {
                needed, capacity: self.capacity
            });
        }

        dynasm!(self.ops ; .arch x64 ; .align FUNCTION_ALIGN);
        let entry = self.ops.offset();
        for op in program.ops() {
            encode(&mut self.ops, *op);
        }
        let len = self.ops.offset().0 - entry.0;

        let entry = FoldEntry {
            spec: program.spec(),
            buffer: self.id,
            offset: entry.0,
            len,
        };
        tracing::debug!(spec = %entry.spec, offset = entry.offset,
            bytes = entry.len, "emitted fold function");
        self.entries.push(entry);
        Ok(entry)
    }

    /// Make the emitted code executable.
    pub fn finalize(self) -> Result<FoldCode, JitError> {
        let Self { mut ops, entries, id, .. } = self;
        ops.commit().map_err(|e| JitError::Finalize(format!("{:?}", e)))?;
        let buf = ops.finalize().map_err(|_| {
            JitError::Finalize("code buffer is still locked".to_string())
        })?;
        tracing::debug!(functions = entries.len(), bytes = buf.len(),
            "finalized fold code buffer");
        Ok(FoldCode { buf, entries, id })
    }
}

impl std::fmt::Debug for FoldJit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FoldJit")
            .field("entries", &self.entries)
            .field("code_len", &self.code_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Emit and finalize a buffer holding a single fold function.
pub fn generate(spec: &FoldSpec) -> Result<FoldCode, JitError> {
    let mut jit = FoldJit::new()?;
    jit.emit(spec)?;
    jit.finalize()
}

/// Executable memory holding the functions emitted by a [FoldJit].
///
/// Dropping this releases the memory; the borrow on every
/// [GeneratedFold] keeps that from happening while one is alive.
pub struct FoldCode {
    buf: ExecutableBuffer,
    entries: Vec<FoldEntry>,
    id: usize,
}
impl FoldCode {
    pub fn entries(&self) -> &[FoldEntry] { &self.entries }

    /// Size of the code buffer in bytes.
    pub fn code_len(&self) -> usize { self.buf.len() }

    /// Get a callable handle for an entry emitted into this buffer.
    pub fn function(&self, entry: FoldEntry) -> GeneratedFold<'_> {
        assert!(entry.buffer == self.id,
            "{} was emitted into a different code buffer", entry.spec);
        assert!(entry.offset + entry.len <= self.buf.len());
        let ptr = self.buf.ptr(AssemblyOffset(entry.offset));
        // SAFETY: 'ptr' is the entry point of a function assembled by
        // [FoldJit::emit_program] with the [FoldFnPtr] signature, and the
        // buffer is executable and outlives the returned handle.
        let func = unsafe { std::mem::transmute::<*const u8, FoldFnPtr>(ptr) };
        GeneratedFold { func, spec: entry.spec, _code: PhantomData }
    }

    /// Find the function generated for 'spec'.
    pub fn find(&self, spec: &FoldSpec) -> Option<GeneratedFold<'_>> {
        self.entries.iter().find(|e| e.spec == *spec)
            .map(|e| self.function(*e))
    }

    /// All generated functions, in emission order.
    pub fn functions(&self) -> impl Iterator<Item = GeneratedFold<'_>> + '_ {
        self.entries.iter().map(move |e| self.function(*e))
    }
}

impl std::fmt::Debug for FoldCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FoldCode")
            .field("entries", &self.entries)
            .field("code_len", &self.buf.len())
            .finish()
    }
}

/// A native fold function for one [FoldSpec], valid while the [FoldCode]
/// it came from is alive.
#[derive(Clone, Copy)]
pub struct GeneratedFold<'code> {
    func: FoldFnPtr,
    spec: FoldSpec,
    _code: PhantomData<&'code FoldCode>,
}
impl GeneratedFold<'_> {
    /// Fold the history given as `(low, high)` halves.
    #[inline(always)]
    pub fn call(&self, lo: u64, hi: u64) -> u64 {
        // SAFETY: the function only reads its two arguments and clobbers
        // caller-saved registers, and the borrow keeps the code mapped.
        unsafe { (self.func)(lo, hi) }
    }
}

impl FoldAlgorithm for GeneratedFold<'_> {
    fn name(&self) -> &'static str { "GeneratedFold" }
    fn spec(&self) -> FoldSpec { self.spec }
    #[inline(always)]
    fn fold(&self, ghr: u128) -> u64 {
        let (lo, hi) = split_halves(ghr);
        self.call(lo, hi)
    }
}

impl std::fmt::Debug for GeneratedFold<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GeneratedFold")
            .field("spec", &self.spec)
            .field("entry", &(self.func as *const u8))
            .finish()
    }
}
