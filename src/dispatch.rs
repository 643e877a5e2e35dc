//! Entry point for folding history on behalf of predictor tables.

use crate::config::{ FoldConfig, FoldScheme };
use crate::error::JitError;
use crate::fold::*;
use crate::jit::{ FoldCode, NATIVE_SUPPORTED };

#[cfg(target_arch = "x86_64")]
use crate::jit::{ FoldJit, GeneratedFold };

/// Folds history using the scheme selected by a [FoldConfig].
#[derive(Clone, Debug, Default)]
pub struct Folder {
    cfg: FoldConfig,
}
impl Folder {
    pub fn new(cfg: FoldConfig) -> Self { Self { cfg } }
    pub fn config(&self) -> &FoldConfig { &self.cfg }

    /// Fold 'history_len' bits of 'ghr' into 'chunk_width' bits with the
    /// interpreted scheme.
    ///
    /// Panics after logging the parameters if they do not form a valid
    /// [FoldSpec].
    #[track_caller]
    pub fn fold(&self, chunk_width: usize, history_len: usize,
        table_id: usize, ghr: u128) -> u64
    {
        let spec = FoldSpec::new(chunk_width, history_len, table_id);
        self.fold_spec(&spec, ghr)
    }

    /// Fold with an already validated [FoldSpec].
    pub fn fold_spec(&self, spec: &FoldSpec, ghr: u128) -> u64 {
        match self.cfg.scheme {
            FoldScheme::Current => fold_current(spec, ghr),
            FoldScheme::Legacy => fold_legacy(spec, ghr),
        }
    }

    /// An interpreted fold for 'spec' using the configured scheme.
    pub fn interpreted(&self, spec: FoldSpec) -> InterpretedFold {
        InterpretedFold::new(spec, self.cfg.scheme)
    }

    /// Whether native fold functions may be used.
    ///
    /// Requires code generation to be enabled, the current scheme (the
    /// legacy scheme is never generated), and a supported target.
    pub fn jit_available(&self) -> bool {
        self.cfg.jit && self.cfg.scheme == FoldScheme::Current
            && NATIVE_SUPPORTED
    }

    /// Generate native fold functions for 'specs' into one code buffer.
    ///
    /// Returns `Ok(None)` when code generation is disabled or the legacy
    /// scheme is selected, and [JitError::Unsupported] when the target has
    /// no native backend.
    pub fn compile(&self, specs: &[FoldSpec])
        -> Result<Option<FoldCode>, JitError>
    {
        if !self.cfg.jit || self.cfg.scheme != FoldScheme::Current {
            return Ok(None);
        }
        self.compile_native(specs).map(Some)
    }

    #[cfg(target_arch = "x86_64")]
    fn compile_native(&self, specs: &[FoldSpec]) -> Result<FoldCode, JitError> {
        let mut jit = FoldJit::with_capacity(self.cfg.code_capacity)?;
        for spec in specs {
            jit.emit(spec)?;
        }
        jit.finalize()
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn compile_native(&self, _specs: &[FoldSpec]) -> Result<FoldCode, JitError> {
        Err(JitError::Unsupported(std::env::consts::ARCH))
    }

    /// Pick the fold a table should use: the generated function for 'spec'
    /// if 'code' has one, otherwise the interpreter.
    pub fn select<'code>(&self, spec: FoldSpec, code: Option<&'code FoldCode>)
        -> TableFold<'code>
    {
        if self.jit_available() {
            if let Some(f) = code.and_then(|c| self.native_fold(spec, c)) {
                return f;
            }
        }
        TableFold::Interpreted(self.interpreted(spec))
    }

    #[cfg(target_arch = "x86_64")]
    fn native_fold<'code>(&self, spec: FoldSpec, code: &'code FoldCode)
        -> Option<TableFold<'code>>
    {
        code.find(&spec).map(TableFold::Native)
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn native_fold<'code>(&self, _spec: FoldSpec, code: &'code FoldCode)
        -> Option<TableFold<'code>>
    {
        match *code {}
    }
}

/// The fold chosen for one predictor table.
#[derive(Clone, Copy, Debug)]
pub enum TableFold<'code> {
    Interpreted(InterpretedFold),
    #[cfg(target_arch = "x86_64")]
    Native(GeneratedFold<'code>),
    #[cfg(not(target_arch = "x86_64"))]
    #[doc(hidden)]
    _Unused(std::marker::PhantomData<&'code ()>),
}
impl FoldAlgorithm for TableFold<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Interpreted(f) => f.name(),
            #[cfg(target_arch = "x86_64")]
            Self::Native(f) => f.name(),
            #[cfg(not(target_arch = "x86_64"))]
            Self::_Unused(_) => unreachable!(),
        }
    }
    fn spec(&self) -> FoldSpec {
        match self {
            Self::Interpreted(f) => f.spec(),
            #[cfg(target_arch = "x86_64")]
            Self::Native(f) => f.spec(),
            #[cfg(not(target_arch = "x86_64"))]
            Self::_Unused(_) => unreachable!(),
        }
    }
    #[inline(always)]
    fn fold(&self, ghr: u128) -> u64 {
        match self {
            Self::Interpreted(f) => f.fold(ghr),
            #[cfg(target_arch = "x86_64")]
            Self::Native(f) => f.fold(ghr),
            #[cfg(not(target_arch = "x86_64"))]
            Self::_Unused(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fold_uses_configured_scheme() {
        let ghr = 0x0000_0007_0000_0002_0000_0001u128;
        let current = Folder::new(FoldConfig::default());
        assert_eq!(current.fold(32, 96, 0, ghr), 4);
        assert_eq!(current.fold(8, 16, 0, 0x00ff), 0xff);

        let legacy = Folder::new(FoldConfig {
            scheme: FoldScheme::Legacy, ..FoldConfig::default()
        });
        assert_eq!(legacy.fold(32, 96, 0, ghr), 0);
        assert_eq!(legacy.fold(8, 16, 0, 0x00ff), 0xff);
        assert!(!legacy.jit_available());
    }

    #[test]
    #[should_panic(expected = "bits=64, len=32, bank=5")]
    fn fold_rejects_bad_parameters() {
        let folder = Folder::default();
        let _ = folder.fold(64, 32, 5, 0);
    }

    #[test]
    fn jit_can_be_disabled() {
        let folder = Folder::new(FoldConfig { jit: false, ..FoldConfig::default() });
        assert!(!folder.jit_available());
        let spec = FoldSpec::new(10, 127, 0);
        assert_eq!(folder.interpreted(spec).fold(u128::MAX),
            fold_current(&spec, u128::MAX));
    }

    #[test]
    fn select_without_code_interprets() {
        let folder = Folder::default();
        let spec = FoldSpec::new(11, 100, 4);
        let f = folder.select(spec, None);
        assert!(matches!(f, TableFold::Interpreted(_)));
        assert_eq!(f.spec(), spec);
        assert_eq!(f.fold(u128::MAX), fold_current(&spec, u128::MAX));
    }

    #[test]
    fn compile_skips_disabled_and_legacy() {
        let specs = [FoldSpec::new(10, 40, 0)];
        let off = Folder::new(FoldConfig { jit: false, ..FoldConfig::default() });
        assert!(off.compile(&specs).unwrap().is_none());
        let legacy = Folder::new(FoldConfig {
            scheme: FoldScheme::Legacy, ..FoldConfig::default()
        });
        assert!(legacy.compile(&specs).unwrap().is_none());
    }

    #[cfg(not(target_arch = "x86_64"))]
    #[test]
    fn compile_is_unsupported_without_backend() {
        let folder = Folder::default();
        assert!(!folder.jit_available());
        let err = folder.compile(&[FoldSpec::new(10, 40, 0)]).unwrap_err();
        assert!(matches!(err, JitError::Unsupported(arch)
            if arch == std::env::consts::ARCH));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn compile_and_select() {
        let specs = [
            FoldSpec::new(10, 20, 0),
            FoldSpec::new(10, 40, 1),
            FoldSpec::new(10, 80, 2),
            FoldSpec::new(10, 127, 3),
        ];
        let folder = Folder::default();
        assert!(folder.jit_available());
        let code = folder.compile(&specs).unwrap().unwrap();
        assert_eq!(code.entries().len(), 4);

        let h = 0xdead_beef_0bad_f00d_cafe_babe_1234_5678u128;
        for spec in specs {
            let f = folder.select(spec, Some(&code));
            assert!(matches!(f, TableFold::Native(_)));
            assert_eq!(f.fold(h), folder.fold_spec(&spec, h));
        }

        let missing = FoldSpec::new(12, 60, 9);
        let f = folder.select(missing, Some(&code));
        assert!(matches!(f, TableFold::Interpreted(_)));
        assert_eq!(f.fold(h), fold_current(&missing, h));

        let off = Folder::new(FoldConfig { jit: false, ..FoldConfig::default() });
        assert!(off.compile(&specs).unwrap().is_none());
        assert!(matches!(off.select(specs[0], Some(&code)), TableFold::Interpreted(_)));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn compile_reports_exhaustion() {
        let folder = Folder::new(FoldConfig { code_capacity: 32, ..FoldConfig::default() });
        let specs = [FoldSpec::new(1, 127, 0)];
        assert!(matches!(folder.compile(&specs),
            Err(JitError::BufferExhausted { .. })));
    }
}
