//! Fold parameters and their validation.

use crate::error::FoldError;
use crate::history::MAX_HISTORY_BITS;

/// Parameters for folding 'history_len' bits of history into
/// 'chunk_width' bits for the table identified by 'table_id'.
///
/// A [FoldSpec] can only be constructed when
/// `0 < chunk_width < history_len < 128`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FoldSpec {
    chunk_width: usize,
    history_len: usize,
    table_id: usize,
}
impl FoldSpec {
    /// Validate the parameters, returning a [FoldError] naming them on
    /// failure.
    pub fn try_new(chunk_width: usize, history_len: usize, table_id: usize)
        -> Result<Self, FoldError>
    {
        if chunk_width == 0
            || chunk_width >= history_len
            || history_len >= MAX_HISTORY_BITS
        {
            return Err(FoldError { chunk_width, history_len, table_id });
        }
        Ok(Self { chunk_width, history_len, table_id })
    }

    /// Validate the parameters.
    ///
    /// A bad [FoldSpec] means the predictor tables are misconfigured, so
    /// this reports the offending parameters and panics.
    #[track_caller]
    pub fn new(chunk_width: usize, history_len: usize, table_id: usize)
        -> Self
    {
        match Self::try_new(chunk_width, history_len, table_id) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::error!(
                    chunk_width = e.chunk_width,
                    history_len = e.history_len,
                    table_id = e.table_id,
                    "fold precondition violated"
                );
                panic!("{}", e);
            },
        }
    }

    pub fn chunk_width(&self) -> usize { self.chunk_width }
    pub fn history_len(&self) -> usize { self.history_len }
    pub fn table_id(&self) -> usize { self.table_id }

    /// Number of full 'chunk_width'-wide slices.
    pub fn times(&self) -> usize { self.history_len / self.chunk_width }

    /// Width of the trailing partial slice (zero when there is none).
    pub fn remainder(&self) -> usize { self.history_len % self.chunk_width }

    /// Mask covering the low 'chunk_width' bits.
    pub fn chunk_mask(&self) -> u64 { low_mask(self.chunk_width) }
}

impl std::fmt::Display for FoldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "fold{}x{}#{}", self.history_len, self.chunk_width,
            self.table_id)
    }
}

/// A mask with the low 'bits' bits set, for `bits < 64`.
#[inline(always)]
pub fn low_mask(bits: usize) -> u64 {
    debug_assert!(bits < 64);
    (1u64 << bits) - 1
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_valid() {
        let spec = FoldSpec::new(10, 127, 3);
        assert_eq!(spec.times(), 12);
        assert_eq!(spec.remainder(), 7);
        assert_eq!(spec.chunk_mask(), 0x3ff);
        assert_eq!(spec.to_string(), "fold127x10#3");
    }

    #[test]
    fn rejects_bad_parameters() {
        let e = FoldSpec::try_new(64, 32, 1).unwrap_err();
        assert_eq!(e, FoldError { chunk_width: 64, history_len: 32, table_id: 1 });
        assert_eq!(e.to_string(), "invalid fold: bits=64, len=32, bank=1");

        assert!(FoldSpec::try_new(8, 8, 0).is_err());
        assert!(FoldSpec::try_new(8, 128, 0).is_err());
        assert!(FoldSpec::try_new(0, 16, 0).is_err());
        assert!(FoldSpec::try_new(63, 127, 0).is_ok());
        assert!(FoldSpec::try_new(1, 2, 0).is_ok());
    }

    #[test]
    #[should_panic(expected = "bits=64, len=32, bank=7")]
    fn new_is_fatal() {
        let _ = FoldSpec::new(64, 32, 7);
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    #[test]
    fn new_logs_parameters_before_panicking() {
        let out = Capture::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::ERROR)
            .with_writer(move || writer.clone())
            .finish();
        let res = tracing::subscriber::with_default(subscriber, || {
            std::panic::catch_unwind(|| FoldSpec::new(64, 32, 7))
        });
        assert!(res.is_err());

        let log = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("ERROR"), "{}", log);
        assert!(log.contains("fold precondition violated"), "{}", log);
        assert!(log.contains("chunk_width=64"), "{}", log);
        assert!(log.contains("history_len=32"), "{}", log);
        assert!(log.contains("table_id=7"), "{}", log);
    }
}
