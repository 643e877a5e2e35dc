//! Configuration for the fold dispatcher.
//!
//! Use `FoldConfig::default()` or deserialize one from JSON with
//! [FoldConfig::from_json].

use serde::Deserialize;

/// Default capacity of a code buffer, in bytes.
pub const DEFAULT_CODE_CAPACITY: usize = 4096;

/// Selects which interpreted fold scheme is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldScheme {
    /// Mask and XOR 'chunk_width' slices, then the trailing partial slice.
    #[default]
    Current,
    /// The older iteration structure, kept for reproducing old results.
    Legacy,
}

/// Process-wide fold settings, passed to [crate::Folder::new].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FoldConfig {
    /// Interpreted scheme used by the dispatcher.
    pub scheme: FoldScheme,

    /// Allow native fold functions to be generated.
    pub jit: bool,

    /// Capacity of each code buffer, in bytes.
    pub code_capacity: usize,
}
impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            scheme: FoldScheme::Current,
            jit: true,
            code_capacity: DEFAULT_CODE_CAPACITY,
        }
    }
}
impl FoldConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = FoldConfig::default();
        assert_eq!(cfg.scheme, FoldScheme::Current);
        assert!(cfg.jit);
        assert_eq!(cfg.code_capacity, 4096);
    }

    #[test]
    fn json_partial() {
        let cfg = FoldConfig::from_json(r#"{ "scheme": "legacy" }"#).unwrap();
        assert_eq!(cfg.scheme, FoldScheme::Legacy);
        assert!(cfg.jit);

        let cfg = FoldConfig::from_json(r#"{ "jit": false, "code_capacity": 512 }"#)
            .unwrap();
        assert_eq!(cfg.scheme, FoldScheme::Current);
        assert!(!cfg.jit);
        assert_eq!(cfg.code_capacity, 512);
    }

    #[test]
    fn json_rejects_unknown_scheme() {
        assert!(FoldConfig::from_json(r#"{ "scheme": "v120" }"#).is_err());
    }
}
