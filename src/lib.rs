//! Folding global branch history into predictor table indices.
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fold;
pub mod history;
pub mod jit;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use fold::*;
pub use history::*;
pub use jit::*;

/// A branch outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome { N, T }
impl From<bool> for Outcome {
    fn from(x: bool) -> Self {
        match x {
            true => Self::T,
            false => Self::N
        }
    }
}
impl From<Outcome> for bool {
    fn from(x: Outcome) -> bool {
        match x {
            Outcome::T => true,
            Outcome::N => false,
        }
    }
}
