//! Pattern catalog
//!
//! Every built-in pattern is a unit-struct detector paired with a `'static`
//! [`PatternDefinition`](crate::PatternDefinition).
//!
//! # Pattern Categories
//!
//! - **Single-bar (13)**: Doji family, Hammer family, long candles, Marubozu, Belt Hold, Spinning Top
//! - **Two-bar (8)**: Engulfing, Piercing / Dark Cloud, Harami family, Tweezers
//! - **Three-bar (6)**: Morning/Evening Star, Soldiers/Crows, Three Methods
//! - **Multi-bar (10)**: Flags, Pennants, Wedges, Double Top/Bottom, Head and Shoulders

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod helpers;
pub mod multi_bar;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

pub use multi_bar::*;
pub use single_bar::*;
pub use three_bar::*;
pub use two_bar::*;
