//! Pattern detectors
//!
//! # Pattern Families
//!
//! - **Single-bar (4)**: Doji, Hammer, Shooting Star / Inverted Hammer, Spinning Top
//! - **Two-bar (4)**: Engulfing, Harami, Dark Cloud Cover, Double Cannon
//! - **Three-bar (4)**: Three Black Crows, Red Three Soldiers, Morning/Evening Star
//! - **Multi-bar (2)**: Triangle Breakout, Head-and-Shoulders
//! - **Volume-price (7)**: low/high volume-price, volume-price divergences, breakouts

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod multi_bar;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;
pub mod volume_price;

// Re-export all detectors for convenience
pub use multi_bar::*;
pub use single_bar::*;
pub use three_bar::*;
pub use two_bar::*;
pub use volume_price::*;
