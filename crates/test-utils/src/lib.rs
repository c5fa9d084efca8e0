//! Shared test utilities for the catalyst-features workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-process mock of the NGD Features API and token endpoint
//! - Feature and page generators
//! - Collection ids, search geometries and catalog fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then start a mock API in an async test:
//!
//! ```ignore
//! use test_utils::{features, MockFeatureApi};
//!
//! let api = MockFeatureApi::builder()
//!     .collection("bld-fts-buildingpart-1", features("bp", 250))
//!     .start()
//!     .await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod mock_api;

// Re-export commonly used items at the crate root
pub use fixtures::{api_error, catalog, catalog_entry, catalog_with};
pub use generators::*;
pub use mock_api::{MockApiBuilder, MockFeatureApi, RecordedRequest};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_approx_eq_passes() {
        assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_approx_eq_fails() {
        assert_approx_eq!(1.1_f64, 1.0_f64, 0.001_f64);
    }
}
