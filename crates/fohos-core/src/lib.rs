//! # fohos-core - Core Domain Types
//!
//! Foundation crate for the Flutter OpenHarmony tooling. Provides domain types,
//! error handling, logging setup, the hilog line classifier and the build
//! target catalogue.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`TargetPlatform`] - Device CPU architecture (`ohos-arm64`, `ohos-x64`)
//! - [`BuildMode`] - Debug, profile or release
//! - [`ModuleKind`] - Entry, library (`har`), shared (`hsp`) or unknown
//! - [`BuildInfo`] - Parameters of one build invocation
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Log Filtering (`hilog`)
//! - [`HilogClassifier`] - Stateful filter over device log lines
//! - [`LineVerdict`], [`ClassifierState`]
//!
//! ### Build Targets (`build_target`)
//! - [`TargetCatalog`] - Assemble targets and their dependency edges
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use fohos_core::prelude::*;
//! ```

pub mod build_target;
pub mod error;
pub mod hilog;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all fohos crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use build_target::{BuildTarget, TargetCatalog};
pub use error::{Error, Result, ResultExt};
pub use hilog::{ClassifierState, HilogClassifier, LineVerdict};
pub use types::{
    BuildInfo, BuildMode, ModuleKind, TargetPlatform, DEFAULT_FLAVOR, DEFAULT_VERSION_CODE,
    DEFAULT_VERSION_NAME,
};
