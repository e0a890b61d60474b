//! fohos-app - Project model and build orchestration for the Flutter OpenHarmony tooling
//!
//! Reads and rewrites the OpenHarmony project descriptors, wires Flutter
//! plugins into the project, and drives `flutter assemble`, hvigor and ohpm
//! through the build pipelines. [`PipelineHapBuilder`] connects the pipeline
//! to the device launch sequence in `fohos-daemon`.

pub mod build;
pub mod builder;
pub mod config;
pub mod context;
pub mod project;

// Re-export primary types
pub use build::{har_consumption_instructions, BuildPipeline, BuildTools, HapArtifacts};
pub use builder::{PipelineHapBuilder, PrebuiltHap};
pub use config::Settings;
pub use context::BuildContext;
pub use project::{load_plugins, OhosModule, OhosPlugin, OhosProject};
