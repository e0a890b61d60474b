//! Build orchestration: host tools, hvigor command lines and the pipelines

pub mod hvigor;
pub mod pipeline;
pub mod tools;

pub use pipeline::{har_consumption_instructions, BuildPipeline, HapArtifacts, ENGINE_HAR};
pub use tools::BuildTools;
