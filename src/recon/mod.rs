//! Recon module - parallel URL discovery and DAST hand-off pipeline.
//!
//! This module provides the domain half of the crate, on top of the
//! generic command executor:
//! - **Filter**: scope policies and exact-string deduplication
//! - **Classify**: JS-asset / parameterized splits of the live URL set
//! - **Artifacts**: per-run output directory layout and line-file I/O
//! - **Tools**: the external discovery/probe/scan command catalog
//! - **Pipeline**: stage sequencing via [`pipeline::ReconPipeline`]

pub mod artifacts;
pub mod classify;
pub mod filter;
pub mod pipeline;
pub mod tools;

// Re-export commonly used types
pub use artifacts::ArtifactSet;
pub use classify::classify;
pub use filter::{dedupe_and_scope, ScopePolicy};
pub use pipeline::{PipelineError, ReconPipeline, ReconReport, ReconStats, ScanVerdict};
pub use tools::{ExternalTool, ToolError};
