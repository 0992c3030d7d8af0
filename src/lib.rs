//! Gappei - Comic Archive Merge Library
//!
//! This crate merges several comic archives (CBZ files and plain ZIP files holding
//! images) into one CBZ. Pages keep the order of the input list, are renumbered into
//! one continuous sequence, and a combined `ComicInfo.xml` describes where they came from.
//!
//! # Getting Started
//!
//! Configure a merge with the `GappeiConfig` builder, then run it with
//! [`merge_files`](GappeiConfig::merge_files). Failures are reported inside the returned
//! [`MergeResult`]; the output file only appears once the archive is complete.
//!
//! ```rust,no_run
//! use gappei::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> gappei::error::Result<()> {
//!     let inputs = vec![
//!         PathBuf::from("./downloads/chapter_01.cbz"),
//!         PathBuf::from("./downloads/chapter_02.zip"),
//!     ];
//!
//!     // 1. Configure the merge using the builder
//!     let config = GappeiConfig::builder()
//!         .output_path(PathBuf::from("./library/volume_01.cbz"))
//!         .image_formats([ImageFormat::Jpg, ImageFormat::Png])
//!         .preserve_metadata(true)
//!         .build()?;
//!
//!     // Optional: check the inputs before merging
//!     let stats = config.input_stats(&inputs);
//!     println!("{} files, {} pages", stats.file_count, stats.total_pages);
//!
//!     // 2. Run the merge, printing progress as it arrives
//!     let result = config
//!         .merge_files(&inputs, &|event: MergeProgress| println!("{}", event.message))
//!         .await?;
//!
//!     if result.success {
//!         println!("Wrote {} pages to {:?}", result.total_pages, result.output_path);
//!     } else {
//!         println!("Merge failed: {:?}", result.error);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! For a front-end that must stay responsive, use
//! [`spawn_merge`](GappeiConfig::spawn_merge) with a Tokio channel sender as the
//! progress sink.

pub mod error;
pub mod extractor;
pub mod generator;
pub mod inspector;
pub mod merger;
pub mod metadata;
pub mod path_utils;
pub mod progress;
pub mod types;

// Publicly expose the main `GappeiConfig` struct and its builder
pub use merger::GappeiConfig;
pub use merger::GappeiConfigBuilder;

// Re-export core types for direct access
pub use progress::{NoProgress, ProgressSink};
pub use types::{
    ArchiveInfo, ArchiveKind, ImageEntry, ImageFormat, InputStats, InvalidFile, MergePhase,
    MergeProgress, MergeResult, SourceSummary, ValidationReport, ZipScan,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use gappei::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        ArchiveInfo, ArchiveKind, GappeiConfig, GappeiConfigBuilder, ImageEntry, ImageFormat,
        InputStats, InvalidFile, MergePhase, MergeProgress, MergeResult, NoProgress,
        ProgressSink, SourceSummary, ValidationReport, ZipScan, error, generator, types,
    };
    pub use crate::inspector::{classify, inspect, scan_zip};
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
