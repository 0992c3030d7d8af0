//! Generator module provides the trait and implementation used to package merged pages.
//!
//! This module contains the common interface for archive generators and the CBZ
//! implementation that writes the final merged archive.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod cbz;

/// Common interface for archive generators.
///
/// A generator receives staged page files in their final order, an optional metadata
/// document, and publishes the finished archive in one step. Until [`save`](Generator::save)
/// succeeds nothing is visible at the output path.
#[async_trait]
pub trait Generator {
    /// Creates a new generator that will publish to `output_path`.
    ///
    /// # Parameters
    /// * `output_path` - Final location of the archive; must not exist when saving
    ///
    /// # Returns
    /// * `Result<Self>` - A new generator instance or an error if creation fails
    fn new(output_path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Adds a page, stored under the page file's own name.
    ///
    /// # Parameters
    /// * `image_path` - Path to the staged image file
    ///
    /// # Returns
    /// * `Result<&mut Self>` - Self reference for method chaining, or an error if failed
    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self>
    where
        Self: Sized;

    /// Adds the metadata document to the archive.
    ///
    /// # Parameters
    /// * `document` - Complete XML text of the document
    ///
    /// # Returns
    /// * `Result<&mut Self>` - Self reference for method chaining, or an error if failed
    async fn set_metadata(&mut self, document: &str) -> Result<&mut Self>
    where
        Self: Sized;

    /// Finalizes the archive and publishes it at the output path.
    ///
    /// # Returns
    /// * `Result<PathBuf>` - The published path, or an error if saving fails
    async fn save(self) -> Result<PathBuf>;
}
