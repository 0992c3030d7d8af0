//! Core data types, enums, and reports for the Gappei merge library.
//!
//! This module defines the fundamental data structures used throughout Gappei:
//! - Archive descriptors (`ArchiveInfo`, `ImageEntry`, `ZipScan`)
//! - The frozen set of page formats (`ImageFormat`)
//! - Validation and outcome reports (`ValidationReport`, `MergeResult`, `InputStats`)
//! - Progress events (`MergeProgress`, `MergePhase`)

use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::path_utils::get_file_name_lossy;

/// Detected container type of an input file.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum ArchiveKind {
    #[cfg_attr(feature = "serde", serde(rename = "CBZ"))]
    Cbz,
    #[cfg_attr(feature = "serde", serde(rename = "ZIP"))]
    Zip,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "UNKNOWN"))]
    Unknown,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Cbz => f.write_str("CBZ"),
            ArchiveKind::Zip => f.write_str("ZIP"),
            ArchiveKind::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Image formats accepted as comic pages.
///
/// This set is closed: every part of the crate that decides whether an entry is a
/// page goes through [`ImageFormat::from_extension`].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum ImageFormat {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        ImageFormat::Jpg,
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Gif,
        ImageFormat::Bmp,
    ];

    /// Parses an extension, with or without its leading dot, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(extension))
    }

    /// Determines the page format of a container entry or file name.
    pub fn from_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Lowercase extension without the dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The selection used when a caller asks for no format at all.
pub fn default_formats() -> BTreeSet<ImageFormat> {
    BTreeSet::from([ImageFormat::Jpg])
}

/// Every supported page format.
pub fn all_formats() -> BTreeSet<ImageFormat> {
    ImageFormat::ALL.into_iter().collect()
}

/// Parses a comma separated format selection such as `"jpg, .PNG,webp"`.
///
/// Unknown names are dropped. An empty or fully invalid selection yields `{jpg}`.
pub fn parse_format_list(selection: &str) -> BTreeSet<ImageFormat> {
    let formats: BTreeSet<ImageFormat> = selection
        .split(',')
        .filter_map(ImageFormat::from_extension)
        .collect();

    if formats.is_empty() {
        default_formats()
    } else {
        formats
    }
}

/// Renders a format set as `"jpg, png"`.
pub fn format_list_to_string(formats: &BTreeSet<ImageFormat>) -> String {
    formats
        .iter()
        .map(ImageFormat::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Descriptor of one input archive, produced by [`inspect`](crate::inspector::inspect).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub display_name: String,
    pub kind: ArchiveKind,
    pub file_size: u64,
    /// Container-relative names of the page images, in page order.
    pub image_entries: Vec<String>,
    /// Text of the embedded `ComicInfo.xml`, if present and valid UTF-8.
    pub comic_info: Option<String>,
    pub total_entries: usize,
}

impl ArchiveInfo {
    pub fn page_count(&self) -> usize {
        self.image_entries.len()
    }
}

/// One page image found while scanning a generic ZIP.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageEntry {
    pub name: String,
    pub extension: ImageFormat,
    pub size: u64,
    pub compressed_size: u64,
    pub modified: Option<NaiveDateTime>,
}

/// Result of scanning a generic ZIP for page images.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZipScan {
    pub path: PathBuf,
    pub file_size: u64,
    pub total_entries: usize,
    /// Safe, size-bounded image entries in natural order.
    pub image_entries: Vec<ImageEntry>,
    pub formats_present: BTreeSet<ImageFormat>,
}

impl ZipScan {
    /// Entries whose extension is part of `formats`, order preserved.
    pub fn matching<'a>(
        &'a self,
        formats: &'a BTreeSet<ImageFormat>,
    ) -> impl Iterator<Item = &'a ImageEntry> + 'a {
        self.image_entries
            .iter()
            .filter(move |entry| formats.contains(&entry.extension))
    }

    pub fn count_matching(&self, formats: &BTreeSet<ImageFormat>) -> usize {
        self.matching(formats).count()
    }
}

/// How an accepted input will be turned into pages.
#[derive(Debug, Clone)]
pub enum SourcePlan {
    /// Unpack and renumber, keeping the archive's own lexicographic page order.
    Cbz { info: ArchiveInfo },
    /// Extract the selected formats in natural order under a chapter prefix.
    Zip {
        scan: ZipScan,
        formats: BTreeSet<ImageFormat>,
    },
}

impl SourcePlan {
    pub fn kind(&self) -> ArchiveKind {
        match self {
            SourcePlan::Cbz { .. } => ArchiveKind::Cbz,
            SourcePlan::Zip { .. } => ArchiveKind::Zip,
        }
    }

    /// Number of pages this input is expected to contribute.
    pub fn page_count(&self) -> usize {
        match self {
            SourcePlan::Cbz { info } => info.page_count(),
            SourcePlan::Zip { scan, formats } => scan.count_matching(formats),
        }
    }

    pub fn file_size(&self) -> u64 {
        match self {
            SourcePlan::Cbz { info } => info.file_size,
            SourcePlan::Zip { scan, .. } => scan.file_size,
        }
    }
}

/// An input accepted by the validation gate.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub display_name: String,
    pub plan: SourcePlan,
}

/// An input rejected by the validation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct InvalidFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of validating a whole input list.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid_files: Vec<ValidatedInput>,
    pub invalid_files: Vec<InvalidFile>,
    pub total_size: u64,
    pub total_pages: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.invalid_files.is_empty() && !self.valid_files.is_empty()
    }
}

/// Per-source line of a [`MergeResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct SourceSummary {
    pub path: PathBuf,
    pub display_name: String,
    pub kind: ArchiveKind,
    pub pages: usize,
    pub chapter_prefix: Option<String>,
    pub formats: Option<Vec<ImageFormat>>,
}

/// Outcome of one merge invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct MergeResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub merged_files: Vec<SourceSummary>,
    pub total_pages: usize,
    /// Non-fatal, per-file processing errors.
    pub errors: Vec<String>,
    /// Why the merge failed as a whole, if it did.
    pub error: Option<String>,
    pub invalid_files: Vec<InvalidFile>,
}

impl MergeResult {
    pub(crate) fn failed(output_path: &Path, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: output_path.to_path_buf(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// States of a merge invocation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum MergePhase {
    Validating,
    Processing,
    Packaging,
    Done,
    Failed,
}

/// A status event emitted while a merge runs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct MergeProgress {
    pub phase: MergePhase,
    pub current_file: String,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Summary of a candidate input list, for display next to a file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct InputStats {
    pub file_count: usize,
    pub cbz_count: usize,
    pub zip_count: usize,
    pub unknown_count: usize,
    pub total_pages: usize,
    pub total_size: u64,
}

/// Display name used for a source path in results and metadata.
pub fn display_name(path: &Path) -> String {
    get_file_name_lossy(path)
}
