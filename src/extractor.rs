//! Chapter-scoped page extraction from generic ZIP archives.
//!
//! A generic ZIP carries no page numbering that can be trusted, so its images are
//! re-ordered naturally by leaf file name and written out as
//! `{chapter_prefix}_{sequence:03}.{extension}`.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::inspector::{open_archive, scan_zip};
use crate::path_utils::has_extension;
use crate::types::{ImageFormat, all_formats, default_formats, format_list_to_string};

/// Outcome of [`extract_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub extracted_count: usize,
    /// Paths of the written files, in page order.
    pub extracted_files: Vec<PathBuf>,
    pub error: Option<String>,
}

impl ExtractionOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Builds the file name of the `sequence`-th (1-based) page of a chapter.
pub fn chapter_page_name(chapter_prefix: &str, sequence: usize, extension: ImageFormat) -> String {
    format!("{}_{:03}.{}", chapter_prefix, sequence, extension)
}

/// Extracts the images of `zip_path` whose format is in `formats` into `output_dir`.
///
/// # Arguments
///
/// * `zip_path` - The generic ZIP to read
/// * `output_dir` - Destination directory, created if missing
/// * `formats` - Formats to keep; an empty set means `{jpg}`
/// * `chapter_prefix` - Prefix of every written name, e.g. `"ch2"`
///
/// # Returns
///
/// * `ExtractionOutcome` - Never an `Err`: failures are reported in `error`.
///   Individual entries that cannot be copied are logged and skipped; the call
///   only succeeds if at least one page was written.
pub fn extract_images(
    zip_path: &Path,
    output_dir: &Path,
    formats: &BTreeSet<ImageFormat>,
    chapter_prefix: &str,
) -> ExtractionOutcome {
    match try_extract_images(zip_path, output_dir, formats, chapter_prefix) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Extraction from {:?} failed: {}", zip_path, e);
            ExtractionOutcome::failed(e.to_string())
        }
    }
}

fn try_extract_images(
    zip_path: &Path,
    output_dir: &Path,
    formats: &BTreeSet<ImageFormat>,
    chapter_prefix: &str,
) -> Result<ExtractionOutcome> {
    let formats = if formats.is_empty() {
        default_formats()
    } else {
        formats.clone()
    };

    if !zip_path.is_file() {
        return Err(Error::NotFound(format!(
            "ZIP file does not exist: {:?}",
            zip_path
        )));
    }
    if !has_extension(zip_path, "zip") {
        return Err(Error::Unsupported(format!(
            "Not a ZIP file: {:?}",
            zip_path
        )));
    }

    let scan = scan_zip(zip_path)?;
    if scan.image_entries.is_empty() {
        return Err(Error::NoImages(
            zip_path.to_path_buf(),
            format_list_to_string(&all_formats()),
        ));
    }

    fs::create_dir_all(output_dir)?;

    let targets: Vec<_> = scan.matching(&formats).collect();
    if targets.is_empty() {
        return Err(Error::NoImages(
            zip_path.to_path_buf(),
            format_list_to_string(&formats),
        ));
    }

    let mut archive = open_archive(zip_path)?;
    let mut extracted_files = Vec::with_capacity(targets.len());

    for (index, entry) in targets.iter().enumerate() {
        let destination = output_dir.join(chapter_page_name(
            chapter_prefix,
            index + 1,
            entry.extension,
        ));

        match copy_entry(&mut archive, &entry.name, &destination) {
            Ok(bytes) => {
                log::debug!(
                    "Extracted '{}' -> {:?} ({} bytes)",
                    entry.name,
                    destination,
                    bytes
                );
                extracted_files.push(destination);
            }
            Err(e) => {
                log::warn!(
                    "Failed to extract '{}' from {:?}: {}",
                    entry.name,
                    zip_path,
                    e
                );
                let _ = fs::remove_file(&destination);
            }
        }
    }

    if extracted_files.is_empty() {
        return Err(Error::Other(format!(
            "No image could be extracted from {:?}",
            zip_path
        )));
    }

    log::info!(
        "Extracted {} of {} pages from {:?} as '{}'",
        extracted_files.len(),
        targets.len(),
        zip_path,
        chapter_prefix
    );

    Ok(ExtractionOutcome {
        success: true,
        extracted_count: extracted_files.len(),
        extracted_files,
        error: None,
    })
}

/// Copies the stored bytes of one entry to `destination` unchanged.
fn copy_entry(archive: &mut ZipArchive<File>, name: &str, destination: &Path) -> Result<u64> {
    let mut entry = archive.by_name(name)?;
    let mut output = File::create(destination)?;
    Ok(io::copy(&mut entry, &mut output)?)
}
