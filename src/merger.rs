use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::{JoinHandle, spawn_blocking};

use crate::error::{Error, Result};
use crate::extractor::extract_images;
use crate::generator::{Generator, cbz::Cbz};
use crate::inspector::{classify, detect, inspect, open_archive, scan_zip};
use crate::metadata::build_metadata;
use crate::path_utils::{
    human_size, natural_cmp, path_to_string_lossy, unique_file_name, validate_output_path,
};
use crate::progress::ProgressSink;
use crate::types::{
    ArchiveInfo, ArchiveKind, ImageFormat, InputStats, InvalidFile, MergePhase, MergeProgress,
    MergeResult, SourcePlan, SourceSummary, ValidatedInput, ValidationReport, ZipScan,
    all_formats, default_formats, display_name, format_list_to_string,
};

/// Prefix of the per-merge working directory.
const WORK_DIR_PREFIX: &str = "gappei_merge_";

/// The main Gappei merge configuration, built declaratively using the builder pattern.
///
/// A configuration names the archive to produce and how inputs are turned into pages.
/// Once built it can run any number of merges:
///
/// - [`merge_files`](GappeiConfig::merge_files): Validate, process and package a list of inputs
/// - [`spawn_merge`](GappeiConfig::spawn_merge): The same, on a background Tokio task
/// - [`validate_inputs`](GappeiConfig::validate_inputs): The validation gate only
/// - [`input_stats`](GappeiConfig::input_stats): A summary of a candidate file list
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use gappei::prelude::*;
/// let config = GappeiConfig::builder()
///     .output_path(PathBuf::from("./merged.cbz"))
///     .image_formats([ImageFormat::Jpg, ImageFormat::Png])
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GappeiConfig {
    /// Path of the `.cbz` archive to create.
    ///
    /// It must not exist when a merge starts; an existing file is never replaced.
    pub output_path: PathBuf,

    /// Whether to embed a synthesized `ComicInfo.xml` in the output.
    ///
    /// Defaults to `true`.
    #[builder(default = "true")]
    pub preserve_metadata: bool,

    /// Page formats taken from generic ZIP inputs.
    ///
    /// CBZ inputs always contribute every supported image. An empty set behaves as `{jpg}`.
    #[builder(default = "default_formats()")]
    pub image_formats: BTreeSet<ImageFormat>,

    /// Directory under which the working directory is created.
    ///
    /// Defaults to the system temporary directory.
    #[builder(default)]
    pub work_dir: Option<PathBuf>,
}

impl GappeiConfig {
    /// Creates a new builder for configuring `GappeiConfig`.
    pub fn builder() -> GappeiConfigBuilder {
        GappeiConfigBuilder::default()
    }

    /// The format selection applied to ZIP inputs.
    pub fn effective_formats(&self) -> BTreeSet<ImageFormat> {
        if self.image_formats.is_empty() {
            default_formats()
        } else {
            self.image_formats.clone()
        }
    }

    /// Runs the validation gate over `paths` without writing anything.
    ///
    /// Every input is classified and inspected. An input is accepted only when it is
    /// a CBZ with at least one image, or a ZIP with at least one image in the
    /// selected formats. Accepted inputs keep the order of `paths`.
    pub fn validate_inputs(&self, paths: &[PathBuf]) -> ValidationReport {
        let mut report = ValidationReport::default();

        for path in paths {
            match self.plan_input(path) {
                Ok(plan) => {
                    report.total_size += plan.file_size();
                    report.total_pages += plan.page_count();
                    report.valid_files.push(ValidatedInput {
                        path: path.clone(),
                        display_name: display_name(path),
                        plan,
                    });
                }
                Err(e) => {
                    log::debug!("Rejected input {:?}: {}", path, e);
                    report.invalid_files.push(InvalidFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn plan_input(&self, path: &Path) -> Result<SourcePlan> {
        match detect(path)? {
            ArchiveKind::Cbz => {
                let info = inspect(path)?;
                if info.page_count() == 0 {
                    return Err(Error::NoImages(
                        path.to_path_buf(),
                        format_list_to_string(&all_formats()),
                    ));
                }
                Ok(SourcePlan::Cbz { info })
            }
            ArchiveKind::Zip => {
                let scan = scan_zip(path)?;
                let formats = self.effective_formats();
                if scan.count_matching(&formats) == 0 {
                    return Err(Error::NoImages(
                        path.to_path_buf(),
                        format_list_to_string(&formats),
                    ));
                }
                Ok(SourcePlan::Zip { scan, formats })
            }
            ArchiveKind::Unknown => Err(Error::Unsupported(format!(
                "Not a CBZ or ZIP file: {:?}",
                path
            ))),
        }
    }

    /// Summarizes a candidate file list for display. Never fails.
    ///
    /// Pages are counted the way a merge would take them, so ZIP inputs only count
    /// images in the selected formats.
    pub fn input_stats(&self, paths: &[PathBuf]) -> InputStats {
        let formats = self.effective_formats();
        let mut stats = InputStats {
            file_count: paths.len(),
            ..Default::default()
        };

        for path in paths {
            if let Ok(metadata) = fs::metadata(path) {
                stats.total_size += metadata.len();
            }

            match classify(path) {
                ArchiveKind::Cbz => {
                    stats.cbz_count += 1;
                    stats.total_pages += inspect(path).map_or(0, |info| info.page_count());
                }
                ArchiveKind::Zip => {
                    stats.zip_count += 1;
                    stats.total_pages +=
                        scan_zip(path).map_or(0, |scan| scan.count_matching(&formats));
                }
                ArchiveKind::Unknown => stats.unknown_count += 1,
            }
        }

        stats
    }

    /// Merges `paths`, in order, into the configured output archive.
    ///
    /// The merge moves through `Validating`, `Processing` and `Packaging`, reporting
    /// each step to `progress`. Failures are returned as data: an invalid input or
    /// output path stops the merge before anything is written, a failing input is
    /// recorded in [`MergeResult::errors`] and skipped, and a packaging failure leaves
    /// no file at the output path. The working directory is removed on every path.
    ///
    /// # Arguments
    ///
    /// * `paths` - Input archives in merge order
    /// * `progress` - Receiver of status events
    ///
    /// # Returns
    ///
    /// * `Ok(MergeResult)` - The outcome, successful or not
    /// * `Err(Error)` - The working directory could not be created
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use gappei::prelude::*;
    /// # #[tokio::main]
    /// # async fn main() -> gappei::error::Result<()> {
    /// let config = GappeiConfig::builder()
    ///     .output_path(PathBuf::from("./merged.cbz"))
    ///     .build()?;
    ///
    /// let inputs = vec![PathBuf::from("vol1.cbz"), PathBuf::from("extras.zip")];
    /// let result = config.merge_files(&inputs, &NoProgress).await?;
    /// println!("{} pages written", result.total_pages);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn merge_files(
        &self,
        paths: &[PathBuf],
        progress: &dyn ProgressSink,
    ) -> Result<MergeResult> {
        let output_path = self.output_path.clone();
        log::info!("Merging {} files into {:?}", paths.len(), output_path);

        progress.report(MergeProgress {
            phase: MergePhase::Validating,
            current_file: String::new(),
            current: 0,
            total: paths.len(),
            message: "Validating input files".to_string(),
        });

        let config = self.clone();
        let owned_paths = paths.to_vec();
        let report = match spawn_blocking(move || config.validate_inputs(&owned_paths)).await {
            Ok(report) => report,
            Err(e) => {
                return Ok(fail(
                    progress,
                    MergeResult::failed(&output_path, format!("Validation task failed: {}", e)),
                    0,
                    paths.len(),
                ));
            }
        };

        if report.valid_files.is_empty() && report.invalid_files.is_empty() {
            return Ok(fail(
                progress,
                MergeResult::failed(&output_path, "No input files selected"),
                0,
                0,
            ));
        }
        if !report.invalid_files.is_empty() {
            let reasons = report
                .invalid_files
                .iter()
                .map(|invalid| format!("{}: {}", display_name(&invalid.path), invalid.reason))
                .collect::<Vec<_>>()
                .join("; ");
            let mut result =
                MergeResult::failed(&output_path, format!("Invalid input files: {}", reasons));
            result.invalid_files = report.invalid_files;
            return Ok(fail(progress, result, 0, paths.len()));
        }

        if let Err(e) = validate_output_path(&output_path) {
            return Ok(fail(
                progress,
                MergeResult::failed(&output_path, e.to_string()),
                0,
                paths.len(),
            ));
        }

        log::debug!(
            "Validated {} inputs: {} pages, {}",
            report.valid_files.len(),
            report.total_pages,
            human_size(report.total_size)
        );

        let work_dir = self.create_work_dir()?;
        log::debug!("Working directory: {:?}", work_dir.path());

        let total = report.valid_files.len();
        let mut next_page = 1;
        let mut merged_files = Vec::with_capacity(total);
        let mut errors = Vec::new();

        for (index, input) in report.valid_files.into_iter().enumerate() {
            let ValidatedInput {
                path,
                display_name,
                plan,
            } = input;

            progress.report(MergeProgress {
                phase: MergePhase::Processing,
                current_file: path_to_string_lossy(&path),
                current: index,
                total,
                message: format!("Processing file {}/{}", index + 1, total),
            });

            let kind = plan.kind();
            let (chapter_prefix, formats) = match &plan {
                SourcePlan::Cbz { .. } => (None, None),
                SourcePlan::Zip { formats, .. } => (
                    Some(chapter_prefix(index)),
                    Some(formats.iter().copied().collect::<Vec<_>>()),
                ),
            };

            let staging = work_dir.path().to_path_buf();
            let first_page = next_page;
            let step =
                spawn_blocking(move || process_source(&plan, index, &staging, first_page)).await;

            match step.map_err(Error::from).and_then(|outcome| outcome) {
                Ok(advanced) => {
                    let pages = advanced - first_page;
                    log::info!(
                        "Added {} pages from '{}' as pages {}..{}",
                        pages,
                        display_name,
                        first_page,
                        advanced - 1
                    );
                    next_page = advanced;
                    merged_files.push(SourceSummary {
                        path,
                        display_name,
                        kind,
                        pages,
                        chapter_prefix,
                        formats,
                    });
                }
                Err(e) => {
                    let message = format!("Error processing {}: {}", display_name, e);
                    log::warn!("{}", message);
                    errors.push(message);
                }
            }
        }

        progress.report(MergeProgress {
            phase: MergePhase::Packaging,
            current_file: "output".to_string(),
            current: total,
            total,
            message: "Creating merged archive".to_string(),
        });

        let packaged = match collect_pages(work_dir.path()).await {
            Ok(pages) if pages.is_empty() => {
                Err(Error::Other("No images were processed successfully".to_string()))
            }
            Ok(pages) => self.package(&pages, &merged_files).await,
            Err(e) => Err(e),
        };

        if let Err(e) = work_dir.close() {
            log::warn!("Failed to remove working directory: {}", e);
        }

        let result = MergeResult {
            success: packaged.is_ok(),
            output_path,
            merged_files,
            total_pages: next_page - 1,
            errors,
            error: packaged.err().map(|e| e.to_string()),
            invalid_files: Vec::new(),
        };

        if !result.success {
            return Ok(fail(progress, result, total, total));
        }

        log::info!(
            "Merged {} files ({} pages) into {:?}",
            result.merged_files.len(),
            result.total_pages,
            result.output_path
        );
        progress.report(MergeProgress {
            phase: MergePhase::Done,
            current_file: path_to_string_lossy(&result.output_path),
            current: total,
            total,
            message: "Merge complete".to_string(),
        });

        Ok(result)
    }

    /// Runs [`merge_files`](GappeiConfig::merge_files) on a new Tokio task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_merge(
        self,
        paths: Vec<PathBuf>,
        progress: Arc<dyn ProgressSink>,
    ) -> JoinHandle<Result<MergeResult>> {
        tokio::spawn(async move { self.merge_files(&paths, progress.as_ref()).await })
    }

    fn create_work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);

        let work_dir = match &self.work_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        work_dir.map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to create working directory: {}", e),
            ))
        })
    }

    async fn package(&self, pages: &[PathBuf], sources: &[SourceSummary]) -> Result<PathBuf> {
        let mut generator = Cbz::new(&self.output_path)?;

        for page in pages {
            generator.add_page(page).await?;
        }

        if self.preserve_metadata && !sources.is_empty() {
            generator.set_metadata(&build_metadata(sources)).await?;
        }

        generator.save().await
    }
}

impl GappeiConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(output_path) = &self.output_path {
            if output_path.as_os_str().is_empty() {
                return Err("Output path must not be empty.".to_string());
            }
        }

        if let Some(Some(work_dir)) = &self.work_dir {
            if !work_dir.is_dir() {
                return Err(format!(
                    "Working directory root is not a directory: {:?}",
                    work_dir
                ));
            }
        }

        Ok(())
    }
}

/// Suggests a free `.cbz` path in `directory` for an archive titled `title`.
pub fn suggest_output_path(directory: &Path, title: &str) -> PathBuf {
    unique_file_name(directory, title, "cbz")
}

/// Chapter prefix of the input at `index` (0-based) in the merge list.
pub fn chapter_prefix(index: usize) -> String {
    format!("ch{}", index + 1)
}

/// File name of global page `page` in the working directory.
pub fn page_file_name(page: usize, format: ImageFormat) -> String {
    format!("{:04}.{}", page, format)
}

/// Reports the failure at position `current` of `total` and hands the result back.
fn fail(
    progress: &dyn ProgressSink,
    result: MergeResult,
    current: usize,
    total: usize,
) -> MergeResult {
    let reason = result.error.clone().unwrap_or_default();
    log::error!("Merge into {:?} failed: {}", result.output_path, reason);

    progress.report(MergeProgress {
        phase: MergePhase::Failed,
        current_file: path_to_string_lossy(&result.output_path),
        current,
        total,
        message: reason,
    });

    result
}

/// Turns one input into working directory pages starting at `next_page`.
///
/// Returns the next free page number. On failure every page this step wrote is
/// removed again, so the working directory only holds pages of successful inputs.
fn process_source(
    plan: &SourcePlan,
    index: usize,
    work_dir: &Path,
    next_page: usize,
) -> Result<usize> {
    let mut written = Vec::new();

    let outcome = match plan {
        SourcePlan::Cbz { info } => process_cbz(info, work_dir, next_page, &mut written),
        SourcePlan::Zip { scan, formats } => process_zip(
            scan,
            formats,
            &chapter_prefix(index),
            work_dir,
            next_page,
            &mut written,
        ),
    };

    if outcome.is_err() {
        for page in &written {
            if let Err(e) = fs::remove_file(page) {
                log::warn!("Failed to roll back page {:?}: {}", page, e);
            }
        }
    }

    outcome
}

fn process_cbz(
    info: &ArchiveInfo,
    work_dir: &Path,
    next_page: usize,
    written: &mut Vec<PathBuf>,
) -> Result<usize> {
    let scratch = tempfile::Builder::new().prefix("cbz_").tempdir_in(work_dir)?;
    let mut archive = open_archive(&info.path)?;

    // Unpack under neutral names; nested entry directories are flattened.
    let mut unpacked = Vec::with_capacity(info.image_entries.len());
    for (sequence, name) in info.image_entries.iter().enumerate() {
        let format = ImageFormat::from_name(name)
            .ok_or_else(|| Error::Unsupported(format!("Image format of entry '{}'", name)))?;
        let destination = scratch.path().join(format!("{:06}.{}", sequence, format));

        let mut entry = archive.by_name(name)?;
        let mut output = File::create(&destination)?;
        io::copy(&mut entry, &mut output)?;
        unpacked.push((destination, format));
    }

    if unpacked.is_empty() {
        return Err(Error::NoImages(
            info.path.clone(),
            format_list_to_string(&all_formats()),
        ));
    }

    let mut page = next_page;
    for (source, format) in unpacked {
        let destination = work_dir.join(page_file_name(page, format));
        fs::rename(&source, &destination)?;
        written.push(destination);
        page += 1;
    }

    Ok(page)
}

fn process_zip(
    scan: &ZipScan,
    formats: &BTreeSet<ImageFormat>,
    chapter_prefix: &str,
    work_dir: &Path,
    next_page: usize,
    written: &mut Vec<PathBuf>,
) -> Result<usize> {
    let scratch = tempfile::Builder::new().prefix("zip_").tempdir_in(work_dir)?;

    let outcome = extract_images(&scan.path, scratch.path(), formats, chapter_prefix);
    if !outcome.success {
        return Err(Error::Other(outcome.error.unwrap_or_else(|| {
            format!("Extraction from {:?} failed", scan.path)
        })));
    }

    let mut page = next_page;
    for source in outcome.extracted_files {
        let format = ImageFormat::from_name(&path_to_string_lossy(&source))
            .ok_or_else(|| Error::Unsupported(format!("Image format of {:?}", source)))?;
        let destination = work_dir.join(page_file_name(page, format));
        fs::rename(&source, &destination)?;
        written.push(destination);
        page += 1;
    }

    Ok(page)
}

/// Lists the page files of the working directory in natural file name order.
async fn collect_pages(work_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(work_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if ImageFormat::from_name(&name).is_some() {
            pages.push((name, entry.path()));
        }
    }

    pages.par_sort_by(|a, b| natural_cmp(&a.0, &b.0));

    Ok(pages.into_iter().map(|(_, path)| path).collect())
}
