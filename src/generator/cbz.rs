use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::metadata::COMIC_INFO_FILE_NAME;
use crate::path_utils::{get_file_name_lossy, path_to_string_lossy};
use crate::types::ImageFormat;
use async_trait::async_trait;
use memmap2::MmapOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A generator for creating CBZ (Comic Book ZIP) files.
///
/// The archive is written to a hidden temporary file next to the output path and
/// moved into place by [`save`](Generator::save) without replacing an existing file.
/// Dropping an unsaved `Cbz` deletes the temporary file.
pub struct Cbz {
    zip: Option<ZipWriter<NamedTempFile>>,
    options: SimpleFileOptions,
    output_path: PathBuf,
    page_count: usize,
}

impl Cbz {
    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<NamedTempFile>> {
        self.zip
            .as_mut()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))
    }
}

#[async_trait]
impl Generator for Cbz {
    fn new(output_path: &Path) -> Result<Self> {
        let options: SimpleFileOptions = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let output_dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp_file = tempfile::Builder::new()
            .prefix(".gappei-")
            .suffix(".cbz.part")
            .tempfile_in(output_dir)?;

        log::debug!(
            "Writing {:?} through temporary file {:?}",
            output_path,
            temp_file.path()
        );

        Ok(Cbz {
            zip: Some(ZipWriter::new(temp_file)),
            options,
            output_path: output_path.to_path_buf(),
            page_count: 0,
        })
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self> {
        let file_name = get_file_name_lossy(image_path);
        if ImageFormat::from_name(&file_name).is_none() {
            return Err(Error::Unsupported(format!("Image format of {:?}", image_path)));
        }

        // Open the file
        let file = fs::File::open(image_path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open page file '{}': {}",
                    path_to_string_lossy(image_path),
                    e
                ),
            ))
        })?;
        let length = file.metadata().await?.len();
        let file_std = file.into_std().await;
        let options = self.options;

        let zip = self.writer()?;
        zip.start_file(file_name, options)?;

        // Empty files cannot be mapped
        if length > 0 {
            // Create the read-only memory map
            let mmap = spawn_blocking(move || unsafe { MmapOptions::new().map(&file_std) })
                .await
                .map_err(|e| Error::Other(format!("Memory map task failed: {}", e)))??;

            zip.write_all(&mmap[..])?;
        }

        self.page_count += 1;

        Ok(self)
    }

    async fn set_metadata(&mut self, document: &str) -> Result<&mut Self> {
        let options = self.options;
        let zip = self.writer()?;

        zip.start_file(COMIC_INFO_FILE_NAME, options)?;
        zip.write_all(document.as_bytes())?;

        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        // Take ownership of the zip writer
        let zip = self
            .zip
            .take()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))?;
        let output_path = self.output_path.clone();

        // Finish and publish the archive in a blocking task
        spawn_blocking(move || -> Result<PathBuf> {
            let temp_file = zip.finish()?;
            temp_file.as_file().sync_all()?;
            temp_file
                .persist_noclobber(&output_path)
                .map_err(|e| Error::Io(e.error))?;
            Ok(output_path)
        })
        .await?
    }
}
