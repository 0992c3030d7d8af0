//! Common test utilities and constants for the Gappei crate.
//!
//! Provides functions for setting up test directories, building CBZ and ZIP
//! fixtures, and reading merged archives back.

use image::{Rgb, RgbImage};
use rand::{Rng, distributions::Alphanumeric};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use zip::write::SimpleFileOptions;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Directories of one test case.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    /// Where fixtures are written.
    pub input_dir: PathBuf,
    /// Where merged archives are written.
    pub output_dir: PathBuf,
    /// Root for merge working directories; empty again after every merge.
    pub work_root: PathBuf,
}

/// Helper function to create a clean, uniquely named test directory.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }

    let dirs = TestDirs {
        input_dir: base_dir.join("input"),
        output_dir: base_dir.join("output"),
        work_root: base_dir.join("work"),
        base_dir,
    };
    fs::create_dir_all(&dirs.input_dir).await.unwrap();
    fs::create_dir_all(&dirs.output_dir).await.unwrap();
    fs::create_dir_all(&dirs.work_root).await.unwrap();

    dirs
}

/// Encodes a small solid-color JPEG.
#[allow(dead_code)]
pub fn jpeg_bytes(color: Rgb<u8>) -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, color);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Jpeg).unwrap();
    buffer.into_inner()
}

/// Encodes a small solid-color PNG.
#[allow(dead_code)]
pub fn png_bytes(color: Rgb<u8>) -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, color);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// Page payload that identifies where it came from. Pages are copied verbatim,
/// so a merged archive can be checked by reading these labels back.
#[allow(dead_code)]
pub fn labeled_page(label: &str) -> Vec<u8> {
    format!("page:{}", label).into_bytes()
}

/// Writes a ZIP container at `path` with the given entries, in order.
///
/// Names ending with `/` become directory entries.
#[allow(dead_code)]
pub fn create_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }

    zip.finish().unwrap();
}

/// Writes a ZIP container whose entries are stored uncompressed.
#[allow(dead_code)]
pub fn create_stored_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
}

/// Writes a ZIP container whose first entry `name` holds `size` zero bytes, deflated,
/// followed by `entries`. The archive stays small however large `size` is.
#[allow(dead_code)]
pub fn create_zip_with_zeroed_entry(
    path: &Path,
    name: &str,
    size: u64,
    entries: &[(&str, &[u8])],
) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(name, options).unwrap();
    let chunk = vec![0u8; 1024 * 1024];
    let mut remaining = size;
    while remaining > 0 {
        let len = remaining.min(chunk.len() as u64) as usize;
        zip.write_all(&chunk[..len]).unwrap();
        remaining -= len as u64;
    }

    for (entry_name, data) in entries {
        zip.start_file(*entry_name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
}

/// Creates a CBZ with `pages` labeled pages named `001.jpg`, `002.jpg`, ...
/// Labels are `{label}-{n}`.
#[allow(dead_code)]
pub fn create_labeled_cbz(path: &Path, label: &str, pages: usize) {
    let names: Vec<String> = (1..=pages).map(|n| format!("{:03}.jpg", n)).collect();
    let payloads: Vec<Vec<u8>> = (1..=pages)
        .map(|n| labeled_page(&format!("{}-{}", label, n)))
        .collect();
    let entries: Vec<(&str, &[u8])> = names
        .iter()
        .zip(payloads.iter())
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    create_zip(path, &entries);
}

/// Overwrites the first occurrence of `needle` in the file with `replacement`.
///
/// Used to damage a stored entry's payload so its checksum no longer matches.
#[allow(dead_code)]
pub fn corrupt_bytes(path: &Path, needle: &[u8], replacement: &[u8]) {
    assert_eq!(needle.len(), replacement.len());
    let mut bytes = std::fs::read(path).unwrap();
    let position = bytes
        .windows(needle.len())
        .position(|window| window == needle)
        .expect("needle not found");
    bytes[position..position + needle.len()].copy_from_slice(replacement);
    std::fs::write(path, bytes).unwrap();
}

/// Lists the entry names of an archive in container order.
#[allow(dead_code)]
pub fn entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Lists the page entries of an archive, without the metadata document.
#[allow(dead_code)]
pub fn page_names(path: &Path) -> Vec<String> {
    entry_names(path)
        .into_iter()
        .filter(|name| name != "ComicInfo.xml")
        .collect()
}

/// Reads one entry of an archive.
#[allow(dead_code)]
pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    content
}

/// Reads the payloads of all pages of an archive, as text, in container order.
#[allow(dead_code)]
pub fn page_labels(path: &Path) -> Vec<String> {
    page_names(path)
        .iter()
        .map(|name| String::from_utf8_lossy(&read_entry(path, name)).to_string())
        .collect()
}

/// Checks if a ZIP file exists and contains at least one entry.
#[allow(dead_code)]
pub async fn assert_valid_zip_file(path: &Path) {
    assert!(path.exists(), "Output ZIP file does not exist: {:?}", path);
    assert!(path.is_file(), "Output ZIP path is not a file: {:?}", path);

    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let zip = zip::ZipArchive::new(file_std).unwrap();
    assert!(zip.len() > 0, "Output ZIP file is empty: {:?}", path);
}

/// Reads the ComicInfo.xml from a CBZ file, if it has one.
#[allow(dead_code)]
pub async fn get_comic_info_xml(cbz_path: &Path) -> Option<String> {
    let file = fs::File::open(cbz_path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    let mut file = archive.by_name("ComicInfo.xml").ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    Some(content)
}

/// Number of entries left in a directory.
#[allow(dead_code)]
pub fn dir_entry_count(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}
