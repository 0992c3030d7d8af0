//! Archive classification and inspection.
//!
//! This module answers two questions about a candidate input file without writing
//! anything to disk: what kind of archive it is ([`classify`] / [`detect`]), and which
//! pages it holds ([`inspect`] for CBZ-style listings, [`scan_zip`] for generic ZIPs).

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::path_utils::{has_extension, is_safe_entry_name, natural_cmp_leaf};
use crate::types::{
    ArchiveInfo, ArchiveKind, ImageEntry, ImageFormat, ZipScan, all_formats, display_name,
    format_list_to_string,
};

/// Image entries larger than this (uncompressed) are ignored during a ZIP scan.
pub const MAX_IMAGE_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

/// Case-insensitive file name suffix of the embedded metadata document.
pub const COMIC_INFO_SUFFIX: &str = "comicinfo.xml";

/// Opens `path` as a ZIP container, reporting container errors as [`Error::InvalidArchive`].
pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| Error::InvalidArchive(path.to_path_buf(), e.to_string()))
}

fn to_naive_datetime(date_time: zip::DateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        date_time.year().into(),
        date_time.month().into(),
        date_time.day().into(),
    )?
    .and_hms_opt(
        date_time.hour().into(),
        date_time.minute().into(),
        date_time.second().into(),
    )
}

/// Classifies `path`, explaining why it was rejected.
///
/// The CBZ rule is checked first: a `.cbz` file whose container opens is a CBZ.
/// A `.zip` file is a ZIP when its container opens and at least one safe entry
/// is a supported image. Everything else is an error describing the reason.
pub fn detect(path: &Path) -> Result<ArchiveKind> {
    if !path.is_file() {
        return Err(Error::NotFound(format!(
            "File does not exist or is not a file: {:?}",
            path
        )));
    }

    if has_extension(path, "cbz") {
        let archive = open_archive(path)?;
        log::debug!("{:?} opened as CBZ with {} entries", path, archive.len());
        return Ok(ArchiveKind::Cbz);
    }

    if has_extension(path, "zip") {
        let scan = scan_zip(path)?;
        if scan.image_entries.is_empty() {
            return Err(Error::NoImages(
                path.to_path_buf(),
                format_list_to_string(&all_formats()),
            ));
        }
        log::debug!(
            "{:?} opened as ZIP with {} image entries",
            path,
            scan.image_entries.len()
        );
        return Ok(ArchiveKind::Zip);
    }

    Err(Error::Unsupported(format!(
        "Not a CBZ or ZIP file: {:?}",
        path
    )))
}

/// Classifies `path` as CBZ, ZIP or unknown. Never fails.
pub fn classify(path: &Path) -> ArchiveKind {
    match detect(path) {
        Ok(kind) => kind,
        Err(e) => {
            log::debug!("Classified {:?} as unknown: {}", path, e);
            ArchiveKind::Unknown
        }
    }
}

/// Lists an archive the way a CBZ reader would.
///
/// Image entries are kept in lexicographic container path order, trusting the
/// numbering of whatever tool authored the archive. The first entry whose name
/// ends with `comicinfo.xml` (any case) is read as the metadata document.
pub fn inspect(path: &Path) -> Result<ArchiveInfo> {
    let file_size = fs::metadata(path)?.len();
    let mut archive = open_archive(path)?;
    let total_entries = archive.len();

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    let comic_info = match names
        .iter()
        .find(|name| name.to_lowercase().ends_with(COMIC_INFO_SUFFIX))
    {
        Some(name) => read_comic_info(&mut archive, name),
        None => None,
    };

    let mut image_entries: Vec<String> = names
        .into_iter()
        .filter(|name| !name.ends_with('/') && is_safe_entry_name(name))
        .filter(|name| ImageFormat::from_name(name).is_some())
        .collect();
    image_entries.par_sort();

    let kind = if has_extension(path, "cbz") {
        ArchiveKind::Cbz
    } else if has_extension(path, "zip") && !image_entries.is_empty() {
        ArchiveKind::Zip
    } else {
        ArchiveKind::Unknown
    };

    Ok(ArchiveInfo {
        path: path.to_path_buf(),
        display_name: display_name(path),
        kind,
        file_size,
        image_entries,
        comic_info,
        total_entries,
    })
}

fn read_comic_info(archive: &mut ZipArchive<File>, name: &str) -> Option<String> {
    let mut bytes = Vec::new();
    let read = archive
        .by_name(name)
        .map_err(Error::from)
        .and_then(|mut entry| entry.read_to_end(&mut bytes).map_err(Error::from));

    match read {
        Ok(_) => String::from_utf8(bytes).ok(),
        Err(e) => {
            log::warn!("Could not read metadata document '{}': {}", name, e);
            None
        }
    }
}

/// Scans a generic ZIP for page images.
///
/// Directory entries, unsafe names (leading separator or `..` segments) and
/// images above [`MAX_IMAGE_ENTRY_SIZE`] are skipped. The surviving entries are
/// sorted in natural order of their leaf file name.
pub fn scan_zip(path: &Path) -> Result<ZipScan> {
    let file_size = fs::metadata(path)?.len();
    let mut archive = open_archive(path)?;
    let total_entries = archive.len();

    let mut image_entries = Vec::new();
    let mut formats_present = BTreeSet::new();

    for index in 0..total_entries {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();

        if entry.is_dir() || name.ends_with('/') {
            continue;
        }
        if !is_safe_entry_name(&name) {
            log::warn!("Skipping unsafe entry '{}' in {:?}", name, path);
            continue;
        }
        let Some(extension) = ImageFormat::from_name(&name) else {
            continue;
        };
        if entry.size() > MAX_IMAGE_ENTRY_SIZE {
            log::warn!(
                "Skipping oversized image '{}' in {:?} ({} bytes)",
                name,
                path,
                entry.size()
            );
            continue;
        }

        formats_present.insert(extension);
        image_entries.push(ImageEntry {
            name,
            extension,
            size: entry.size(),
            compressed_size: entry.compressed_size(),
            modified: entry.last_modified().and_then(to_naive_datetime),
        });
    }

    image_entries.par_sort_by(|a, b| natural_cmp_leaf(&a.name, &b.name));

    Ok(ZipScan {
        path: path.to_path_buf(),
        file_size,
        total_entries,
        image_entries,
        formats_present,
    })
}
