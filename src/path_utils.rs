//! Path utilities for safe and robust file path handling.
//!
//! This module provides the path-level rules shared by the inspector, the extractor
//! and the merge orchestrator: natural ordering of page names, rejection of unsafe
//! container entry names, output path validation, and file name helpers.

use crate::error::{Error, Result};

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

lazy_static! {
    /// Splits a file name into alternating runs of decimal digits (any script) and everything else.
    static ref NATURAL_RUN_REGEX: Regex = Regex::new(r"\d+|\D+").unwrap();
    static ref DECIMAL_DIGIT_REGEX: Regex = Regex::new(r"^\d$").unwrap();
}

/// Stems Windows refuses as file names, whatever the extension.
const RESERVED_FILE_STEMS: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Longest accepted file name, in characters.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, using lossy conversion if necessary
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Returns true if `path` has the given extension, ignoring case.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Checks if a path contains characters that break archive or file system handling.
///
/// # Arguments
///
/// * `path` - The path to validate
///
/// # Returns
///
/// * `Result<()>` - Ok if the path is valid, or an error describing the issue
pub fn validate_path(path: &Path) -> Result<()> {
    let path_str = path_to_string_lossy(path);

    if path_str
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Checks that `output_path` can receive a new merged archive.
///
/// The parent directory must exist and accept new files, the name must pass
/// [`validate_file_name`] and end in `.cbz`, and nothing may already exist at the path. Nothing is created or
/// modified by this check.
pub fn validate_output_path(output_path: &Path) -> Result<()> {
    if output_path.as_os_str().is_empty() {
        return Err(Error::InvalidPath(
            output_path.to_path_buf(),
            "Output path is empty".to_string(),
        ));
    }

    validate_path(output_path)?;
    validate_file_name(&get_file_name_lossy(output_path)).map_err(|reason| {
        Error::InvalidPath(output_path.to_path_buf(), reason)
    })?;

    if !has_extension(output_path, "cbz") {
        return Err(Error::InvalidPath(
            output_path.to_path_buf(),
            "Output file must use the .cbz extension".to_string(),
        ));
    }

    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !parent.exists() {
        return Err(Error::InvalidPath(
            parent.to_path_buf(),
            "Directory does not exist".to_string(),
        ));
    }
    if !parent.is_dir() {
        return Err(Error::InvalidPath(
            parent.to_path_buf(),
            "Parent path is not a directory".to_string(),
        ));
    }
    // An anonymous temp file is the only reliable writability probe across platforms.
    if let Err(e) = tempfile::tempfile_in(parent) {
        return Err(Error::InvalidPath(
            parent.to_path_buf(),
            format!("Directory is not writable: {}", e),
        ));
    }

    if output_path.symlink_metadata().is_ok() {
        return Err(Error::InvalidPath(
            output_path.to_path_buf(),
            "File already exists".to_string(),
        ));
    }

    Ok(())
}

/// Checks a single file name against the rules of common file systems.
///
/// Rejects empty names, the characters `<>:"/\\|?*`, Windows reserved stems such as
/// `CON` or `lpt1` (any case, any extension), names longer than
/// [`MAX_FILE_NAME_LENGTH`] characters, and names starting or ending with a dot or
/// a space. The error is a human readable reason.
pub fn validate_file_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("File name is empty".to_string());
    }

    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
    {
        return Err(format!("File name contains invalid character '{}'", c));
    }

    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    if RESERVED_FILE_STEMS.contains(&stem.as_str()) {
        return Err(format!("File name uses the reserved name '{}'", stem));
    }

    if name.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(format!(
            "File name is longer than {} characters",
            MAX_FILE_NAME_LENGTH
        ));
    }

    if name.starts_with(['.', ' ']) || name.ends_with(['.', ' ']) {
        return Err("File name must not start or end with a dot or a space".to_string());
    }

    Ok(())
}

/// Returns true if a container entry name can be written below a directory
/// without escaping it: no leading separator and no `..` segment.
pub fn is_safe_entry_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.starts_with('\\') {
        return false;
    }

    !name.split(['/', '\\']).any(|segment| segment == "..")
}

/// Returns the last path segment of a container entry name.
pub fn leaf_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

enum NaturalRun {
    Text(String),
    /// ASCII digits of the run's value, without leading zeros.
    Number(String),
}

fn is_decimal_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    c.is_numeric() && DECIMAL_DIGIT_REGEX.is_match(c.encode_utf8(&mut [0; 4]))
}

/// Value of a decimal digit of any script.
///
/// Unicode encodes every set of decimal digits as a contiguous range from zero to
/// nine, so the value is the distance to the start of the range, modulo ten.
fn decimal_digit_value(c: char) -> u32 {
    if let Some(value) = c.to_digit(10) {
        return value;
    }

    let mut start = c as u32;
    while let Some(previous) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(previous) {
            break;
        }
        start -= 1;
    }
    (c as u32 - start) % 10
}

fn natural_runs(name: &str) -> Vec<NaturalRun> {
    let mut runs = Vec::new();

    for run in NATURAL_RUN_REGEX.find_iter(name) {
        let text = run.as_str();
        if text.starts_with(is_decimal_digit) {
            // Keep text runs on even positions so runs of different kinds never meet.
            if runs.is_empty() {
                runs.push(NaturalRun::Text(String::new()));
            }
            let digits: String = text
                .chars()
                .filter_map(|c| char::from_digit(decimal_digit_value(c), 10))
                .skip_while(|c| *c == '0')
                .collect();
            runs.push(NaturalRun::Number(digits));
        } else {
            runs.push(NaturalRun::Text(text.to_lowercase()));
        }
    }

    runs
}

fn compare_runs(a: &NaturalRun, b: &NaturalRun) -> Ordering {
    match (a, b) {
        (NaturalRun::Text(a), NaturalRun::Text(b)) => a.cmp(b),
        // Leading zeros are already stripped, so a longer run is a larger integer.
        (NaturalRun::Number(a), NaturalRun::Number(b)) => {
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (NaturalRun::Text(_), NaturalRun::Number(_)) => Ordering::Less,
        (NaturalRun::Number(_), NaturalRun::Text(_)) => Ordering::Greater,
    }
}

/// Compares two names in natural order.
///
/// Digit runs compare as integers of any length, in any script (so full-width
/// `第２話` sorts before `第１０話`), other runs compare case-insensitively, so
/// `page2` sorts before `page10` and `Img2.jpg` equals `img2.jpg`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_runs = natural_runs(a);
    let b_runs = natural_runs(b);

    for (a_run, b_run) in a_runs.iter().zip(b_runs.iter()) {
        match compare_runs(a_run, b_run) {
            Ordering::Equal => continue,
            order => return order,
        }
    }

    a_runs.len().cmp(&b_runs.len())
}

/// Natural order on the leaf file name of two container entries.
pub fn natural_cmp_leaf(a: &str, b: &str) -> Ordering {
    natural_cmp(leaf_name(a), leaf_name(b))
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
///
/// Leading and trailing spaces and dots are removed; an empty result becomes
/// `"unnamed"`.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Finds a file name in `directory` that does not exist yet.
///
/// Tries `{base}.{extension}`, then `{base}_1.{extension}`, `{base}_2.{extension}` and so on.
pub fn unique_file_name(directory: &Path, base_name: &str, extension: &str) -> PathBuf {
    let base_name = sanitize_filename(base_name);
    let extension = extension.trim_start_matches('.');

    let mut candidate = directory.join(format!("{}.{}", base_name, extension));
    let mut counter = 1;
    while candidate.symlink_metadata().is_ok() {
        candidate = directory.join(format!("{}_{}.{}", base_name, counter, extension));
        counter += 1;
    }
    candidate
}

/// Formats a byte count as `"12.3 MB"`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}
