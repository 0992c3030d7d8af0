//! Unit tests for core Gappei functionality.
//!
//! Tests classification, inspection, extraction and the validation gate in isolation,
//! without running a full merge.

use gappei::error::Result;
use gappei::extractor::extract_images;
use gappei::inspector::MAX_IMAGE_ENTRY_SIZE;
use gappei::path_utils::validate_output_path;
use gappei::prelude::*;
use gappei::types::default_formats;
use image::Rgb;
use std::collections::BTreeSet;

mod common;
use common::{
    create_labeled_cbz, create_zip, create_zip_with_zeroed_entry, dir_entry_count, jpeg_bytes,
    labeled_page, png_bytes, setup_test_dirs,
};

fn config_for(output_path: PathBuf) -> Result<GappeiConfig> {
    Ok(GappeiConfig::builder().output_path(output_path).build()?)
}

#[tokio::test]
async fn test_classify_recognizes_supported_archives() -> Result<()> {
    let test_dirs = setup_test_dirs("classify").await;
    let cbz = test_dirs.input_dir.join("volume.cbz");
    let zip = test_dirs.input_dir.join("chapter.zip");
    let text_zip = test_dirs.input_dir.join("notes.zip");
    let broken = test_dirs.input_dir.join("broken.cbz");
    let other = test_dirs.input_dir.join("readme.txt");

    create_labeled_cbz(&cbz, "v", 2);
    create_zip(&zip, &[("page1.jpg", &jpeg_bytes(Rgb([255, 0, 0])))]);
    create_zip(&text_zip, &[("readme.txt", b"hello")]);
    std::fs::write(&broken, b"this is not a zip archive")?;
    std::fs::write(&other, b"plain text")?;

    assert_eq!(classify(&cbz), ArchiveKind::Cbz);
    assert_eq!(classify(&zip), ArchiveKind::Zip);
    assert_eq!(classify(&text_zip), ArchiveKind::Unknown);
    assert_eq!(classify(&broken), ArchiveKind::Unknown);
    assert_eq!(classify(&other), ArchiveKind::Unknown);
    assert_eq!(
        classify(&test_dirs.input_dir.join("missing.cbz")),
        ArchiveKind::Unknown
    );
    assert_eq!(classify(&test_dirs.input_dir), ArchiveKind::Unknown);

    Ok(())
}

#[tokio::test]
async fn test_inspect_lists_pages_and_metadata() -> Result<()> {
    let test_dirs = setup_test_dirs("inspect").await;
    let cbz = test_dirs.input_dir.join("volume.cbz");
    create_zip(
        &cbz,
        &[
            ("pages/", b""),
            ("pages/002.jpg", &labeled_page("2")),
            ("pages/001.jpg", &labeled_page("1")),
            ("pages/010.png", &labeled_page("10")),
            ("meta/COMICINFO.XML", b"<ComicInfo><Title>Vol</Title></ComicInfo>"),
            ("thumbs.db", b"junk"),
        ],
    );

    let info = inspect(&cbz)?;

    assert_eq!(info.kind, ArchiveKind::Cbz);
    assert_eq!(info.display_name, "volume.cbz");
    assert_eq!(info.total_entries, 6);
    assert_eq!(
        info.image_entries,
        vec!["pages/001.jpg", "pages/002.jpg", "pages/010.png"]
    );
    assert_eq!(info.page_count(), 3);
    assert_eq!(
        info.comic_info.as_deref(),
        Some("<ComicInfo><Title>Vol</Title></ComicInfo>")
    );
    assert!(info.file_size > 0);

    Ok(())
}

#[tokio::test]
async fn test_inspection_is_idempotent() -> Result<()> {
    let test_dirs = setup_test_dirs("inspect_idempotent").await;
    let cbz = test_dirs.input_dir.join("volume.cbz");
    let zip = test_dirs.input_dir.join("chapter.zip");
    create_labeled_cbz(&cbz, "v", 5);
    create_zip(
        &zip,
        &[("b10.jpg", &labeled_page("b10")), ("b2.jpg", &labeled_page("b2"))],
    );

    assert_eq!(inspect(&cbz)?, inspect(&cbz)?);
    assert_eq!(scan_zip(&zip)?, scan_zip(&zip)?);

    Ok(())
}

#[tokio::test]
async fn test_scan_zip_orders_naturally_and_skips_unsafe_entries() -> Result<()> {
    let test_dirs = setup_test_dirs("scan_zip").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    create_zip(
        &zip,
        &[
            ("img10.jpg", &labeled_page("10")),
            ("img2.jpg", &labeled_page("2")),
            ("IMG1.jpg", &labeled_page("1")),
            ("nested/", b""),
            ("nested/img3.png", &labeled_page("3")),
            ("../evil.jpg", &labeled_page("evil")),
            ("notes.txt", b"not a page"),
        ],
    );

    let scan = scan_zip(&zip)?;
    let names: Vec<&str> = scan.image_entries.iter().map(|e| e.name.as_str()).collect();

    assert_eq!(
        names,
        vec!["IMG1.jpg", "img2.jpg", "nested/img3.png", "img10.jpg"]
    );
    assert_eq!(scan.total_entries, 7);
    assert_eq!(
        scan.formats_present,
        BTreeSet::from([ImageFormat::Jpg, ImageFormat::Png])
    );
    assert_eq!(scan.count_matching(&default_formats()), 3);
    assert!(scan.image_entries.iter().all(|e| e.size > 0));

    Ok(())
}

#[tokio::test]
async fn test_oversized_entries_are_skipped() -> Result<()> {
    let test_dirs = setup_test_dirs("oversized_entry").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    let output = test_dirs.base_dir.join("extracted");
    let small = labeled_page("small");
    create_zip_with_zeroed_entry(
        &zip,
        "huge.jpg",
        MAX_IMAGE_ENTRY_SIZE + 1,
        &[("small.jpg", &small)],
    );

    let scan = scan_zip(&zip)?;
    let names: Vec<&str> = scan.image_entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["small.jpg"]);
    assert_eq!(scan.total_entries, 2);

    let outcome = extract_images(&zip, &output, &default_formats(), "ch1");
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.extracted_count, 1);
    assert_eq!(std::fs::read(output.join("ch1_001.jpg"))?, small);
    assert_eq!(dir_entry_count(&output), 1);

    Ok(())
}

#[tokio::test]
async fn test_extract_images_filters_formats_and_names_by_chapter() -> Result<()> {
    let test_dirs = setup_test_dirs("extract_filter").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    let output = test_dirs.base_dir.join("extracted");
    create_zip(
        &zip,
        &[
            ("a.png", &png_bytes(Rgb([0, 255, 0]))),
            ("b.jpg", &jpeg_bytes(Rgb([0, 0, 255]))),
            ("c.png", &png_bytes(Rgb([0, 0, 0]))),
        ],
    );

    let outcome = extract_images(
        &zip,
        &output,
        &BTreeSet::from([ImageFormat::Png]),
        "ch1",
    );

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.extracted_count, 2);
    assert_eq!(
        outcome.extracted_files,
        vec![output.join("ch1_001.png"), output.join("ch1_002.png")]
    );
    assert_eq!(
        std::fs::read(output.join("ch1_001.png"))?,
        png_bytes(Rgb([0, 255, 0]))
    );
    assert_eq!(dir_entry_count(&output), 2);

    Ok(())
}

#[tokio::test]
async fn test_extract_images_without_matching_format_fails() -> Result<()> {
    let test_dirs = setup_test_dirs("extract_no_match").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    let output = test_dirs.base_dir.join("extracted");
    create_zip(
        &zip,
        &[("a.png", &labeled_page("a")), ("b.jpg", &labeled_page("b"))],
    );

    let outcome = extract_images(
        &zip,
        &output,
        &BTreeSet::from([ImageFormat::Webp]),
        "ch1",
    );

    assert!(!outcome.success);
    assert_eq!(outcome.extracted_count, 0);
    assert!(outcome.error.unwrap().contains("webp"));

    Ok(())
}

#[tokio::test]
async fn test_extract_images_empty_selection_means_jpg() -> Result<()> {
    let test_dirs = setup_test_dirs("extract_default").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    let output = test_dirs.base_dir.join("extracted");
    create_zip(
        &zip,
        &[("a.png", &labeled_page("a")), ("b.jpg", &labeled_page("b"))],
    );

    let outcome = extract_images(&zip, &output, &BTreeSet::new(), "ch4");

    assert!(outcome.success);
    assert_eq!(outcome.extracted_files, vec![output.join("ch4_001.jpg")]);

    Ok(())
}

#[tokio::test]
async fn test_extract_images_never_escapes_output_dir() -> Result<()> {
    let test_dirs = setup_test_dirs("extract_traversal").await;
    let zip = test_dirs.input_dir.join("chapter.zip");
    let output = test_dirs.base_dir.join("nested").join("extracted");
    create_zip(
        &zip,
        &[
            ("../../evil.jpg", &labeled_page("evil")),
            ("good.jpg", &labeled_page("good")),
        ],
    );

    let outcome = extract_images(&zip, &output, &default_formats(), "ch1");

    assert!(outcome.success);
    assert_eq!(outcome.extracted_count, 1);
    assert_eq!(std::fs::read(output.join("ch1_001.jpg"))?, labeled_page("good"));
    assert!(!test_dirs.base_dir.join("evil.jpg").exists());
    assert_eq!(dir_entry_count(&test_dirs.base_dir.join("nested")), 1);

    Ok(())
}

#[tokio::test]
async fn test_validation_is_all_or_nothing_and_counts_pages() -> Result<()> {
    let test_dirs = setup_test_dirs("validation").await;
    let first = test_dirs.input_dir.join("first.cbz");
    let second = test_dirs.input_dir.join("second.zip");
    let png_only = test_dirs.input_dir.join("png_only.zip");
    create_labeled_cbz(&first, "a", 3);
    create_zip(
        &second,
        &[
            ("1.jpg", &labeled_page("1")),
            ("2.jpg", &labeled_page("2")),
            ("3.png", &labeled_page("3")),
        ],
    );
    create_zip(&png_only, &[("1.png", &labeled_page("1"))]);

    let config = config_for(test_dirs.output_dir.join("out.cbz"))?;

    let report = config.validate_inputs(&[first.clone(), second.clone()]);
    assert!(report.is_valid());
    assert_eq!(report.valid_files.len(), 2);
    assert_eq!(report.total_pages, 5);
    assert_eq!(report.valid_files[0].path, first);
    assert_eq!(report.valid_files[1].display_name, "second.zip");

    // A ZIP without any page in the selected formats is rejected.
    let report = config.validate_inputs(&[first, png_only.clone()]);
    assert!(!report.is_valid());
    assert_eq!(report.invalid_files.len(), 1);
    assert_eq!(report.invalid_files[0].path, png_only);

    assert!(!config.validate_inputs(&[]).is_valid());

    Ok(())
}

#[tokio::test]
async fn test_input_stats_summarizes_file_list() -> Result<()> {
    let test_dirs = setup_test_dirs("input_stats").await;
    let cbz = test_dirs.input_dir.join("a.cbz");
    let zip = test_dirs.input_dir.join("b.zip");
    let junk = test_dirs.input_dir.join("c.txt");
    create_labeled_cbz(&cbz, "a", 4);
    create_zip(
        &zip,
        &[("1.jpg", &labeled_page("1")), ("2.png", &labeled_page("2"))],
    );
    std::fs::write(&junk, b"junk")?;

    let config = GappeiConfig::builder()
        .output_path(test_dirs.output_dir.join("out.cbz"))
        .image_formats([ImageFormat::Jpg, ImageFormat::Png])
        .build()?;
    let stats = config.input_stats(&[cbz, zip, junk]);

    assert_eq!(stats.file_count, 3);
    assert_eq!(stats.cbz_count, 1);
    assert_eq!(stats.zip_count, 1);
    assert_eq!(stats.unknown_count, 1);
    assert_eq!(stats.total_pages, 6);
    assert!(stats.total_size > 0);

    Ok(())
}

#[tokio::test]
async fn test_validate_output_path_rules() -> Result<()> {
    let test_dirs = setup_test_dirs("output_path").await;
    let existing = test_dirs.output_dir.join("existing.cbz");
    std::fs::write(&existing, b"keep me")?;

    assert!(validate_output_path(&test_dirs.output_dir.join("new.cbz")).is_ok());
    assert!(validate_output_path(&test_dirs.output_dir.join("new.CBZ")).is_ok());

    let err = validate_output_path(&existing).unwrap_err();
    assert!(err.to_string().contains("File already exists"));

    let err = validate_output_path(&test_dirs.output_dir.join("new.zip")).unwrap_err();
    assert!(err.to_string().contains(".cbz"));

    let err =
        validate_output_path(&test_dirs.output_dir.join("missing").join("new.cbz")).unwrap_err();
    assert!(err.to_string().contains("Directory does not exist"));

    for name in ["CON.cbz", "con.cbz", "LPT1.cbz"] {
        let err = validate_output_path(&test_dirs.output_dir.join(name)).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{}: {}", name, err);
    }
    for name in [" .cbz", ".volume.cbz", "volume.cbz "] {
        let err = validate_output_path(&test_dirs.output_dir.join(name)).unwrap_err();
        assert!(err.to_string().contains("dot or a space"), "{:?}: {}", name, err);
    }
    let long_name = format!("{}.cbz", "a".repeat(252));
    let err = validate_output_path(&test_dirs.output_dir.join(long_name)).unwrap_err();
    assert!(err.to_string().contains("longer than 255"));

    // Checking never creates anything
    assert_eq!(dir_entry_count(&test_dirs.output_dir), 1);

    Ok(())
}
