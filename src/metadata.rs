//! Synthesis of the `ComicInfo.xml` document embedded in merged archives.

use crate::types::SourceSummary;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"%([a-z]+)%").unwrap();
}

/// Name of the metadata document at the root of the output archive.
pub const COMIC_INFO_FILE_NAME: &str = "ComicInfo.xml";

/// Title written into every merged archive.
pub const MERGED_TITLE: &str = "Merged Comic";

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Builds the metadata document describing a merge of `sources`.
///
/// The document carries a fixed title, a summary with the number of sources, the
/// total page count, and one `SourceFile{n}` element per source holding its display
/// name, in merge order.
pub fn build_metadata(sources: &[SourceSummary]) -> String {
    const TEMPLATE: &str = include_str!("../templates/ComicInfo.xml");

    let total_pages: usize = sources.iter().map(|source| source.pages).sum();

    let notes = sources
        .iter()
        .map(|source| {
            format!(
                "{} ({}, {} pages)",
                escape_xml(&source.display_name),
                source.kind,
                source.pages
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    let source_files = sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            format!(
                "  <SourceFile{n}>{name}</SourceFile{n}>",
                n = index + 1,
                name = escape_xml(&source.display_name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let summary = format!(
        "Merged from {} file{}",
        sources.len(),
        if sources.len() == 1 { "" } else { "s" }
    );
    let page_count = total_pages.to_string();

    // Single pass, so placeholders inside substituted names stay literal.
    PLACEHOLDER_REGEX
        .replace_all(TEMPLATE, |caps: &Captures| match &caps[1] {
            "title" => MERGED_TITLE.to_string(),
            "summary" => summary.clone(),
            "pagecount" => page_count.clone(),
            "notes" => notes.clone(),
            "sourcefiles" => source_files.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}
