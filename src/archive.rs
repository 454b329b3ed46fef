//
// archive.rs
// seriesnav
//
// Archive collaborator: flattens ZIP uploads or directories into (name, bytes) entries and feeds them through the pipeline.
//

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::decode;
use crate::frames::FrameValueMode;
use crate::series::{self, Series};

/// Extract a ZIP archive into a flat list of `(name, bytes)` entries,
/// skipping directories. Container structure is not preserved beyond the
/// entry names. An unreadable archive is a boundary error.
pub fn load_zip(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Failed to read ZIP archive")?;
    let mut items = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("Failed to read ZIP entry {index}"))?;
        let name = entry.name().to_string();
        if name.ends_with('/') {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to extract ZIP entry {name}"))?;
        items.push((name, data));
    }
    Ok(items)
}

/// Decode every entry and aggregate the decodable ones into series.
/// Entries that are not DICOM are skipped without error.
pub fn ingest_items(
    items: &[(String, Vec<u8>)],
    mode: FrameValueMode,
) -> BTreeMap<String, Series> {
    let instances: Vec<_> = items
        .iter()
        .filter_map(|(name, bytes)| decode::decode_instance(name, bytes))
        .collect();
    debug!(
        entries = items.len(),
        instances = instances.len(),
        "decoded archive entries"
    );
    let series = series::aggregate(&instances, mode);
    info!(
        instances = instances.len(),
        series = series.len(),
        "archive ingested"
    );
    series
}

/// Ingest a path from the CLI: a `.zip` file is unpacked, a directory is
/// walked recursively, and any other file is treated as a single entry.
pub fn ingest_path(path: &Path, mode: FrameValueMode) -> Result<BTreeMap<String, Series>> {
    let items = collect_items(path)?;
    Ok(ingest_items(&items, mode))
}

fn collect_items(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    if path.is_dir() {
        let mut items = Vec::new();
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let data = fs::read(entry.path())
                .with_context(|| format!("Failed to read {:?}", entry.path()))?;
            items.push((name, data));
        }
        return Ok(items);
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
    if path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("zip")) {
        load_zip(&bytes)
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".to_string());
        Ok(vec![(name, bytes)])
    }
}
