//! Zip export of captures.
//!
//! Entries are stored uncompressed: the thumbnails are already JPEG.

use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::aggregator::Capture;
use crate::error::BinTallyError;
use crate::progress::{OperationType, ProgressCallback, ProgressTracker};

/// Archive entry name: `frame_<index>_<label>_<sequence>.jpg`.
///
/// The sequence number is the capture's position in the exported list, so
/// names stay unique even when index and label repeat.
pub fn entry_name(capture: &Capture, sequence: usize) -> String {
    format!(
        "frame_{}_{}_{}.jpg",
        capture.frame_index, capture.label, sequence
    )
}

/// File name for downloading a single capture: `frame_<index>_<label>.jpg`.
pub fn single_download_name(capture: &Capture) -> String {
    format!("frame_{}_{}.jpg", capture.frame_index, capture.label)
}

/// Write all captures, in order, into an in-memory zip archive.
///
/// # Example
///
/// ```no_run
/// # fn demo(captures: &[bintally::Capture]) -> Result<(), bintally::BinTallyError> {
/// let bytes = bintally::export::to_archive(captures)?;
/// std::fs::write("captures.zip", bytes)?;
/// # Ok(())
/// # }
/// ```
pub fn to_archive(captures: &[Capture]) -> Result<Vec<u8>, BinTallyError> {
    let cursor = write_entries(Cursor::new(Vec::new()), captures, None)?;
    Ok(cursor.into_inner())
}

/// Like [`to_archive`], reporting one progress item per entry.
pub fn to_archive_with_progress(
    captures: &[Capture],
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<u8>, BinTallyError> {
    let tracker = ProgressTracker::new(
        progress,
        OperationType::ArchiveExport,
        Some(captures.len() as u64),
    );
    let cursor = write_entries(Cursor::new(Vec::new()), captures, Some(tracker))?;
    Ok(cursor.into_inner())
}

/// Write all captures into a zip archive at `path`.
///
/// The archive is assembled in memory and moved into place from a sibling
/// `.partial` file, so a failed export never leaves a truncated zip at
/// `path`.
pub fn write_archive<P: AsRef<Path>>(captures: &[Capture], path: P) -> Result<(), BinTallyError> {
    let path = path.as_ref();
    log::debug!("Writing {} capture(s) to {}", captures.len(), path.display());
    let bytes = to_archive(captures)?;

    let partial = partial_path(path);
    if let Err(error) = fs::write(&partial, &bytes).and_then(|()| fs::rename(&partial, path)) {
        if let Err(cleanup) = fs::remove_file(&partial) {
            log::debug!("Could not remove {}: {cleanup}", partial.display());
        }
        return Err(error.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_entries<W: Write + Seek>(
    writer: W,
    captures: &[Capture],
    mut tracker: Option<ProgressTracker>,
) -> Result<W, BinTallyError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut archive = ZipWriter::new(writer);

    for (sequence, capture) in captures.iter().enumerate() {
        archive.start_file(entry_name(capture, sequence), options)?;
        archive.write_all(&capture.thumbnail)?;
        if let Some(tracker) = tracker.as_mut() {
            tracker.advance(Some(capture.frame_index), None);
        }
    }

    Ok(archive.finish()?)
}
