//! Export/reconstruction driver.
//!
//! Takes the snapshot produced by the session (or leftover dirty files),
//! scans it for canvas bounds, then replays every record into a uniform
//! canvas and a monotonic timestream for the transcoder. Source files are
//! deleted as they are consumed; the writer gave them up at snapshot time.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::compress::StreamDecompressor;
use crate::error::DiaryError;
use crate::record::FrameRecord;
use crate::transcoder::Transcoder;

/// Terminal progress value, reported exactly once after the transcoder has
/// drained. Deliberately outside the `[0, 1]` per-frame progress range.
pub const EXPORT_COMPLETE: f32 = -1.0;

/// Result of the header-only scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Largest padded frame width across the snapshot
    pub max_width: u32,
    /// Largest padded frame height across the snapshot
    pub max_height: u32,
    /// Largest pixel size across the snapshot's formats
    pub max_bytes_per_pixel: usize,
    /// Fully-decodable frame records across all files
    pub total_frames: u64,
}

/// Result of a completed export.
#[derive(Debug, Clone, Copy)]
pub struct ExportSummary {
    pub frames_exported: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

/// Scan pass: decode headers only, skipping pixel payloads, to find the
/// canvas bounds and total frame count. Each file's scan stops at its first
/// short read; missing files are skipped.
pub fn scan_files(paths: &[PathBuf]) -> Result<ScanSummary, DiaryError> {
    let mut summary = ScanSummary::default();
    for path in paths {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let mut dec = StreamDecompressor::new(BufReader::new(file))?;
        let mut frames_in_file = 0u64;
        while let Some(header) = FrameRecord::read_header(&mut dec)? {
            summary.max_width = summary.max_width.max(header.width);
            summary.max_height = summary.max_height.max(header.height);
            summary.max_bytes_per_pixel = summary
                .max_bytes_per_pixel
                .max(header.format.bytes_per_pixel());
            frames_in_file += 1;
        }
        debug!(path = %path.display(), frames = frames_in_file, "scanned diary file");
        summary.total_frames += frames_in_file;
    }
    Ok(summary)
}

/// Replay a chronological snapshot into `transcoder`.
///
/// `progress` is invoked with `frames_processed / total_frames` once per
/// reconstructed frame (monotonically non-decreasing) and finally with
/// [`EXPORT_COMPLETE`]. Each source file is deleted once its stream is
/// consumed. An empty snapshot never starts the transcoder but still
/// reports completion.
pub fn export_files(
    paths: &[PathBuf],
    transcoder: &mut dyn Transcoder,
    mut progress: impl FnMut(f32),
) -> Result<ExportSummary, DiaryError> {
    let scan = scan_files(paths)?;
    if scan.total_frames == 0 {
        for path in paths {
            let _ = fs::remove_file(path);
        }
        progress(EXPORT_COMPLETE);
        return Ok(ExportSummary {
            frames_exported: 0,
            canvas_width: 0,
            canvas_height: 0,
        });
    }

    info!(
        frames = scan.total_frames,
        width = scan.max_width,
        height = scan.max_height,
        "exporting diary"
    );
    transcoder.begin(scan.max_width, scan.max_height)?;

    // one reusable canvas; per record only the prefix for that record's
    // pixel size is touched and submitted
    let mut canvas =
        vec![0u8; scan.max_width as usize * scan.max_height as usize * scan.max_bytes_per_pixel];
    let mut absolute_nanos = 0u64;
    let mut processed = 0u64;

    for path in paths {
        if let Ok(file) = File::open(path) {
            let mut dec = StreamDecompressor::new(BufReader::new(file))?;
            while let Some(record) = FrameRecord::read(&mut dec)? {
                absolute_nanos += record.elapsed_nanos.max(0) as u64;

                let bpp = record.format.bytes_per_pixel();
                let canvas_row = scan.max_width as usize * bpp;
                let frame_len = canvas_row * scan.max_height as usize;
                let frame = &mut canvas[..frame_len];

                if record.width == scan.max_width && record.height == scan.max_height {
                    frame.copy_from_slice(&record.data);
                } else {
                    // bottom-left aligned: stored row 0 is the bottom row
                    // in both the record and the canvas
                    frame.fill(0);
                    let record_row = record.width as usize * bpp;
                    for y in 0..record.height as usize {
                        frame[y * canvas_row..y * canvas_row + record_row]
                            .copy_from_slice(&record.data[y * record_row..(y + 1) * record_row]);
                    }
                }

                transcoder.submit(frame, record.format, absolute_nanos / 100)?;
                processed += 1;
                progress(processed as f32 / scan.total_frames as f32);
            }
        }
        if let Err(e) = fs::remove_file(path) {
            warn!("could not delete consumed export file {}: {e}", path.display());
        }
    }

    transcoder.finish()?;
    progress(EXPORT_COMPLETE);
    info!(frames = processed, "export complete");

    Ok(ExportSummary {
        frames_exported: processed,
        canvas_width: scan.max_width,
        canvas_height: scan.max_height,
    })
}
