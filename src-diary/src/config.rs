//! Diary configuration and recognized constants.

use std::path::PathBuf;

/// Number of rotation slots in the on-disk ring.
pub const MAX_DIARY_FILES: usize = 2;

/// Upper bound on persisted frames per second.
pub const MAX_FRAME_RATE: u32 = 30;

/// Frames written to one diary file before rotation (10 s at the target rate).
pub const MAX_FRAMES_PER_DIARY_FILE: u32 = 10 * MAX_FRAME_RATE;

/// Target bitrate handed to the video transcoder, in bits per second.
pub const DIARY_VIDEO_BITRATE: u32 = 5000 * 1024;

/// Configuration for a diary session.
///
/// The defaults match the reference constants above; tests shrink the ring
/// and the per-file cap to exercise rotation quickly.
#[derive(Debug, Clone)]
pub struct DiaryConfig {
    /// Directory holding the diary ring files
    pub diary_dir: PathBuf,
    /// Number of rotation slots
    pub max_diary_files: usize,
    /// Upper bound on persisted frames per second
    pub max_frame_rate: u32,
    /// Frames per file before rotation
    pub max_frames_per_file: u32,
    /// Bitrate for exported video, bits per second
    pub video_bitrate: u32,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            diary_dir: deardiary_common::paths::diary_dir(),
            max_diary_files: MAX_DIARY_FILES,
            max_frame_rate: MAX_FRAME_RATE,
            max_frames_per_file: MAX_FRAMES_PER_DIARY_FILE,
            video_bitrate: DIARY_VIDEO_BITRATE,
        }
    }
}

impl DiaryConfig {
    /// Config with defaults rooted at the given diary directory.
    pub fn with_dir(diary_dir: impl Into<PathBuf>) -> Self {
        Self {
            diary_dir: diary_dir.into(),
            ..Self::default()
        }
    }

    /// Minimum interval between persisted frames, in nanoseconds.
    pub fn min_frame_interval_nanos(&self) -> u64 {
        1_000_000_000 / self.max_frame_rate as u64
    }
}
