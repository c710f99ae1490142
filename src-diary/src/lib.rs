//! DearDiary core library.
//!
//! Continuously records a window's frames into a small rotating set of
//! compressed "diary" files on disk, and reconstitutes that history into a
//! video file on demand. Capture (pixel acquisition) and video encoding
//! proper are external collaborators: the capture side feeds
//! [`CapturedFrame`]s through a non-blocking sink, and export drives any
//! [`Transcoder`] implementation (an ffmpeg-based one is provided).
//!
//! ```no_run
//! use deardiary::{DiaryConfig, DiaryError, DiarySession, FfmpegTranscoder, EXPORT_COMPLETE};
//! use std::sync::Arc;
//!
//! let config = DiaryConfig::default();
//! let on_error = Arc::new(|e: &DiaryError| eprintln!("{e}"));
//! let session = DiarySession::start(config.clone(), on_error)?;
//!
//! // ... capture collaborator calls session.frame_sink().submit(frame) ...
//!
//! let mut transcoder = FfmpegTranscoder::new("out.mp4", config.video_bitrate);
//! session.export_video(&mut transcoder, |p| {
//!     if p != EXPORT_COMPLETE {
//!         println!("{:3.0}%", p * 100.0);
//!     }
//! })?;
//! session.stop(|| println!("diary stopped"));
//! # Ok::<(), deardiary::DiaryError>(())
//! ```

pub mod compress;
pub mod config;
pub mod error;
pub mod export;
pub mod limiter;
pub mod queue;
pub mod record;
pub mod session;
pub mod transcoder;

pub use config::DiaryConfig;
pub use error::{log_only_sink, DiaryError, ErrorSink};
pub use export::{export_files, scan_files, ExportSummary, ScanSummary, EXPORT_COMPLETE};
pub use session::{dirty_diary_files, DiarySession, FrameSink};
pub use transcoder::{ensure_ffmpeg, FfmpegTranscoder, Transcoder};

pub use deardiary_common::{CapturedFrame, PixelFormat};
