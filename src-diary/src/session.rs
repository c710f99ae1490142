//! Diary session: ring rotation, the writer thread, and teardown.
//!
//! A [`DiarySession`] owns the whole recording side: the frame queue fed by
//! the capture collaborator, the dedicated writer thread that drains it, and
//! the small ring of compressed diary files on disk. Exactly one diary file
//! is open for writing at any instant; all shared writer state sits behind
//! one session mutex that also serializes rotation and export snapshots.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use deardiary_common::paths::{diary_file_path, ensure_diary_dir};
use deardiary_common::CapturedFrame;
use tracing::{debug, info, warn};

use crate::compress::StreamCompressor;
use crate::config::DiaryConfig;
use crate::error::{DiaryError, ErrorSink};
use crate::export::{self, ExportSummary};
use crate::limiter::RateLimiter;
use crate::queue::FrameQueue;
use crate::record::FrameRecord;
use crate::transcoder::Transcoder;

/// Bounded wait between writer liveness polls.
const WRITER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Delete retry budget for ring files still held by a finishing export
/// reader: 200 attempts at 50 ms covers several seconds of contention.
const DELETE_RETRY_ATTEMPTS: u32 = 200;
const DELETE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

type DiaryCompressor = StreamCompressor<BufWriter<File>>;

/// Writer-side state guarded by the session mutex.
struct WriterState {
    /// Index of the diary file currently open for writing
    active_index: usize,
    /// Frames written to the active file since its last rotation
    frames_in_file: u32,
    limiter: RateLimiter,
    /// Open compressor, or `None` after a mid-stream encode failure
    compressor: Option<DiaryCompressor>,
    /// Uniquifies snapshot rename targets across exports
    export_seq: u64,
}

struct SessionShared {
    config: DiaryConfig,
    queue: FrameQueue,
    stopping: AtomicBool,
    on_error: ErrorSink,
    state: Mutex<WriterState>,
}

impl SessionShared {
    /// Rotate to the next ring slot: finish the active stream, truncate the
    /// slot's file, bind a fresh compressor, reset the counter and limiter.
    fn open_next_file(&self, state: &mut WriterState) {
        if let Some(comp) = state.compressor.take() {
            comp.finish();
        }
        state.active_index = (state.active_index + 1) % self.config.max_diary_files;
        state.frames_in_file = 0;
        state.limiter.reset();

        let path = diary_file_path(&self.config.diary_dir, state.active_index);
        let file = match File::create(&path) {
            Ok(f) => f,
            Err(e) => {
                (self.on_error)(&DiaryError::Io(e));
                return;
            }
        };
        // setup failure is already reported by the compressor constructor
        if let Ok(comp) = StreamCompressor::new(BufWriter::new(file), Arc::clone(&self.on_error)) {
            state.compressor = Some(comp);
            debug!(index = state.active_index, "opened diary file");
        }
    }

    /// Rate-limit, encode and (when the per-file cap is hit) rotate.
    fn write_frame(&self, frame: CapturedFrame) {
        let mut state = self.state.lock().unwrap();
        if state.compressor.is_none() {
            // a previous encode failure abandoned this stream
            return;
        }
        let Some(elapsed) = state.limiter.accept(frame.timestamp_nanos) else {
            return;
        };

        let record = FrameRecord::from_captured(&frame, elapsed as i64);
        let Some(comp) = state.compressor.as_mut() else {
            return;
        };
        record.write(comp);
        if comp.is_failed() {
            // leave the file truncated; the error was already signaled
            state.compressor = None;
            return;
        }

        state.frames_in_file += 1;
        if state.frames_in_file >= self.config.max_frames_per_file {
            self.open_next_file(&mut state);
        }
    }

    /// Detach the current ring contents for an export reader.
    ///
    /// Under the session mutex: the active stream is finished, every
    /// existing ring file is renamed to an export-private name (oldest
    /// first, ending at the active slot), and live capture resumes in a
    /// fresh file. The export reader and the writer can never meet on the
    /// same file afterwards.
    fn snapshot_for_export(&self) -> Vec<PathBuf> {
        let mut state = self.state.lock().unwrap();
        if let Some(comp) = state.compressor.take() {
            comp.finish();
        }
        let seq = state.export_seq;
        state.export_seq += 1;

        let ring_size = self.config.max_diary_files;
        let mut snapshot = Vec::new();
        for step in 1..=ring_size {
            let index = (state.active_index + step) % ring_size;
            let live = diary_file_path(&self.config.diary_dir, index);
            if !live.exists() {
                continue;
            }
            let aside = self
                .config
                .diary_dir
                .join(format!("export_{seq}_{}.dat", snapshot.len()));
            match fs::rename(&live, &aside) {
                Ok(()) => snapshot.push(aside),
                Err(e) => warn!("could not detach diary file {}: {e}", live.display()),
            }
        }

        self.open_next_file(&mut state);
        info!(files = snapshot.len(), "diary snapshot taken for export");
        snapshot
    }
}

/// Cloneable non-blocking frame submission handle for the capture
/// collaborator. Submitting never waits; frames are dropped when the
/// queue is full or the session is stopping.
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<SessionShared>,
}

impl FrameSink {
    /// Offer a frame to the diary. Returns `false` if it was dropped.
    pub fn submit(&self, frame: CapturedFrame) -> bool {
        if self.shared.stopping.load(Ordering::SeqCst) {
            return false;
        }
        self.shared.queue.try_enqueue(frame)
    }
}

/// An owned, explicitly started and stopped diary recording session.
pub struct DiarySession {
    shared: Arc<SessionShared>,
    writer: Option<JoinHandle<()>>,
}

impl DiarySession {
    /// Start recording: create the diary directory and the first ring file,
    /// then launch the writer thread.
    ///
    /// Initialization failures are reported once through `on_error` and
    /// returned; nothing is retried.
    pub fn start(config: DiaryConfig, on_error: ErrorSink) -> Result<Self, DiaryError> {
        if let Err(e) = ensure_diary_dir(&config.diary_dir) {
            let err = DiaryError::Io(e);
            on_error(&err);
            return Err(err);
        }

        let min_interval = config.min_frame_interval_nanos();
        let initial_index = config.max_diary_files - 1; // first rotation lands on 0
        let shared = Arc::new(SessionShared {
            config,
            queue: FrameQueue::new(),
            stopping: AtomicBool::new(false),
            on_error,
            state: Mutex::new(WriterState {
                active_index: initial_index,
                frames_in_file: 0,
                limiter: RateLimiter::new(min_interval),
                compressor: None,
                export_seq: 0,
            }),
        });

        {
            let mut state = shared.state.lock().unwrap();
            shared.open_next_file(&mut state);
            if state.compressor.is_none() {
                return Err(DiaryError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "could not open initial diary file",
                )));
            }
        }

        let writer_shared = Arc::clone(&shared);
        let writer = thread::Builder::new()
            .name("diary-writer".into())
            .spawn(move || writer_loop(writer_shared))?;

        info!("diary session started");
        Ok(Self {
            shared,
            writer: Some(writer),
        })
    }

    /// Handle for the capture collaborator to push frames through.
    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Non-blocking frame submission; see [`FrameSink::submit`].
    pub fn submit_frame(&self, frame: CapturedFrame) -> bool {
        self.frame_sink().submit(frame)
    }

    /// Export the recorded history into `transcoder` and reset the ring.
    ///
    /// Runs synchronously on the calling thread. Capture continues
    /// throughout; the writer is only held up during the brief
    /// snapshot-and-reopen step. `progress` receives one value in `[0,1]`
    /// per reconstructed frame and finally [`export::EXPORT_COMPLETE`].
    pub fn export_video(
        &self,
        transcoder: &mut dyn Transcoder,
        progress: impl FnMut(f32),
    ) -> Result<ExportSummary, DiaryError> {
        let snapshot = self.shared.snapshot_for_export();
        export::export_files(&snapshot, transcoder, progress)
    }

    /// Stop recording asynchronously.
    ///
    /// Signals the writer, then from a background thread: joins it, closes
    /// the active stream, deletes every ring file (with retry, in case an
    /// export reader is still letting go), and finally invokes `completion`
    /// exactly once.
    pub fn stop(mut self, completion: impl FnOnce() + Send + 'static) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        thread::Builder::new()
            .name("diary-stop".into())
            .spawn(move || {
                self.teardown();
                completion();
            })
            .expect("failed to spawn diary-stop thread");
    }

    /// Stop recording and wait for teardown on the calling thread.
    pub fn stop_blocking(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }

        let mut state = self.shared.state.lock().unwrap();
        if let Some(comp) = state.compressor.take() {
            comp.finish();
        }
        drop(state);

        for index in 0..self.shared.config.max_diary_files {
            let path = diary_file_path(&self.shared.config.diary_dir, index);
            delete_with_retry(&path, &self.shared.on_error);
        }
        info!("diary session stopped");
    }
}

impl Drop for DiarySession {
    /// Dropping without [`DiarySession::stop`] only stops the writer; ring
    /// files stay on disk and surface as dirty files on the next start.
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        let mut state = self.shared.state.lock().unwrap();
        if let Some(comp) = state.compressor.take() {
            comp.finish();
        }
    }
}

fn writer_loop(shared: Arc<SessionShared>) {
    info!("diary writer thread started");
    loop {
        // read the stop flag before draining so frames queued ahead of the
        // signal still land on disk
        let stopping = shared.stopping.load(Ordering::SeqCst);
        while let Some(frame) = shared.queue.try_dequeue() {
            shared.write_frame(frame);
        }
        if stopping {
            break;
        }
        shared.queue.wait_ready(WRITER_POLL_INTERVAL);
    }
    info!("diary writer thread exiting");
}

fn delete_with_retry(path: &Path, on_error: &ErrorSink) {
    if !path.exists() {
        return;
    }
    let mut last_err = None;
    for attempt in 0..DELETE_RETRY_ATTEMPTS {
        match fs::remove_file(path) {
            Ok(()) => return,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                if attempt == 0 {
                    warn!("diary file {} busy, retrying delete", path.display());
                }
                last_err = Some(e);
                thread::sleep(DELETE_RETRY_BACKOFF);
            }
        }
    }
    if let Some(source) = last_err {
        (on_error)(&DiaryError::DeleteFailed {
            path: path.to_path_buf(),
            source,
        });
    }
}

/// Diary files left on disk by a previous session, oldest first.
///
/// A non-empty result on start-up means the previous run did not stop
/// cleanly; callers may export these leftovers to a video before starting a
/// fresh session, mirroring a crash-recovery prompt.
pub fn dirty_diary_files(config: &DiaryConfig) -> Vec<PathBuf> {
    let entries = match fs::read_dir(&config.diary_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_str()?;
            let is_diary = name.ends_with(".dat")
                && (name.starts_with("diary_") || name.starts_with("export_"));
            if !is_diary {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, path))
        })
        .collect();

    files.sort();
    files.into_iter().map(|(_, path)| path).collect()
}
