//! Command implementations for the DearDiary CLI.

use std::io::Write as _;
use std::path::PathBuf;

use deardiary::{
    dirty_diary_files, ensure_ffmpeg, export_files, scan_files, DiaryConfig, FfmpegTranscoder,
    EXPORT_COMPLETE,
};
use tracing::debug;

use crate::colors;
use crate::exit_codes::ExitCode;

fn config_for(dir: Option<PathBuf>) -> DiaryConfig {
    match dir {
        Some(dir) => DiaryConfig::with_dir(dir),
        None => DiaryConfig::default(),
    }
}

/// Inspect leftover diary files: per-file frame counts and canvas bounds.
pub fn inspect(dir: Option<PathBuf>, quiet: bool) -> ExitCode {
    let config = config_for(dir);
    let files = dirty_diary_files(&config);
    if files.is_empty() {
        if !quiet {
            println!(
                "{}",
                colors::dim(&format!("no diary files in {}", config.diary_dir.display()))
            );
        }
        return ExitCode::NoDiaryFiles;
    }

    if !quiet {
        println!("{}", colors::header("Diary files (oldest first):"));
    }
    let mut total_frames = 0u64;
    for file in &files {
        let scan = match scan_files(std::slice::from_ref(file)) {
            Ok(scan) => scan,
            Err(e) => {
                eprintln!("{}", colors::error(&format!("{}: {e}", file.display())));
                return ExitCode::GeneralError;
            }
        };
        total_frames += scan.total_frames;
        println!(
            "  {}  {} frames, up to {}x{}",
            colors::path(&file.display().to_string()),
            colors::number(&scan.total_frames.to_string()),
            colors::number(&scan.max_width.to_string()),
            colors::number(&scan.max_height.to_string()),
        );
    }
    if !quiet {
        println!(
            "{} files, {} frames total",
            colors::number(&files.len().to_string()),
            colors::number(&total_frames.to_string()),
        );
    }
    ExitCode::Success
}

/// Export leftover diary files to an MP4.
///
/// This is the crash-recovery path: a session that was never stopped
/// cleanly leaves its ring files behind, and this turns them into a video.
pub fn export(dir: Option<PathBuf>, output: PathBuf, bitrate: Option<u32>, quiet: bool) -> ExitCode {
    let mut config = config_for(dir);
    if let Some(bitrate) = bitrate {
        config.video_bitrate = bitrate;
    }

    let files = dirty_diary_files(&config);
    if files.is_empty() {
        if !quiet {
            println!(
                "{}",
                colors::dim(&format!("no diary files in {}", config.diary_dir.display()))
            );
        }
        return ExitCode::NoDiaryFiles;
    }
    debug!(files = files.len(), "exporting leftover diary files");

    if let Err(e) = ensure_ffmpeg() {
        eprintln!("{}", colors::error(&e.to_string()));
        return ExitCode::FfmpegUnavailable;
    }

    let mut transcoder = FfmpegTranscoder::new(&output, config.video_bitrate);
    let interactive = colors::is_interactive() && !quiet;
    let summary = export_files(&files, &mut transcoder, |p| {
        if interactive {
            if p == EXPORT_COMPLETE {
                println!();
            } else {
                print!("\rexporting... {:3.0}%", p * 100.0);
                let _ = std::io::stdout().flush();
            }
        }
    });

    match summary {
        Ok(summary) if summary.frames_exported == 0 => {
            if !quiet {
                println!("{}", colors::dim("diary files were empty, nothing to export"));
            }
            ExitCode::NoDiaryFiles
        }
        Ok(summary) => {
            if !quiet {
                println!(
                    "{} {} frames at {}x{} -> {}",
                    colors::success("exported"),
                    colors::number(&summary.frames_exported.to_string()),
                    colors::number(&summary.canvas_width.to_string()),
                    colors::number(&summary.canvas_height.to_string()),
                    colors::path(&output.display().to_string()),
                );
            }
            ExitCode::Success
        }
        Err(e) => {
            if interactive {
                println!();
            }
            eprintln!("{}", colors::error(&e.to_string()));
            ExitCode::TranscodingFailed
        }
    }
}

/// Delete leftover diary files without exporting them.
pub fn clean(dir: Option<PathBuf>, quiet: bool) -> ExitCode {
    let config = config_for(dir);
    let files = dirty_diary_files(&config);
    if files.is_empty() {
        if !quiet {
            println!(
                "{}",
                colors::dim(&format!("no diary files in {}", config.diary_dir.display()))
            );
        }
        return ExitCode::Success;
    }

    let mut failed = false;
    for file in &files {
        match std::fs::remove_file(file) {
            Ok(()) => {
                if !quiet {
                    println!("removed {}", colors::path(&file.display().to_string()));
                }
            }
            Err(e) => {
                eprintln!("{}", colors::error(&format!("{}: {e}", file.display())));
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::GeneralError
    } else {
        ExitCode::Success
    }
}
