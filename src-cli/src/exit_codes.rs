//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments
    InvalidArguments = 2,
    /// No diary files found to inspect or export
    NoDiaryFiles = 3,
    /// FFmpeg could not be located or downloaded
    FfmpegUnavailable = 4,
    /// Transcoding failed
    TranscodingFailed = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::NoDiaryFiles => write!(f, "no diary files"),
            ExitCode::FfmpegUnavailable => write!(f, "ffmpeg unavailable"),
            ExitCode::TranscodingFailed => write!(f, "transcoding failed"),
        }
    }
}
