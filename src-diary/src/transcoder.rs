//! Video transcoding via FFmpeg (ffmpeg-sidecar).
//!
//! The export driver only knows the [`Transcoder`] contract; the bundled
//! [`FfmpegTranscoder`] satisfies it by piping raw BGRA frames into an
//! FFmpeg child process, as a stand-in for a hardware sink writer.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use deardiary_common::PixelFormat;
use ffmpeg_sidecar::command::FfmpegCommand;
use tracing::{debug, info, warn};

use crate::error::DiaryError;

/// Output slot duration at the fixed 30 fps export grid, in 100 ns units.
const SLOT_100NS: u64 = 10_000_000 / 30;

/// Consumer of reconstructed frames.
///
/// `submit` receives one canvas-sized pixel buffer per frame with rows in
/// bottom-to-top order, plus an absolute presentation timestamp in 100 ns
/// units that is monotonically non-decreasing across calls. `finish` is the
/// drain/finalize signal at end of stream.
pub trait Transcoder {
    /// Announce the uniform canvas dimensions before the first frame.
    fn begin(&mut self, width: u32, height: u32) -> Result<(), DiaryError>;

    /// Accept one reconstructed frame.
    fn submit(
        &mut self,
        canvas: &[u8],
        format: PixelFormat,
        pts_100ns: u64,
    ) -> Result<(), DiaryError>;

    /// Drain and finalize the output.
    fn finish(&mut self) -> Result<(), DiaryError>;
}

/// Detect the best available H.264 encoder.
/// Returns the encoder name to use with FFmpeg.
fn detect_h264_encoder() -> &'static str {
    let output = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
        .args(["-encoders", "-hide_banner"])
        .output();

    let encoders_output = match output {
        Ok(o) => String::from_utf8_lossy(&o.stdout).to_string(),
        Err(e) => {
            warn!("failed to run ffmpeg -encoders: {e}");
            String::new()
        }
    };

    // Preference order: libx264 (best quality/compat), then hardware
    // encoders. Fedora's ffmpeg-free ships without libx264, hence the rest.
    let encoder_preferences = [
        "libx264",
        "libopenh264",
        "h264_vaapi",
        "h264_nvenc",
        "h264_amf",
        "h264_qsv",
        "h264_videotoolbox",
        "h264_mf",
    ];

    for name in encoder_preferences {
        if encoders_output.lines().any(|l| l.contains(name)) {
            debug!("using H.264 encoder: {name}");
            return name;
        }
    }

    warn!("no H.264 encoder detected, trying libx264 anyway");
    "libx264"
}

/// FFmpeg-backed transcoder producing an H.264 MP4.
///
/// The diary's replay timeline is variable-rate; FFmpeg's rawvideo stdin
/// cannot carry per-frame timestamps, so the stream is re-timed onto a
/// fixed 30 fps grid by repeating the previous frame into empty slots.
pub struct FfmpegTranscoder {
    output_path: PathBuf,
    bitrate: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Last converted frame, not yet written to its slot
    pending: Option<Vec<u8>>,
    base_pts: u64,
    slots_written: u64,
}

impl FfmpegTranscoder {
    /// Transcoder writing H.264 MP4 to `output_path` at `bitrate` bits/s.
    pub fn new(output_path: impl Into<PathBuf>, bitrate: u32) -> Self {
        Self {
            output_path: output_path.into(),
            bitrate,
            child: None,
            stdin: None,
            pending: None,
            base_pts: 0,
            slots_written: 0,
        }
    }

    fn write_slot(&mut self, data: &[u8]) -> Result<(), DiaryError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DiaryError::Transcode("ffmpeg stdin closed".into()))?;
        stdin
            .write_all(data)
            .map_err(|e| DiaryError::Transcode(format!("failed to write frame: {e}")))?;
        self.slots_written += 1;
        Ok(())
    }
}

impl Transcoder for FfmpegTranscoder {
    fn begin(&mut self, width: u32, height: u32) -> Result<(), DiaryError> {
        let encoder = detect_h264_encoder();

        let mut command = FfmpegCommand::new();
        command
            // Input: raw BGRA frames from stdin at the export grid rate
            .args(["-f", "rawvideo"])
            .args(["-pix_fmt", "bgra"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", "30"])
            .args(["-i", "-"])
            // canvas rows are bottom-to-top
            .args(["-vf", "vflip"])
            .args(["-c:v", encoder]);

        if encoder == "libx264" {
            command.args(["-preset", "ultrafast"]);
        }

        command
            .args(["-b:v", &self.bitrate.to_string()])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-movflags", "+faststart"])
            .args(["-y"])
            .arg(self.output_path.to_string_lossy().to_string());

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::piped());
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| DiaryError::Transcode(format!("failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DiaryError::Transcode("failed to get ffmpeg stdin".into()))?;

        if let Some(stderr) = child.stderr.take() {
            std::thread::spawn(move || {
                use std::io::{BufRead, BufReader};
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("[ffmpeg] {line}");
                }
            });
        }

        info!(
            %width,
            %height,
            output = %self.output_path.display(),
            "ffmpeg transcoder started"
        );
        self.stdin = Some(stdin);
        self.child = Some(child);
        Ok(())
    }

    fn submit(
        &mut self,
        canvas: &[u8],
        format: PixelFormat,
        pts_100ns: u64,
    ) -> Result<(), DiaryError> {
        let data = to_bgra(canvas, format);
        match self.pending.take() {
            None => self.base_pts = pts_100ns,
            Some(prev) => {
                // hold the previous frame on screen until this one's slot
                let slot = pts_100ns.saturating_sub(self.base_pts) / SLOT_100NS;
                while self.slots_written < slot {
                    self.write_slot(&prev)?;
                }
            }
        }
        self.pending = Some(data);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DiaryError> {
        if let Some(last) = self.pending.take() {
            self.write_slot(&last)?;
        }
        drop(self.stdin.take());

        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| DiaryError::Transcode(format!("ffmpeg process error: {e}")))?;
            if !status.success() {
                return Err(DiaryError::Transcode(format!(
                    "ffmpeg exited with status: {status}"
                )));
            }
        }
        info!(output = %self.output_path.display(), "ffmpeg transcoder finished");
        Ok(())
    }
}

/// Ensure FFmpeg is available, downloading it if necessary.
///
/// Verifies the resolved binary by running `ffmpeg -version`; on failure,
/// falls back to ffmpeg-sidecar's auto-download.
pub fn ensure_ffmpeg() -> Result<(), DiaryError> {
    let ffmpeg = ffmpeg_sidecar::paths::ffmpeg_path();
    match Command::new(&ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        _ => {
            info!("ffmpeg not found, attempting auto-download");
            ffmpeg_sidecar::download::auto_download()
                .map_err(|e| DiaryError::Transcode(format!("ffmpeg unavailable: {e}")))
        }
    }
}

/// Convert one canvas to BGRA for the rawvideo pipe.
fn to_bgra(canvas: &[u8], format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Bgra8 => canvas.to_vec(),
        PixelFormat::Rgba8 => {
            let mut out = canvas.to_vec();
            for px in out.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            out
        }
        PixelFormat::RgbaF16 => {
            let mut out = Vec::with_capacity(canvas.len() / 2);
            for px in canvas.chunks_exact(8) {
                let r = half_to_unorm8(u16::from_le_bytes([px[0], px[1]]));
                let g = half_to_unorm8(u16::from_le_bytes([px[2], px[3]]));
                let b = half_to_unorm8(u16::from_le_bytes([px[4], px[5]]));
                let a = half_to_unorm8(u16::from_le_bytes([px[6], px[7]]));
                out.extend_from_slice(&[b, g, r, a]);
            }
            out
        }
    }
}

/// Decode an IEEE half-float and quantize to an 8-bit channel.
fn half_to_unorm8(bits: u16) -> u8 {
    let value = half_to_f32(bits);
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn half_to_f32(bits: u16) -> f32 {
    let sign = ((bits as u32) & 0x8000) << 16;
    let exponent = ((bits >> 10) & 0x1F) as u32;
    let fraction = (bits & 0x3FF) as u32;
    match exponent {
        0 => {
            // subnormal: fraction * 2^-24
            let magnitude = fraction as f32 * 5.960_464_5e-8;
            if sign != 0 {
                -magnitude
            } else {
                magnitude
            }
        }
        31 => f32::from_bits(sign | 0x7F80_0000 | (fraction << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (fraction << 13)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_to_f32() {
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert_eq!(half_to_f32(0x3C00), 1.0);
        assert_eq!(half_to_f32(0x4000), 2.0);
        assert_eq!(half_to_f32(0xBC00), -1.0);
        assert_eq!(half_to_f32(0x3800), 0.5);
        assert!(half_to_f32(0x7C00).is_infinite());
    }

    #[test]
    fn test_half_to_unorm8_clamps() {
        assert_eq!(half_to_unorm8(0x3C00), 255); // 1.0
        assert_eq!(half_to_unorm8(0x4000), 255); // 2.0 clamps
        assert_eq!(half_to_unorm8(0xBC00), 0); // -1.0 clamps
        assert_eq!(half_to_unorm8(0x3800), 128); // 0.5
    }

    #[test]
    fn test_rgba_swizzle() {
        let rgba = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let bgra = to_bgra(&rgba, PixelFormat::Rgba8);
        assert_eq!(bgra, vec![30, 20, 10, 40, 70, 60, 50, 80]);
    }

    #[test]
    fn test_f16_to_bgra() {
        // one pixel: r=1.0, g=0.5, b=0.0, a=1.0
        let mut px = Vec::new();
        for half in [0x3C00u16, 0x3800, 0x0000, 0x3C00] {
            px.extend_from_slice(&half.to_le_bytes());
        }
        let bgra = to_bgra(&px, PixelFormat::RgbaF16);
        assert_eq!(bgra, vec![0, 128, 255, 255]);
    }
}
