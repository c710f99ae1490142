//! Shared types for frame capture and diary recording.

use serde::{Deserialize, Serialize};

/// Pixel format of a captured frame.
///
/// This is a closed set: the capture collaborator must tag every frame with
/// one of these. Unknown tags read back from disk are a hard error, never a
/// silently-assumed default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 32-bit BGRA, 8 bits per channel
    Bgra8,
    /// 32-bit RGBA, 8 bits per channel
    Rgba8,
    /// 64-bit RGBA, 16-bit half-float per channel
    RgbaF16,
}

impl PixelFormat {
    /// Bytes occupied by one pixel in this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Rgba8 => 4,
            PixelFormat::RgbaF16 => 8,
        }
    }

    /// Stable on-disk tag for this format.
    pub fn tag(self) -> i32 {
        match self {
            PixelFormat::Bgra8 => 0,
            PixelFormat::Rgba8 => 1,
            PixelFormat::RgbaF16 => 2,
        }
    }

    /// Resolve an on-disk tag back to a format, if recognized.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::Bgra8),
            1 => Some(PixelFormat::Rgba8),
            2 => Some(PixelFormat::RgbaF16),
            _ => None,
        }
    }
}

/// A captured frame as delivered by the capture collaborator.
///
/// Rows are stored top-down in capture order, `stride` bytes apart. The
/// timestamp comes from the collaborator's monotonic clock and is only ever
/// compared against other timestamps from the same session.
#[derive(Clone)]
pub struct CapturedFrame {
    /// True width in pixels (may be odd)
    pub width: u32,
    /// True height in pixels (may be odd)
    pub height: u32,
    /// Bytes from the start of one source row to the next
    pub stride: usize,
    /// Pixel format of `data`
    pub format: PixelFormat,
    /// Monotonic capture timestamp in nanoseconds
    pub timestamp_nanos: u64,
    /// Row-major pixel data, top row first
    pub data: Vec<u8>,
}

impl CapturedFrame {
    /// Build a frame from tightly-packed pixel data (stride = width * bpp).
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_nanos: u64,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            timestamp_nanos,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for format in [PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::RgbaF16] {
            assert_eq!(PixelFormat::from_tag(format.tag()), Some(format));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(PixelFormat::from_tag(3), None);
        assert_eq!(PixelFormat::from_tag(-1), None);
        assert_eq!(PixelFormat::from_tag(87), None);
    }

    #[test]
    fn test_packed_stride() {
        let frame = CapturedFrame::packed(7, 3, PixelFormat::RgbaF16, 0, vec![0; 7 * 3 * 8]);
        assert_eq!(frame.stride, 56);
    }
}
