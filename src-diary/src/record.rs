//! Binary frame record codec.
//!
//! One record is a self-describing unit: four little-endian header fields
//! (`padded_width:i32`, `padded_height:i32`, `format tag:i32`,
//! `elapsed_nanos:i64`) followed by `padded_height` rows of
//! `padded_width * bytes_per_pixel` pixel bytes in bottom-to-top order.
//! Diary files are plain concatenations of records with no file header;
//! compression runs over the whole stream, not per record.

use std::io::{Read, Write};

use deardiary_common::{CapturedFrame, PixelFormat};

use crate::compress::{StreamCompressor, StreamDecompressor};
use crate::error::DiaryError;

/// Dimension sanity bound for decode. Anything larger is treated as stream
/// corruption rather than a frame.
const MAX_DIMENSION: i32 = 32_768;

/// Round a dimension up to the nearest even number.
fn pad_even(value: u32) -> u32 {
    (value + 1) & !1
}

/// One persisted frame: even-rounded dimensions, timing delta, and
/// bottom-to-top pixel rows with zero-filled padding.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    /// Width rounded up to even
    pub width: u32,
    /// Height rounded up to even
    pub height: u32,
    /// Pixel format of `data`
    pub format: PixelFormat,
    /// Nanoseconds since the previously persisted frame (0 for the first
    /// frame of a file)
    pub elapsed_nanos: i64,
    /// `height` rows of `width * bytes_per_pixel` bytes, bottom row first
    pub data: Vec<u8>,
}

/// Decoded header of a record whose pixel payload was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub elapsed_nanos: i64,
}

impl FrameHeader {
    /// Byte length of the pixel payload this header describes.
    pub fn payload_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

impl FrameRecord {
    /// Build a record from a captured frame.
    ///
    /// Rows are re-ordered bottom-to-top; an odd true width gains one
    /// zero-filled pad column, an odd true height one zero-filled pad row
    /// (appended after all real rows).
    pub fn from_captured(frame: &CapturedFrame, elapsed_nanos: i64) -> Self {
        let bpp = frame.format.bytes_per_pixel();
        let width = pad_even(frame.width);
        let height = pad_even(frame.height);
        let row_len = width as usize * bpp;
        let src_row_len = frame.width as usize * bpp;

        let mut data = vec![0u8; row_len * height as usize];
        for y in 0..frame.height as usize {
            let src = &frame.data[y * frame.stride..y * frame.stride + src_row_len];
            // stored row 0 is the bottom source row
            let dst_row = frame.height as usize - 1 - y;
            data[dst_row * row_len..dst_row * row_len + src_row_len].copy_from_slice(src);
        }

        Self {
            width,
            height,
            format: frame.format,
            elapsed_nanos,
            data,
        }
    }

    /// Encode this record through the active compressor.
    pub fn write<W: Write>(&self, comp: &mut StreamCompressor<W>) {
        comp.push(&(self.width as i32).to_le_bytes());
        comp.push(&(self.height as i32).to_le_bytes());
        comp.push(&self.format.tag().to_le_bytes());
        comp.push(&self.elapsed_nanos.to_le_bytes());
        comp.push(&self.data);
    }

    /// Decode the next full record from the stream.
    ///
    /// Returns `Ok(None)` at end-of-usable-data: a short read anywhere in
    /// the header or payload discards the partial record and ends the file.
    /// An unrecognized format tag is a hard error, not a silent skip.
    pub fn read<R: Read>(dec: &mut StreamDecompressor<R>) -> Result<Option<FrameRecord>, DiaryError> {
        let header = match read_header_fields(dec)? {
            Some(h) => h,
            None => return Ok(None),
        };
        let mut data = vec![0u8; header.payload_len()];
        if !dec.pull_exact(&mut data) {
            return Ok(None);
        }
        Ok(Some(FrameRecord {
            width: header.width,
            height: header.height,
            format: header.format,
            elapsed_nanos: header.elapsed_nanos,
            data,
        }))
    }

    /// Decode only the header of the next record, skipping its payload.
    ///
    /// Same end-of-data contract as [`FrameRecord::read`]; a payload that
    /// cannot be fully skipped discards the record.
    pub fn read_header<R: Read>(
        dec: &mut StreamDecompressor<R>,
    ) -> Result<Option<FrameHeader>, DiaryError> {
        let header = match read_header_fields(dec)? {
            Some(h) => h,
            None => return Ok(None),
        };
        if !dec.skip(header.payload_len()) {
            return Ok(None);
        }
        Ok(Some(header))
    }
}

fn read_header_fields<R: Read>(
    dec: &mut StreamDecompressor<R>,
) -> Result<Option<FrameHeader>, DiaryError> {
    let width = match read_i32(dec) {
        Some(v) => v,
        None => return Ok(None),
    };
    let height = match read_i32(dec) {
        Some(v) => v,
        None => return Ok(None),
    };
    let tag = match read_i32(dec) {
        Some(v) => v,
        None => return Ok(None),
    };
    let elapsed_nanos = match read_i64(dec) {
        Some(v) => v,
        None => return Ok(None),
    };

    // nonsense dimensions mean the stream is corrupt; treat as truncation
    if width <= 0 || height <= 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Ok(None);
    }
    let format = PixelFormat::from_tag(tag).ok_or(DiaryError::UnknownPixelFormat(tag))?;

    Ok(Some(FrameHeader {
        width: width as u32,
        height: height as u32,
        format,
        elapsed_nanos,
    }))
}

fn read_i32<R: Read>(dec: &mut StreamDecompressor<R>) -> Option<i32> {
    let mut buf = [0u8; 4];
    dec.pull_exact(&mut buf).then(|| i32::from_le_bytes(buf))
}

fn read_i64<R: Read>(dec: &mut StreamDecompressor<R>) -> Option<i64> {
    let mut buf = [0u8; 8];
    dec.pull_exact(&mut buf).then(|| i64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::StreamCompressor;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn quiet_sink() -> crate::error::ErrorSink {
        Arc::new(|_| {})
    }

    fn frame(width: u32, height: u32, format: PixelFormat, fill: u8) -> CapturedFrame {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        CapturedFrame::packed(width, height, format, 0, vec![fill; len])
    }

    fn encode_records(records: &[FrameRecord]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut comp = StreamCompressor::new(&mut out, quiet_sink()).unwrap();
        for rec in records {
            rec.write(&mut comp);
        }
        comp.finish();
        out
    }

    #[test]
    fn test_row_order_reversed() {
        // 2x2 BGRA frame with distinct rows
        let mut data = vec![1u8; 8];
        data.extend_from_slice(&[2u8; 8]);
        let frame = CapturedFrame::packed(2, 2, PixelFormat::Bgra8, 0, data);
        let rec = FrameRecord::from_captured(&frame, 0);

        // bottom source row (2s) must come first
        assert_eq!(&rec.data[..8], &[2u8; 8]);
        assert_eq!(&rec.data[8..], &[1u8; 8]);
    }

    #[test]
    fn test_odd_dimensions_zero_padded() {
        let frame = frame(3, 3, PixelFormat::Bgra8, 0xFF);
        let rec = FrameRecord::from_captured(&frame, 0);
        assert_eq!(rec.width, 4);
        assert_eq!(rec.height, 4);

        let row_len = 4 * 4;
        for y in 0..4 {
            let row = &rec.data[y * row_len..(y + 1) * row_len];
            if y < 3 {
                assert_eq!(&row[..12], &[0xFF; 12], "row {y} real pixels");
                assert_eq!(&row[12..], &[0x00; 4], "row {y} pad column");
            } else {
                assert_eq!(row, &[0x00; 16], "pad row");
            }
        }
    }

    #[test]
    fn test_strided_source_rows() {
        // 2x2 frame embedded in rows of stride 16 (8 real + 8 junk bytes)
        let mut data = Vec::new();
        for fill in [9u8, 7u8] {
            data.extend_from_slice(&[fill; 8]);
            data.extend_from_slice(&[0xEE; 8]);
        }
        let frame = CapturedFrame {
            width: 2,
            height: 2,
            stride: 16,
            format: PixelFormat::Rgba8,
            timestamp_nanos: 0,
            data,
        };
        let rec = FrameRecord::from_captured(&frame, 0);
        assert_eq!(&rec.data[..8], &[7u8; 8]);
        assert_eq!(&rec.data[8..], &[9u8; 8]);
    }

    #[test]
    fn test_round_trip_all_parity_combinations() {
        for (w, h) in [(4u32, 4u32), (5, 4), (4, 5), (5, 5), (1, 1)] {
            for format in [PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::RgbaF16] {
                let src = frame(w, h, format, 0x3C);
                let rec = FrameRecord::from_captured(&src, 7_654_321);
                let bytes = encode_records(std::slice::from_ref(&rec));

                let mut dec = StreamDecompressor::new(&bytes[..]).unwrap();
                let back = FrameRecord::read(&mut dec).unwrap().expect("one record");
                assert_eq!(back.width, rec.width);
                assert_eq!(back.height, rec.height);
                assert_eq!(back.format, format);
                assert_eq!(back.elapsed_nanos, 7_654_321);
                assert_eq!(back.data, rec.data);
                assert!(FrameRecord::read(&mut dec).unwrap().is_none());
            }
        }
    }

    #[test]
    fn test_header_scan_matches_full_decode() {
        let records: Vec<FrameRecord> = (1u32..=3)
            .map(|i| FrameRecord::from_captured(&frame(i * 10, i * 6, PixelFormat::Bgra8, 1), i as i64))
            .collect();
        let bytes = encode_records(&records);

        let mut dec = StreamDecompressor::new(&bytes[..]).unwrap();
        for rec in &records {
            let header = FrameRecord::read_header(&mut dec).unwrap().expect("header");
            assert_eq!(header.width, rec.width);
            assert_eq!(header.height, rec.height);
            assert_eq!(header.elapsed_nanos, rec.elapsed_nanos);
        }
        assert!(FrameRecord::read_header(&mut dec).unwrap().is_none());
    }

    #[test]
    fn test_unknown_tag_is_hard_error() {
        let mut out = Vec::new();
        let mut comp = StreamCompressor::new(&mut out, quiet_sink()).unwrap();
        comp.push(&2i32.to_le_bytes());
        comp.push(&2i32.to_le_bytes());
        comp.push(&99i32.to_le_bytes()); // no such format
        comp.push(&0i64.to_le_bytes());
        comp.push(&[0u8; 16]);
        comp.finish();

        let mut dec = StreamDecompressor::new(&out[..]).unwrap();
        match FrameRecord::read(&mut dec) {
            Err(DiaryError::UnknownPixelFormat(99)) => {}
            other => panic!("expected UnknownPixelFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_absurd_dimensions_treated_as_truncation() {
        let mut out = Vec::new();
        let mut comp = StreamCompressor::new(&mut out, quiet_sink()).unwrap();
        comp.push(&i32::MAX.to_le_bytes());
        comp.push(&2i32.to_le_bytes());
        comp.push(&0i32.to_le_bytes());
        comp.push(&0i64.to_le_bytes());
        comp.finish();

        let mut dec = StreamDecompressor::new(&out[..]).unwrap();
        assert!(FrameRecord::read(&mut dec).unwrap().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Decoding a stream cut at any byte offset never panics and yields
        /// only fully-decoded records, each matching its original.
        #[test]
        fn prop_truncation_tolerance(cut_fraction in 0.0f64..1.0) {
            let records: Vec<FrameRecord> = (0u32..4)
                .map(|i| {
                    let f = frame(6 + i, 4, PixelFormat::Bgra8, i as u8);
                    FrameRecord::from_captured(&f, i as i64 * 1000)
                })
                .collect();
            let bytes = encode_records(&records);
            let cut = ((bytes.len() as f64) * cut_fraction) as usize;

            let mut dec = StreamDecompressor::new(&bytes[..cut]).unwrap();
            let mut decoded = 0usize;
            while let Some(rec) = FrameRecord::read(&mut dec).unwrap() {
                prop_assert_eq!(rec.data.len(), records[decoded].data.len());
                prop_assert_eq!(&rec.data, &records[decoded].data);
                decoded += 1;
            }
            prop_assert!(decoded <= records.len());
        }
    }
}
