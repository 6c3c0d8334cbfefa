//! Planar YUV 4:2:0 file input and output.
//!
//! Internally the codec works on a 4:4:4 representation: the reader
//! upsamples chroma to full resolution by 2x2 repetition, and the writer
//! subsamples it back by keeping element [1::2, 1::2] of each reconstructed
//! chroma plane.

use std::io::{ErrorKind, Read, Write};

use crate::error::Result;

/// One full-resolution frame: Y, U, V planes of `rows * cols` bytes each.
pub struct Frame {
    pub planes: [Vec<u8>; 3],
}

pub struct YuvReader {
    input: Box<dyn Read>,
    pub rows: usize,
    pub cols: usize,
}

// Fill `buf` completely, or report a clean end of input. A partial fill is
// treated as end of input too: trailing bytes that do not form a whole frame
// are discarded.
fn read_fully(input: &mut dyn Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn upsample_2x(half: &[u8], half_rows: usize, half_cols: usize) -> Vec<u8> {
    let mut full = Vec::with_capacity(4 * half_rows * half_cols);
    for r in 0..2 * half_rows {
        for c in 0..2 * half_cols {
            full.push(half[(r / 2) * half_cols + c / 2]);
        }
    }
    full
}

impl YuvReader {
    pub fn new(input: Box<dyn Read>, rows: usize, cols: usize) -> YuvReader {
        YuvReader { input, rows, cols }
    }

    /// Next frame at full resolution, or `None` at the end of the sequence.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut y = vec![0u8; self.rows * self.cols];
        if !read_fully(&mut self.input, &mut y)? {
            return Ok(None);
        }

        let (half_rows, half_cols) = (self.rows / 2, self.cols / 2);
        let mut u = vec![0u8; half_rows * half_cols];
        let mut v = vec![0u8; half_rows * half_cols];
        if !read_fully(&mut self.input, &mut u)? || !read_fully(&mut self.input, &mut v)? {
            return Ok(None);
        }

        Ok(Some(Frame {
            planes: [
                y,
                upsample_2x(&u, half_rows, half_cols),
                upsample_2x(&v, half_rows, half_cols),
            ],
        }))
    }
}

pub struct YuvWriter<W: Write> {
    output: W,
}

impl<W: Write> YuvWriter<W> {
    pub fn new(output: W) -> YuvWriter<W> {
        YuvWriter { output }
    }

    /// Append one frame, subsampling the full-resolution chroma planes.
    pub fn write_frame(&mut self, y: &[u8], u: &[u8], v: &[u8], rows: usize, cols: usize) -> Result<()> {
        self.output.write_all(y)?;
        for plane in &[u, v] {
            for r in (1..rows).step_by(2) {
                for c in (1..cols).step_by(2) {
                    self.output.write_all(&[plane[r * cols + c]])?;
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    // 4x4 frame: 16 Y bytes, 4 U, 4 V
    fn frame_bytes() -> Vec<u8> {
        let mut data: Vec<u8> = (0..16).collect();
        data.extend_from_slice(&[100, 101, 102, 103]);
        data.extend_from_slice(&[200, 201, 202, 203]);
        data
    }

    #[test]
    fn reader_upsamples_chroma() {
        let mut reader = YuvReader::new(Box::new(Cursor::new(frame_bytes())), 4, 4);
        let frame = reader.read_frame().unwrap().unwrap();

        assert_eq!(frame.planes[0], (0..16).collect::<Vec<u8>>());
        assert_eq!(
            frame.planes[1],
            vec![100, 100, 101, 101, 100, 100, 101, 101, 102, 102, 103, 103, 102, 102, 103, 103]
        );
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn trailing_partial_frame_is_discarded() {
        let mut data = frame_bytes();
        data.extend_from_slice(&[7; 10]);
        let mut reader = YuvReader::new(Box::new(Cursor::new(data)), 4, 4);

        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn writer_inverts_the_reader() {
        let source = frame_bytes();
        let mut reader = YuvReader::new(Box::new(Cursor::new(source.clone())), 4, 4);
        let frame = reader.read_frame().unwrap().unwrap();

        let mut out = Vec::new();
        let mut writer = YuvWriter::new(&mut out);
        writer
            .write_frame(&frame.planes[0], &frame.planes[1], &frame.planes[2], 4, 4)
            .unwrap();
        assert_eq!(out, source);
    }
}
