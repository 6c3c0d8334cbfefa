//! The two decoder variants: per-block independent reconstruction, and
//! cross-boundary interpolation where each block borrows a one-sample border
//! from its already-reconstructed top/left/past-frame neighbors.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CodecError, Result};
use crate::partition::{tile_blocks, BlockOffset, SamplingMode, Shape3D};
use crate::plane::Volume;
use crate::resample::{interpolate_centers, pick_first, repeat_3d, zoom_3d};
use crate::util::ByteCursor;
use crate::yuv::YuvWriter;
use crate::{Config, DecodingType};

/// Nearest-neighbor reconstruction of all three planes.
pub fn repeat_samples(y: &Volume, u: &Volume, v: &Volume, mode: &SamplingMode) -> (Volume, Volume, Volume) {
    (
        repeat_3d(y, mode.y_chunk),
        repeat_3d(u, mode.uv_chunk),
        repeat_3d(v, mode.uv_chunk),
    )
}

/// Chunk-center trilinear reconstruction for luma, repetition for chroma.
///
/// Chroma is already half resolution before subsampling; interpolating only
/// luma avoids interpolating chroma twice.
pub fn interpolate_average_samples(y: &Volume, u: &Volume, v: &Volume, mode: &SamplingMode) -> (Volume, Volume, Volume) {
    (
        interpolate_centers(y, mode.y_chunk, mode.block),
        repeat_3d(u, mode.uv_chunk),
        repeat_3d(v, mode.uv_chunk),
    )
}

/// Per-block reconstruction for the given decoding type. Also serves as the
/// encoder's in-loop model during RD search.
pub fn reconstruct_samples(
    y: &Volume,
    u: &Volume,
    v: &Volume,
    mode: &SamplingMode,
    decoding: DecodingType,
) -> (Volume, Volume, Volume) {
    match decoding {
        DecodingType::Repeat => repeat_samples(y, u, v, mode),
        DecodingType::Interpolate => interpolate_average_samples(y, u, v, mode),
    }
}

/// Trilinear zoom of the border-extended sample grids up to the extended
/// block shape. Used by the cross-boundary decoder, and by the
/// cross-boundary encoder as its in-loop model.
pub fn interpolate_samples(y: &Volume, u: &Volume, v: &Volume, mode: &SamplingMode) -> (Volume, Volume, Volume) {
    let target = mode.block.extended(1);
    (zoom_3d(y, target), zoom_3d(u, target), zoom_3d(v, target))
}

// Parse the 4-byte metadata header (u16 LE rows, u16 LE cols) and wrap the
// remaining mode bytes in a cursor.
fn split_metadata(metadata: Vec<u8>) -> Result<(usize, usize, ByteCursor)> {
    if metadata.len() < 4 {
        return Err(CodecError::TruncatedInput);
    }
    let rows = LittleEndian::read_u16(&metadata[0..2]) as usize;
    let cols = LittleEndian::read_u16(&metadata[2..4]) as usize;
    if rows == 0 || cols == 0 {
        return Err(CodecError::ShapeMismatch(
            "metadata header declares an empty frame".to_string(),
        ));
    }
    Ok((rows, cols, ByteCursor::new(metadata[4..].to_vec())))
}

pub struct SimpleDecoder<'a, W: Write> {
    config: &'a Config,
    rows: usize,
    cols: usize,
    code: ByteCursor,
    metadata: ByteCursor,
    writer: YuvWriter<W>,
}

impl<'a, W: Write> SimpleDecoder<'a, W> {
    pub fn new(code: Vec<u8>, metadata: Vec<u8>, writer: YuvWriter<W>, config: &'a Config) -> Result<SimpleDecoder<'a, W>> {
        let (rows, cols, metadata) = split_metadata(metadata)?;
        Ok(SimpleDecoder { config, rows, cols, code: ByteCursor::new(code), metadata, writer })
    }

    pub fn decode(&mut self) -> Result<()> {
        let frames = self.config.block.frames;
        let part_shape = Shape3D::new(self.rows, self.cols, frames);
        let mut parts = [Volume::new(part_shape), Volume::new(part_shape), Volume::new(part_shape)];
        let blocks = tile_blocks(self.rows, self.cols, self.config.block);

        let mut part_index = 0;
        while self.code.has_next() {
            for &(offset, block) in &blocks {
                let mode_id = self.metadata.get()?;
                let mode = self.config.get_mode(mode_id as usize, block)?;

                let y = self.code.get_many(mode.y_points)?;
                let u = self.code.get_many(mode.uv_points)?;
                let v = self.code.get_many(mode.uv_points)?;

                let decoded = reconstruct_samples(&y, &u, &v, &mode, self.config.decoding_type);
                let origin = (offset.row, offset.col, 0);
                parts[0].set_window(origin, &decoded.0);
                parts[1].set_window(origin, &decoded.1);
                parts[2].set_window(origin, &decoded.2);
            }

            for f in 0..frames {
                let y = parts[0].frame_window(f, (0, 0), self.rows, self.cols);
                let u = parts[1].frame_window(f, (0, 0), self.rows, self.cols);
                let v = parts[2].frame_window(f, (0, 0), self.rows, self.cols);
                self.writer.write_frame(&y, &u, &v, self.rows, self.cols)?;
            }

            debug!("part {}: {} blocks decoded", part_index, blocks.len());
            part_index += 1;
        }

        self.writer.flush()
    }
}

pub struct InterpolationDecoder<'a, W: Write> {
    config: &'a Config,
    rows: usize,
    cols: usize,
    code: ByteCursor,
    metadata: ByteCursor,
    writer: YuvWriter<W>,
}

impl<'a, W: Write> InterpolationDecoder<'a, W> {
    pub fn new(code: Vec<u8>, metadata: Vec<u8>, writer: YuvWriter<W>, config: &'a Config) -> Result<InterpolationDecoder<'a, W>> {
        let (rows, cols, metadata) = split_metadata(metadata)?;
        Ok(InterpolationDecoder { config, rows, cols, code: ByteCursor::new(code), metadata, writer })
    }

    // Reconstruct one plane of one block into the padded part buffer.
    //
    // The extended input grid starts from the already-reconstructed part
    // window, so border slots carry decoded neighbor samples; the interior
    // is overwritten with code bytes, and borders with no neighbor to
    // borrow from duplicate the adjacent code values instead.
    fn decode_plane_block(
        part: &mut Volume,
        code: &mut ByteCursor,
        offset: BlockOffset,
        block: Shape3D,
        chunk: Shape3D,
        points: Shape3D,
        first_part: bool,
    ) -> Result<()> {
        let extended = block.extended(1);
        let window = part.window((offset.row, offset.col, 0), extended);

        let mut input = pick_first(&window, chunk);
        input.set_window((1, 1, 1), &code.get_many(points)?);

        if first_part {
            input.copy_frame(0, 1);
        }
        if offset.row == 0 {
            input.copy_row(0, 1);
        }
        if offset.col == 0 {
            input.copy_col(0, 1);
        }

        let decoded = zoom_3d(&input, extended);
        let interior = decoded.window((1, 1, 1), block);
        part.set_window((offset.row + 1, offset.col + 1, 1), &interior);
        Ok(())
    }

    pub fn decode(&mut self) -> Result<()> {
        let frames = self.config.block.frames;
        let part_shape = Shape3D::new(self.rows + 1, self.cols + 1, frames + 1);
        let mut parts = [Volume::new(part_shape), Volume::new(part_shape), Volume::new(part_shape)];
        let blocks = tile_blocks(self.rows, self.cols, self.config.block);

        let mut first_part = true;
        let mut part_index = 0;
        while self.code.has_next() {
            for &(offset, block) in &blocks {
                let mode_id = self.metadata.get()?;
                let mode = self.config.get_mode(mode_id as usize, block)?;

                Self::decode_plane_block(&mut parts[0], &mut self.code, offset, block, mode.y_chunk, mode.y_points, first_part)?;
                Self::decode_plane_block(&mut parts[1], &mut self.code, offset, block, mode.uv_chunk, mode.uv_points, first_part)?;
                Self::decode_plane_block(&mut parts[2], &mut self.code, offset, block, mode.uv_chunk, mode.uv_points, first_part)?;
            }

            for f in 0..frames {
                let y = parts[0].frame_window(f + 1, (1, 1), self.rows, self.cols);
                let u = parts[1].frame_window(f + 1, (1, 1), self.rows, self.cols);
                let v = parts[2].frame_window(f + 1, (1, 1), self.rows, self.cols);
                self.writer.write_frame(&y, &u, &v, self.rows, self.cols)?;
            }

            // seed the next part's temporal border with the last frame
            for part in parts.iter_mut() {
                part.copy_frame(0, frames);
            }

            debug!("part {}: {} blocks decoded", part_index, blocks.len());
            part_index += 1;
            first_part = false;
        }

        self.writer.flush()
    }
}
