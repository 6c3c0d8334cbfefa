//! The two encoder variants. Both group frames into parts, run the RD
//! search per block, and emit kept samples plus one mode byte per block; the
//! cross-boundary variant additionally works on border-extended windows so
//! the decoder can interpolate seamlessly across block and part boundaries.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use rayon::prelude::*;

use crate::decoder;
use crate::error::{CodecError, Result};
use crate::partition::{tile_blocks, SamplingMode, Shape3D};
use crate::plane::Volume;
use crate::rdo::{self, RdPoint};
use crate::resample::{averages_3d, pick_first, pick_last};
use crate::yuv::YuvReader;
use crate::{Config, EncodingType};

/// Per-block views of the three planes, copied out of the part buffer. For
/// the cross-boundary encoder the planes are the border-extended windows and
/// `block` stays the unextended (possibly edge-clipped) shape.
pub struct BlockEncodingData {
    pub y: Volume,
    pub u: Volume,
    pub v: Volume,
    pub block: Shape3D,
}

fn check_dimensions(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 || rows > u16::MAX as usize || cols > u16::MAX as usize {
        return Err(CodecError::ShapeMismatch(format!(
            "frame shape {}x{} does not fit the metadata header",
            rows, cols
        )));
    }
    Ok(())
}

fn write_metadata_header(meta: &mut dyn Write, rows: usize, cols: usize) -> Result<()> {
    meta.write_u16::<LittleEndian>(rows as u16)?;
    meta.write_u16::<LittleEndian>(cols as u16)?;
    Ok(())
}

// Kept samples of one block, per the encoding type. The cross-boundary
// variant never routes through here.
fn extract_samples(data: &BlockEncodingData, mode: &SamplingMode, encoding: EncodingType) -> (Volume, Volume, Volume) {
    match encoding {
        EncodingType::PickRepeat => (
            pick_last(&data.y, mode.y_chunk),
            pick_last(&data.u, mode.uv_chunk),
            pick_last(&data.v, mode.uv_chunk),
        ),
        EncodingType::AverageRepeat | EncodingType::AverageInterpolate => (
            averages_3d(&data.y, mode.y_chunk, mode.y_points),
            averages_3d(&data.u, mode.uv_chunk, mode.uv_points),
            averages_3d(&data.v, mode.uv_chunk, mode.uv_points),
        ),
        EncodingType::PickInterpolate => {
            unreachable!("cross-boundary encoding is handled by InterpolationEncoder")
        }
    }
}

// RD candidates of one block: encode with every admissible mode, run the
// in-loop reconstruction, and measure merged-plane MSE against the source.
fn rd_hull(config: &Config, data: &BlockEncodingData) -> Vec<RdPoint> {
    let candidates = config
        .modes_for(data.block)
        .iter()
        .map(|mode| {
            let (ye, ue, ve) = extract_samples(data, mode, config.encoding_type);
            let (yd, ud, vd) = decoder::reconstruct_samples(&ye, &ue, &ve, mode, config.decoding_type);
            RdPoint {
                mode_idx: mode.idx as isize,
                rate: mode.rate,
                distortion: rdo::merged_mse([&data.y, &data.u, &data.v], [&yd, &ud, &vd]),
            }
        })
        .collect();
    rdo::convex_hull(candidates)
}

pub struct SimpleEncoder<'a, C: Write, M: Write> {
    config: &'a Config,
    source: YuvReader,
    code: C,
    meta: M,
}

impl<'a, C: Write, M: Write> SimpleEncoder<'a, C, M> {
    pub fn new(source: YuvReader, code: C, meta: M, config: &'a Config) -> SimpleEncoder<'a, C, M> {
        assert!(config.encoding_type != EncodingType::PickInterpolate);
        SimpleEncoder { config, source, code, meta }
    }

    pub fn encode(&mut self) -> Result<()> {
        let (rows, cols) = (self.source.rows, self.source.cols);
        check_dimensions(rows, cols)?;
        write_metadata_header(&mut self.meta, rows, cols)?;

        let frames = self.config.block.frames;
        let part_shape = Shape3D::new(rows, cols, frames);
        let mut parts = [Volume::new(part_shape), Volume::new(part_shape), Volume::new(part_shape)];
        let blocks = tile_blocks(rows, cols, self.config.block);

        let mut part_index = 0;
        loop {
            for f in 0..frames {
                match self.source.read_frame()? {
                    Some(frame) => {
                        for (part, plane) in parts.iter_mut().zip(frame.planes.iter()) {
                            part.load_frame(f, (0, 0), rows, cols, plane);
                        }
                    }
                    None => {
                        self.code.flush()?;
                        self.meta.flush()?;
                        return Ok(());
                    }
                }
            }

            let data: Vec<BlockEncodingData> = blocks
                .iter()
                .map(|&(offset, block)| {
                    let origin = (offset.row, offset.col, 0);
                    BlockEncodingData {
                        y: parts[0].window(origin, block),
                        u: parts[1].window(origin, block),
                        v: parts[2].window(origin, block),
                        block,
                    }
                })
                .collect();

            let config = self.config;
            let hulls: Vec<Vec<RdPoint>> = data.par_iter().map(|d| rd_hull(config, d)).collect();
            let mode_ids = rdo::bisection(&hulls, self.config.target_bpp);

            for (d, &mode_id) in data.iter().zip(&mode_ids) {
                let mode = self.config.get_mode(mode_id, d.block)?;
                let (y, u, v) = extract_samples(d, &mode, self.config.encoding_type);
                self.code.write_all(y.data())?;
                self.code.write_all(u.data())?;
                self.code.write_all(v.data())?;
                self.meta.write_all(&[mode_id as u8])?;
            }

            info!("part {}: {} blocks encoded", part_index, blocks.len());
            part_index += 1;
        }
    }
}

// Border-extended sample grids of one block.
fn pick_extended(data: &BlockEncodingData, mode: &SamplingMode) -> (Volume, Volume, Volume) {
    (
        pick_first(&data.y, mode.y_chunk),
        pick_first(&data.u, mode.uv_chunk),
        pick_first(&data.v, mode.uv_chunk),
    )
}

fn interior(v: &Volume, shape: Shape3D) -> Volume {
    v.window((1, 1, 1), shape)
}

// RD candidates of one cross-boundary block. The in-loop model is the real
// cross-boundary reconstruction, but it sees source borders where the
// decoder will see decoded ones, so the reported distortion is an
// optimistic approximation.
fn cross_rd_hull(config: &Config, data: &BlockEncodingData) -> Vec<RdPoint> {
    let block = data.block;
    let source = [
        interior(&data.y, block),
        interior(&data.u, block),
        interior(&data.v, block),
    ];

    let candidates = config
        .modes_for(block)
        .iter()
        .map(|mode| {
            let (ye, ue, ve) = pick_extended(data, mode);
            let (yd, ud, vd) = decoder::interpolate_samples(&ye, &ue, &ve, mode);
            let decoded = [interior(&yd, block), interior(&ud, block), interior(&vd, block)];
            RdPoint {
                mode_idx: mode.idx as isize,
                rate: mode.rate,
                distortion: rdo::merged_mse(
                    [&source[0], &source[1], &source[2]],
                    [&decoded[0], &decoded[1], &decoded[2]],
                ),
            }
        })
        .collect();
    rdo::convex_hull(candidates)
}

pub struct InterpolationEncoder<'a, C: Write, M: Write> {
    config: &'a Config,
    source: YuvReader,
    code: C,
    meta: M,
}

impl<'a, C: Write, M: Write> InterpolationEncoder<'a, C, M> {
    pub fn new(source: YuvReader, code: C, meta: M, config: &'a Config) -> InterpolationEncoder<'a, C, M> {
        assert!(config.encoding_type == EncodingType::PickInterpolate);
        InterpolationEncoder { config, source, code, meta }
    }

    pub fn encode(&mut self) -> Result<()> {
        let (rows, cols) = (self.source.rows, self.source.cols);
        check_dimensions(rows, cols)?;
        write_metadata_header(&mut self.meta, rows, cols)?;

        let frames = self.config.block.frames;
        let part_shape = Shape3D::new(rows + 1, cols + 1, frames + 1);
        let mut parts = [Volume::new(part_shape), Volume::new(part_shape), Volume::new(part_shape)];
        let blocks = tile_blocks(rows, cols, self.config.block);

        let mut first_part = true;
        let mut part_index = 0;
        loop {
            for f in 0..frames {
                match self.source.read_frame()? {
                    Some(frame) => {
                        for (part, plane) in parts.iter_mut().zip(frame.planes.iter()) {
                            part.load_frame(f + 1, (1, 1), rows, cols, plane);
                        }
                    }
                    None => {
                        self.code.flush()?;
                        self.meta.flush()?;
                        return Ok(());
                    }
                }
            }

            // duplicate the first real row and column onto the part border
            for part in parts.iter_mut() {
                part.copy_row(0, 1);
                part.copy_col(0, 1);
            }
            // the very first part has no past frame to borrow from
            if first_part {
                for part in parts.iter_mut() {
                    part.copy_frame(0, 1);
                }
                first_part = false;
            }

            let data: Vec<BlockEncodingData> = blocks
                .iter()
                .map(|&(offset, block)| {
                    let origin = (offset.row, offset.col, 0);
                    let extended = block.extended(1);
                    BlockEncodingData {
                        y: parts[0].window(origin, extended),
                        u: parts[1].window(origin, extended),
                        v: parts[2].window(origin, extended),
                        block,
                    }
                })
                .collect();

            let config = self.config;
            let hulls: Vec<Vec<RdPoint>> = data.par_iter().map(|d| cross_rd_hull(config, d)).collect();
            let mode_ids = rdo::bisection(&hulls, self.config.target_bpp);

            for (d, &mode_id) in data.iter().zip(&mode_ids) {
                let mode = self.config.get_mode(mode_id, d.block)?;
                let (y, u, v) = pick_extended(d, &mode);
                // the border samples are never transmitted
                self.code.write_all(interior(&y, mode.y_points).data())?;
                self.code.write_all(interior(&u, mode.uv_points).data())?;
                self.code.write_all(interior(&v, mode.uv_points).data())?;
                self.meta.write_all(&[mode_id as u8])?;
            }

            // copy the last frame into the next part's temporal border
            for part in parts.iter_mut() {
                part.copy_frame(0, frames);
            }

            info!("part {}: {} blocks encoded", part_index, blocks.len());
            part_index += 1;
        }
    }
}
