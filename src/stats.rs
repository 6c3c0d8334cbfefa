//! Post-run statistics and diagnostic maps: per-frame fidelity metrics, a
//! JSON `.stats` record, a per-pixel error map and a kept-sample intensity
//! map derived from the metadata stream.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use serde_derive::Serialize;

use crate::error::{CodecError, Result};
use crate::partition::{tile_blocks, Shape3D};
use crate::plane::Volume;
use crate::util::ByteCursor;
use crate::yuv::{Frame, YuvReader};
use crate::{paths, Config};

#[derive(Debug, Serialize)]
pub struct CodecStats {
    pub sequence: String,
    pub experiment: String,
    pub encoding_mode: String,
    pub decoding_mode: String,
    pub block: String,
    pub target_bpp: f64,
    pub bpp: f64,
    pub bpp_including_meta: f64,
    pub compression_ratio: f64,
    pub mse: f64,
    pub psnr: f64,
    pub resolution: String,
    pub frames: usize,
    pub sequence_size: u64,
    pub code_size: u64,
    pub metadata_size: u64,
    pub encoding_time_s: f64,
    pub decoding_time_s: f64,
}

fn open_reader(path: &Path) -> Result<YuvReader> {
    let (rows, cols) = paths::video_shape(path)?;
    Ok(YuvReader::new(Box::new(BufReader::new(File::open(path)?)), rows, cols))
}

fn frame_mse(a: &Frame, b: &Frame) -> f64 {
    let mut total = 0u64;
    let mut count = 0usize;
    for (pa, pb) in a.planes.iter().zip(b.planes.iter()) {
        for (&x, &y) in pa.iter().zip(pb.iter()) {
            let d = i64::from(x) - i64::from(y);
            total += (d * d) as u64;
        }
        count += pa.len();
    }
    total as f64 / count as f64
}

fn psnr(mse: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0 * 255.0 / mse).log10()
    }
}

/// Mean per-frame (MSE, PSNR) of the decoded sequence against its source,
/// both compared at the full-resolution internal representation.
pub fn calculate_metrics(sequence_path: &Path, decoded_path: &Path) -> Result<(f64, f64)> {
    let mut source = open_reader(sequence_path)?;
    let mut decoded = open_reader(decoded_path)?;

    let mut mse_sum = 0.0;
    let mut psnr_sum = 0.0;
    let mut frames = 0usize;

    while let (Some(a), Some(b)) = (source.read_frame()?, decoded.read_frame()?) {
        let mse = frame_mse(&a, &b);
        mse_sum += mse;
        psnr_sum += psnr(mse);
        frames += 1;
    }
    if frames == 0 {
        return Err(CodecError::ShapeMismatch(format!(
            "decoded sequence {} holds no whole frame",
            decoded_path.display()
        )));
    }

    Ok((mse_sum / frames as f64, psnr_sum / frames as f64))
}

/// Collect the stats record for a finished encode/decode run.
pub fn gather_stats(
    sequence_path: &Path,
    config: &Config,
    encoding_time_s: f64,
    decoding_time_s: f64,
) -> Result<CodecStats> {
    let (rows, cols) = paths::video_shape(sequence_path)?;
    let sequence_size = fs::metadata(sequence_path)?.len();
    let code_size = fs::metadata(paths::code_path(sequence_path))?.len();
    let metadata_size = fs::metadata(paths::metadata_path(sequence_path))?.len();

    // kept bytes against the 4:4:4 internal representation, which is twice
    // the 4:2:0 file size
    let internal_size = (2 * sequence_size) as f64;
    let (mse, psnr) = calculate_metrics(sequence_path, &paths::decoded_sequence_path(sequence_path))?;

    Ok(CodecStats {
        sequence: sequence_path.display().to_string(),
        experiment: config.name(),
        encoding_mode: config.encoding_type.to_string(),
        decoding_mode: config.decoding_type.to_string(),
        block: config.block.to_string(),
        target_bpp: config.target_bpp,
        bpp: code_size as f64 / internal_size * 24.0,
        bpp_including_meta: (code_size + metadata_size) as f64 / internal_size * 24.0,
        compression_ratio: internal_size / (code_size + metadata_size) as f64,
        mse,
        psnr,
        resolution: format!("{}x{}", rows, cols),
        frames: paths::frames_count(sequence_path)?,
        sequence_size,
        code_size,
        metadata_size,
        encoding_time_s,
        decoding_time_s,
    })
}

/// Write the stats record as a pretty-printed JSON `.stats` file.
#[cfg(feature = "serde_json")]
pub fn save_json_stats(sequence_path: &Path, stats: &CodecStats) -> Result<()> {
    let file = File::create(paths::stats_path(sequence_path))?;
    serde_json::to_writer_pretty(file, stats)
        .map_err(|e| CodecError::Io(e.into()))?;
    Ok(())
}

/// Grayscale per-frame map of reconstruction error: the absolute difference
/// summed over the three planes, scaled by 10 and clamped to a byte.
pub fn write_error_map(sequence_path: &Path, decoded_path: &Path) -> Result<()> {
    let mut source = open_reader(sequence_path)?;
    let mut decoded = open_reader(decoded_path)?;
    let mut out = BufWriter::new(File::create(paths::error_map_path(decoded_path))?);

    while let (Some(a), Some(b)) = (source.read_frame()?, decoded.read_frame()?) {
        let pixels = a.planes[0].len();
        let mut map = vec![0u8; pixels];
        for (i, slot) in map.iter_mut().enumerate() {
            let mut diff = 0i64;
            for (pa, pb) in a.planes.iter().zip(b.planes.iter()) {
                diff += (i64::from(pa[i]) - i64::from(pb[i])).abs();
            }
            *slot = (diff * 10).min(255) as u8;
        }
        out.write_all(&map)?;
    }

    out.flush()?;
    Ok(())
}

/// Grayscale per-frame map of the kept luma sample positions, reconstructed
/// from the metadata stream alone: 255 where a sample was retained.
pub fn write_intensity_map(sequence_path: &Path, config: &Config) -> Result<()> {
    let metadata = fs::read(paths::metadata_path(sequence_path))?;
    if metadata.len() < 4 {
        return Err(CodecError::TruncatedInput);
    }
    let rows = LittleEndian::read_u16(&metadata[0..2]) as usize;
    let cols = LittleEndian::read_u16(&metadata[2..4]) as usize;
    let mut modes = ByteCursor::new(metadata[4..].to_vec());

    let frames = config.block.frames;
    let blocks = tile_blocks(rows, cols, config.block);
    let mut out = BufWriter::new(File::create(paths::intensity_map_path(sequence_path))?);

    while modes.has_next() {
        let mut part = Volume::new(Shape3D::new(rows, cols, frames));

        for &(offset, block) in &blocks {
            let mode_id = modes.get()?;
            let mode = config.get_mode(mode_id as usize, block)?;
            let chunk = mode.y_chunk;

            for r in ((chunk.rows - 1)..block.rows).step_by(chunk.rows) {
                for c in ((chunk.cols - 1)..block.cols).step_by(chunk.cols) {
                    for f in ((chunk.frames - 1)..frames).step_by(chunk.frames) {
                        part[(offset.row + r, offset.col + c, f)] = 255;
                    }
                }
            }
        }

        for f in 0..frames {
            out.write_all(&part.frame_window(f, (0, 0), rows, cols))?;
        }
    }

    out.flush()?;
    Ok(())
}
