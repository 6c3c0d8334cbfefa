#[macro_use]
extern crate log;

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod partition;
pub mod paths;
pub mod plane;
pub mod rdo;
pub mod resample;
pub mod stats;
pub mod util;
pub mod yuv;

pub use crate::error::{CodecError, Result};

use crate::decoder::{InterpolationDecoder, SimpleDecoder};
use crate::encoder::{InterpolationEncoder, SimpleEncoder};
use crate::partition::{generate_chunks, generate_modes, SamplingMode, Shape3D};
use crate::yuv::{YuvReader, YuvWriter};

/// How kept samples are produced and, for PICK_INTERPOLATE, that the
/// cross-boundary pipeline is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    PickRepeat,
    PickInterpolate,
    AverageRepeat,
    AverageInterpolate,
}

/// How omitted samples are reconstructed at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingType {
    Repeat,
    Interpolate,
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EncodingType::PickRepeat => "pick_repeat",
            EncodingType::PickInterpolate => "pick_interpolate",
            EncodingType::AverageRepeat => "average_repeat",
            EncodingType::AverageInterpolate => "average_interpolate",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EncodingType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<EncodingType> {
        match s {
            "pick_repeat" => Ok(EncodingType::PickRepeat),
            "pick_interpolate" => Ok(EncodingType::PickInterpolate),
            "average_repeat" => Ok(EncodingType::AverageRepeat),
            "average_interpolate" => Ok(EncodingType::AverageInterpolate),
            _ => Err(CodecError::ConfigInvalid(format!("unknown encoding type {:?}", s))),
        }
    }
}

impl fmt::Display for DecodingType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DecodingType::Repeat => "repeat",
            DecodingType::Interpolate => "interpolate",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DecodingType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<DecodingType> {
        match s {
            "repeat" => Ok(DecodingType::Repeat),
            "interpolate" => Ok(DecodingType::Interpolate),
            _ => Err(CodecError::ConfigInvalid(format!("unknown decoding type {:?}", s))),
        }
    }
}

/// Everything invariant across one (sequence, settings) run: the base block
/// shape, the target rate, the chunk list and the mode table precomputed
/// for the base block.
pub struct Config {
    pub block: Shape3D,
    pub target_bpp: f64,
    pub encoding_type: EncodingType,
    pub decoding_type: DecodingType,
    chunks: Vec<(Shape3D, Shape3D)>,
    modes: Vec<SamplingMode>,
}

impl Config {
    pub fn new(
        rows: usize,
        cols: usize,
        frames: usize,
        target_bpp: f64,
        encoding_type: EncodingType,
        decoding_type: DecodingType,
    ) -> Result<Config> {
        if !rows.is_power_of_two() || rows < 2 || !cols.is_power_of_two() || cols < 2 {
            return Err(CodecError::ConfigInvalid(format!(
                "block rows and cols must be powers of two of at least 2, got {}x{}",
                rows, cols
            )));
        }
        if !frames.is_power_of_two() {
            return Err(CodecError::ConfigInvalid(format!(
                "block frame depth must be a power of two, got {}",
                frames
            )));
        }
        if !(target_bpp > 0.0 && target_bpp <= rdo::RATE_MAX) {
            return Err(CodecError::ConfigInvalid(format!(
                "target bpp must lie in (0, 24], got {}",
                target_bpp
            )));
        }
        match (encoding_type, decoding_type) {
            (EncodingType::PickInterpolate, DecodingType::Repeat)
            | (EncodingType::AverageInterpolate, DecodingType::Repeat) => {
                return Err(CodecError::ConfigInvalid(format!(
                    "unsupported pairing {}/{}",
                    encoding_type, decoding_type
                )));
            }
            _ => {}
        }

        let block = Shape3D::new(rows, cols, frames);
        let chunks = generate_chunks(block);
        if chunks.len() > u8::MAX as usize {
            return Err(CodecError::ConfigInvalid(format!(
                "{} sampling modes do not fit the one-byte metadata index",
                chunks.len()
            )));
        }
        let modes = generate_modes(&chunks, block);
        debug_assert!(modes.iter().enumerate().all(|(i, m)| m.idx == i));

        Ok(Config { block, target_bpp, encoding_type, decoding_type, chunks, modes })
    }

    /// Experiment name shared by all files a run produces.
    pub fn name(&self) -> String {
        format!(
            "{}__{}__{}__{}__{}__{}",
            self.block.rows,
            self.block.cols,
            self.block.frames,
            self.target_bpp,
            self.encoding_type,
            self.decoding_type
        )
    }

    /// Mode table of the base block, indexable by serialized mode index.
    pub fn modes(&self) -> &[SamplingMode] {
        &self.modes
    }

    /// Admissible modes specialized for `block`, with stable indices.
    pub fn modes_for(&self, block: Shape3D) -> Vec<SamplingMode> {
        if block == self.block {
            self.modes.clone()
        } else {
            generate_modes(&self.chunks, block)
        }
    }

    /// The mode serialized as `idx`, specialized for `block`. Fails when the
    /// index is outside this configuration's mode table or the chunk does
    /// not divide the block, i.e. the metadata belongs to another `Config`.
    pub fn get_mode(&self, idx: usize, block: Shape3D) -> Result<SamplingMode> {
        let &(y_chunk, uv_chunk) = self
            .chunks
            .get(idx)
            .ok_or(CodecError::InvalidModeIndex(idx as u8))?;
        if !block.is_divisible(uv_chunk) {
            return Err(CodecError::InvalidModeIndex(idx as u8));
        }
        if block == self.block {
            Ok(self.modes[idx])
        } else {
            Ok(SamplingMode::new(idx, y_chunk, uv_chunk, block))
        }
    }
}

fn uses_cross_boundary_decoder(config: &Config) -> bool {
    config.decoding_type == DecodingType::Interpolate
        && matches!(
            config.encoding_type,
            EncodingType::PickRepeat | EncodingType::PickInterpolate
        )
}

/// Encode `<dir>/<name>.yuv` into sibling `.code` and `.meta` files. Frame
/// dimensions come from the sequence's parent directory name.
pub fn encode_sequence(sequence_path: &Path, config: &Config) -> Result<()> {
    let (rows, cols) = paths::video_shape(sequence_path)?;
    let source = YuvReader::new(Box::new(BufReader::new(File::open(sequence_path)?)), rows, cols);
    let code = BufWriter::new(File::create(paths::code_path(sequence_path))?);
    let meta = BufWriter::new(File::create(paths::metadata_path(sequence_path))?);

    info!("encoding {} as {}", sequence_path.display(), config.name());
    match config.encoding_type {
        EncodingType::PickInterpolate => {
            InterpolationEncoder::new(source, code, meta, config).encode()
        }
        _ => SimpleEncoder::new(source, code, meta, config).encode(),
    }
}

/// Decode the `.code`/`.meta` pair next to `sequence_path` into a sibling
/// `.yuv_decoded` file. `config` must be the one the encoder ran with.
pub fn decode_sequence(sequence_path: &Path, config: &Config) -> Result<()> {
    let code = fs::read(paths::code_path(sequence_path))?;
    let metadata = fs::read(paths::metadata_path(sequence_path))?;
    let writer = YuvWriter::new(BufWriter::new(File::create(
        paths::decoded_sequence_path(sequence_path),
    )?));

    info!("decoding {} as {}", sequence_path.display(), config.name());
    if uses_cross_boundary_decoder(config) {
        InterpolationDecoder::new(code, metadata, writer, config)?.decode()
    } else {
        SimpleDecoder::new(code, metadata, writer, config)?.decode()
    }
}

/// One whole batch step: encode, decode, emit the intensity and error maps,
/// and collect timed stats for the run. The stats record is also written as
/// a sibling `.stats` JSON file when that output is compiled in.
pub fn run_codec(sequence_path: &Path, config: &Config) -> Result<stats::CodecStats> {
    let start = Instant::now();
    encode_sequence(sequence_path, config)?;
    let encoded = Instant::now();
    decode_sequence(sequence_path, config)?;
    let decoded = Instant::now();

    stats::write_intensity_map(sequence_path, config)?;
    stats::write_error_map(sequence_path, &paths::decoded_sequence_path(sequence_path))?;

    let record = stats::gather_stats(
        sequence_path,
        config,
        (encoded - start).as_secs_f64(),
        (decoded - encoded).as_secs_f64(),
    )?;
    #[cfg(feature = "serde_json")]
    stats::save_json_stats(sequence_path, &record)?;

    Ok(record)
}
