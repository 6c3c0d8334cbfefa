use thiserror::Error;

/// All error kinds observable by callers of the codec.
///
/// Errors are fatal to the current encode or decode call and are returned
/// immediately; no retry is attempted and partial output files are left on
/// disk. Shape and divisibility violations inside the numeric kernels are
/// programming errors and panic instead.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Block dimensions not powers of two, target bpp out of range, or an
    /// unsupported (encoding, decoding) pairing.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Open/read/write failure on any of the codec streams.
    #[error("I/O failure on a codec stream")]
    Io(#[from] std::io::Error),
    /// The metadata or code stream ended in the middle of a block.
    #[error("code or metadata stream ended mid-block")]
    TruncatedInput,
    /// On-disk data inconsistent with the directory-derived frame shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A metadata byte references a mode the current configuration does not
    /// define. The caller supplied the wrong `Config` for the file.
    #[error("metadata references mode {0} which this configuration does not define")]
    InvalidModeIndex(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;
