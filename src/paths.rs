//! On-disk conventions. A sequence lives in a directory named `H_W` and all
//! derived files share its base name with a different extension.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CodecError, Result};

/// (rows, cols) of a sequence, parsed from its parent directory name `H_W`.
pub fn video_shape(path: &Path) -> Result<(usize, usize)> {
    let dir = path
        .parent()
        .and_then(|d| d.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| bad_dir(path))?;

    let mut parts = dir.splitn(2, '_');
    let rows = parts.next().and_then(|s| s.parse().ok());
    let cols = parts.next().and_then(|s| s.parse().ok());

    match (rows, cols) {
        (Some(rows), Some(cols)) if rows > 0 && cols > 0 => Ok((rows, cols)),
        _ => Err(bad_dir(path)),
    }
}

fn bad_dir(path: &Path) -> CodecError {
    CodecError::ShapeMismatch(format!(
        "cannot derive frame shape: parent directory of {} is not named H_W",
        path.display()
    ))
}

/// Number of whole frames in a sequence file: size / (1.5 * rows * cols).
pub fn frames_count(path: &Path) -> Result<usize> {
    let (rows, cols) = video_shape(path)?;
    let size = fs::metadata(path)?.len();
    Ok((size * 2 / (rows as u64 * cols as u64 * 3)) as usize)
}

fn with_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

pub fn code_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "code")
}

pub fn metadata_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "meta")
}

pub fn decoded_sequence_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "yuv_decoded")
}

pub fn stats_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "stats")
}

pub fn error_map_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "error_map")
}

pub fn intensity_map_path(sequence_path: &Path) -> PathBuf {
    with_extension(sequence_path, "intensity_map")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shape_comes_from_the_parent_directory() {
        let (rows, cols) = video_shape(Path::new("/seq/288_352/foreman.yuv")).unwrap();
        assert_eq!((rows, cols), (288, 352));

        assert!(video_shape(Path::new("/seq/misc/foreman.yuv")).is_err());
        assert!(video_shape(Path::new("/seq/288x352/foreman.yuv")).is_err());
    }

    #[test]
    fn derived_files_share_the_base_name() {
        let src = Path::new("/seq/144_176/akiyo.yuv");
        assert_eq!(code_path(src), Path::new("/seq/144_176/akiyo.code"));
        assert_eq!(metadata_path(src), Path::new("/seq/144_176/akiyo.meta"));
        assert_eq!(decoded_sequence_path(src), Path::new("/seq/144_176/akiyo.yuv_decoded"));
    }
}
