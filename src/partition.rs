use std::fmt;
use std::ops::Div;

/// Size of a three-dimensional region in (rows, cols, frames) order.
///
/// The same type describes blocks, chunks and kept-sample grids. All
/// dimensions are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape3D {
    pub rows: usize,
    pub cols: usize,
    pub frames: usize,
}

impl Shape3D {
    pub fn new(rows: usize, cols: usize, frames: usize) -> Shape3D {
        assert!(rows > 0 && cols > 0 && frames > 0);
        Shape3D { rows, cols, frames }
    }

    /// Number of samples in a region of this shape.
    #[inline]
    pub fn count(self) -> usize {
        self.rows * self.cols * self.frames
    }

    /// True when every dimension of `self` is a multiple of the
    /// corresponding dimension of `other`.
    #[inline]
    pub fn is_divisible(self, other: Shape3D) -> bool {
        self.rows % other.rows == 0
            && self.cols % other.cols == 0
            && self.frames % other.frames == 0
    }

    /// The shape grown by `n` along every axis.
    #[inline]
    pub fn extended(self, n: usize) -> Shape3D {
        Shape3D::new(self.rows + n, self.cols + n, self.frames + n)
    }
}

impl Div for Shape3D {
    type Output = Shape3D;

    /// Elementwise floor division.
    fn div(self, rhs: Shape3D) -> Shape3D {
        Shape3D::new(self.rows / rhs.rows, self.cols / rhs.cols, self.frames / rhs.frames)
    }
}

impl fmt::Display for Shape3D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.rows, self.cols, self.frames)
    }
}

/// Position of a block within a part, in luma samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOffset {
    pub row: usize,
    pub col: usize,
}

/// One sampling density specialized to a block shape.
///
/// `idx` is the position of the (y_chunk, uv_chunk) pair in the configured
/// chunk list. It is what gets serialized into the metadata stream, so it is
/// stable across blocks even when edge clipping makes some chunks
/// inadmissible.
#[derive(Debug, Clone, Copy)]
pub struct SamplingMode {
    pub idx: usize,
    pub y_chunk: Shape3D,
    pub y_points: Shape3D,
    pub uv_chunk: Shape3D,
    pub uv_points: Shape3D,
    pub block: Shape3D,
    /// Estimated bits per pixel: kept bytes against a 24-bit-per-pixel
    /// baseline over the three full-resolution planes.
    pub rate: f64,
}

impl SamplingMode {
    pub fn new(idx: usize, y_chunk: Shape3D, uv_chunk: Shape3D, block: Shape3D) -> SamplingMode {
        let y_points = block / y_chunk;
        let uv_points = block / uv_chunk;
        let kept = y_points.count() + 2 * uv_points.count();
        let rate = kept as f64 / (3 * block.count()) as f64 * 24.0;

        SamplingMode { idx, y_chunk, y_points, uv_chunk, uv_points, block, rate }
    }
}

#[inline]
fn log2(n: usize) -> usize {
    debug_assert!(n.is_power_of_two());
    n.trailing_zeros() as usize
}

/// Enumerate the admissible (y_chunk, uv_chunk) pairs for a base block.
///
/// Iteration order is rows outer, then cols, then frames. The order fixes
/// the mode index serialized in metadata, so the decoder reproduces it
/// identically from the same base block.
pub fn generate_chunks(block: Shape3D) -> Vec<(Shape3D, Shape3D)> {
    let mut chunks = Vec::new();

    for r in 0..log2(block.rows) {
        for c in 0..log2(block.cols) {
            if block.frames == 1 {
                chunks.push((
                    Shape3D::new(1 << r, 1 << c, 1),
                    Shape3D::new(2 << r, 2 << c, 1),
                ));
            } else {
                for f in 0..log2(block.frames) {
                    chunks.push((
                        Shape3D::new(1 << r, 1 << c, 1 << f),
                        Shape3D::new(2 << r, 2 << c, 2 << f),
                    ));
                }
            }
        }
    }

    chunks
}

/// Specialize every chunk pair admissible for `block`, preserving indices.
pub fn generate_modes(chunks: &[(Shape3D, Shape3D)], block: Shape3D) -> Vec<SamplingMode> {
    chunks
        .iter()
        .enumerate()
        .filter(|(_, &(_, uv_chunk))| block.is_divisible(uv_chunk))
        .map(|(idx, &(y_chunk, uv_chunk))| SamplingMode::new(idx, y_chunk, uv_chunk, block))
        .collect()
}

/// Tile a part of `rows` x `cols` luma samples into blocks in raster order.
///
/// Blocks at the bottom and right frame edges are clipped; the frame depth
/// is always consumed whole.
pub fn tile_blocks(rows: usize, cols: usize, block: Shape3D) -> Vec<(BlockOffset, Shape3D)> {
    let mut blocks = Vec::new();

    for r in (0..rows).step_by(block.rows) {
        for c in (0..cols).step_by(block.cols) {
            let clipped = Shape3D::new(
                block.rows.min(rows - r),
                block.cols.min(cols - c),
                block.frames,
            );
            blocks.push((BlockOffset { row: r, col: c }, clipped));
        }
    }

    blocks
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chunk_enumeration_order() {
        let chunks = generate_chunks(Shape3D::new(16, 16, 1));
        assert_eq!(chunks.len(), 16);
        // r outer, c inner; frames fixed to 1
        assert_eq!(chunks[0], (Shape3D::new(1, 1, 1), Shape3D::new(2, 2, 1)));
        assert_eq!(chunks[1], (Shape3D::new(1, 2, 1), Shape3D::new(2, 4, 1)));
        assert_eq!(chunks[4], (Shape3D::new(2, 1, 1), Shape3D::new(4, 2, 1)));
        assert_eq!(chunks[15], (Shape3D::new(8, 8, 1), Shape3D::new(16, 16, 1)));
    }

    #[test]
    fn chunk_enumeration_with_frames() {
        let chunks = generate_chunks(Shape3D::new(16, 16, 16));
        assert_eq!(chunks.len(), 4 * 4 * 4);
        assert_eq!(chunks[0], (Shape3D::new(1, 1, 1), Shape3D::new(2, 2, 2)));
        assert_eq!(chunks[1], (Shape3D::new(1, 1, 2), Shape3D::new(2, 2, 4)));
        assert_eq!(chunks[4], (Shape3D::new(1, 2, 1), Shape3D::new(2, 4, 2)));
    }

    #[test]
    fn mode_index_fits_a_byte_for_largest_block() {
        let chunks = generate_chunks(Shape3D::new(128, 128, 16));
        assert_eq!(chunks.len(), 7 * 7 * 4);
        assert!(chunks.len() < 256);
    }

    #[test]
    fn modes_honor_chunk_invariants() {
        let block = Shape3D::new(16, 16, 4);
        let chunks = generate_chunks(block);
        for mode in generate_modes(&chunks, block) {
            assert_eq!(mode.uv_chunk.rows, 2 * mode.y_chunk.rows);
            assert_eq!(mode.uv_chunk.cols, 2 * mode.y_chunk.cols);
            assert_eq!(mode.uv_chunk.frames, 2 * mode.y_chunk.frames);
            assert!(mode.block.is_divisible(mode.uv_chunk));
        }
    }

    #[test]
    fn edge_block_modes_preserve_indices() {
        let base = Shape3D::new(16, 16, 4);
        let chunks = generate_chunks(base);
        let full = generate_modes(&chunks, base);
        // every chunk is admissible for the base block
        assert_eq!(full.len(), chunks.len());

        let edge = generate_modes(&chunks, Shape3D::new(8, 16, 4));
        assert!(edge.len() < full.len());
        for mode in &edge {
            assert_eq!(chunks[mode.idx].0, mode.y_chunk);
            assert!(mode.block.is_divisible(mode.uv_chunk));
        }
    }

    #[test]
    fn densest_mode_rate_is_half_the_baseline() {
        let block = Shape3D::new(16, 16, 16);
        let mode = SamplingMode::new(0, Shape3D::new(1, 1, 1), Shape3D::new(2, 2, 2), block);
        // full luma plus quarter-density chroma: 1.5 of 3 bytes per pixel
        assert!((mode.rate - 12.0).abs() < 1e-12);
    }

    #[test]
    fn tiling_clips_bottom_right_edges() {
        let blocks = tile_blocks(40, 40, Shape3D::new(16, 16, 2));
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[0], (BlockOffset { row: 0, col: 0 }, Shape3D::new(16, 16, 2)));
        assert_eq!(blocks[2], (BlockOffset { row: 0, col: 32 }, Shape3D::new(16, 8, 2)));
        assert_eq!(blocks[8], (BlockOffset { row: 32, col: 32 }, Shape3D::new(8, 8, 2)));
    }
}
