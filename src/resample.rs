//! Sampling and reconstruction kernels.
//!
//! Every kernel operates on byte volumes in row-major (rows, cols, frames)
//! order and is deterministic. Shape preconditions are programming errors
//! and panic; kernels never fail at runtime.

use crate::partition::Shape3D;
use crate::plane::Volume;

/// Keep the sub-grid at indices 0, chunk, 2*chunk, ... along each axis.
///
/// The output shape is the ceiling of `a.shape / chunk` per axis.
pub fn pick_first(a: &Volume, chunk: Shape3D) -> Volume {
    let shape = a.shape();
    let out_shape = Shape3D::new(
        (shape.rows + chunk.rows - 1) / chunk.rows,
        (shape.cols + chunk.cols - 1) / chunk.cols,
        (shape.frames + chunk.frames - 1) / chunk.frames,
    );

    let mut out = Volume::new(out_shape);
    for r in 0..out_shape.rows {
        for c in 0..out_shape.cols {
            for f in 0..out_shape.frames {
                out[(r, c, f)] = a[(r * chunk.rows, c * chunk.cols, f * chunk.frames)];
            }
        }
    }
    out
}

/// Keep the sub-grid at indices chunk-1, 2*chunk-1, ... along each axis.
///
/// `a.shape` must be divisible by `chunk`.
pub fn pick_last(a: &Volume, chunk: Shape3D) -> Volume {
    let shape = a.shape();
    assert!(shape.is_divisible(chunk));
    let out_shape = shape / chunk;

    let mut out = Volume::new(out_shape);
    for r in 0..out_shape.rows {
        for c in 0..out_shape.cols {
            for f in 0..out_shape.frames {
                out[(r, c, f)] = a[(
                    (r + 1) * chunk.rows - 1,
                    (c + 1) * chunk.cols - 1,
                    (f + 1) * chunk.frames - 1,
                )];
            }
        }
    }
    out
}

/// Nearest-neighbor upsampling by integer factors along each axis.
pub fn repeat_3d(a: &Volume, zoom: Shape3D) -> Volume {
    let shape = a.shape();
    let out_shape = Shape3D::new(
        shape.rows * zoom.rows,
        shape.cols * zoom.cols,
        shape.frames * zoom.frames,
    );

    let mut out = Volume::new(out_shape);
    for r in 0..out_shape.rows {
        for c in 0..out_shape.cols {
            for f in 0..out_shape.frames {
                out[(r, c, f)] = a[(r / zoom.rows, c / zoom.cols, f / zoom.frames)];
            }
        }
    }
    out
}

/// Mean of each disjoint `chunk`-shaped sub-block, rounded down to a byte.
///
/// `a.shape` must equal `chunk * count` componentwise.
pub fn averages_3d(a: &Volume, chunk: Shape3D, count: Shape3D) -> Volume {
    let shape = a.shape();
    assert_eq!(shape.rows, chunk.rows * count.rows);
    assert_eq!(shape.cols, chunk.cols * count.cols);
    assert_eq!(shape.frames, chunk.frames * count.frames);

    let mut out = Volume::new(count);
    for r in 0..count.rows {
        for c in 0..count.cols {
            for f in 0..count.frames {
                let mut sum: u64 = 0;
                for i in 0..chunk.rows {
                    for j in 0..chunk.cols {
                        for k in 0..chunk.frames {
                            sum += u64::from(a[(
                                r * chunk.rows + i,
                                c * chunk.cols + j,
                                f * chunk.frames + k,
                            )]);
                        }
                    }
                }
                out[(r, c, f)] = (sum / chunk.count() as u64) as u8;
            }
        }
    }
    out
}

// (lower index, upper index, fractional weight of the upper) per output
// position along one axis, with clamp-to-edge
fn axis_weights(coords: impl Iterator<Item = f64>, in_dim: usize) -> Vec<(usize, usize, f64)> {
    let last = (in_dim - 1) as f64;
    coords
        .map(|x| {
            let x = x.max(0.0).min(last);
            let lo = x.floor() as usize;
            let hi = (lo + 1).min(in_dim - 1);
            (lo, hi, x - lo as f64)
        })
        .collect()
}

fn trilinear(a: &Volume, rows: &[(usize, usize, f64)], cols: &[(usize, usize, f64)], frames: &[(usize, usize, f64)]) -> Volume {
    let out_shape = Shape3D::new(rows.len(), cols.len(), frames.len());
    let mut out = Volume::new(out_shape);

    for (r, &(r0, r1, rw)) in rows.iter().enumerate() {
        for (c, &(c0, c1, cw)) in cols.iter().enumerate() {
            for (f, &(f0, f1, fw)) in frames.iter().enumerate() {
                let c00 = f64::from(a[(r0, c0, f0)]) * (1.0 - fw) + f64::from(a[(r0, c0, f1)]) * fw;
                let c01 = f64::from(a[(r0, c1, f0)]) * (1.0 - fw) + f64::from(a[(r0, c1, f1)]) * fw;
                let c10 = f64::from(a[(r1, c0, f0)]) * (1.0 - fw) + f64::from(a[(r1, c0, f1)]) * fw;
                let c11 = f64::from(a[(r1, c1, f0)]) * (1.0 - fw) + f64::from(a[(r1, c1, f1)]) * fw;

                let top = c00 * (1.0 - cw) + c01 * cw;
                let bottom = c10 * (1.0 - cw) + c11 * cw;
                let value = top * (1.0 - rw) + bottom * rw;

                out[(r, c, f)] = value.round().max(0.0).min(255.0) as u8;
            }
        }
    }
    out
}

/// Trilinear resampling to an exact target shape.
///
/// Output index `o` maps linearly onto the endpoint-inclusive input range:
/// `o * (in_dim - 1) / (target_dim - 1)`, so the first and last input
/// samples land exactly on the first and last output samples.
pub fn zoom_3d(a: &Volume, target: Shape3D) -> Volume {
    let shape = a.shape();
    let scale = |in_dim: usize, out_dim: usize| {
        if out_dim == 1 { 0.0 } else { (in_dim - 1) as f64 / (out_dim - 1) as f64 }
    };

    let sr = scale(shape.rows, target.rows);
    let sc = scale(shape.cols, target.cols);
    let sf = scale(shape.frames, target.frames);

    let rows = axis_weights((0..target.rows).map(|o| o as f64 * sr), shape.rows);
    let cols = axis_weights((0..target.cols).map(|o| o as f64 * sc), shape.cols);
    let frames = axis_weights((0..target.frames).map(|o| o as f64 * sf), shape.frames);

    trilinear(a, &rows, &cols, &frames)
}

/// Trilinear reconstruction of a full block from its kept-sample grid `a`,
/// treating each kept sample as sitting at the center of its chunk.
///
/// Output pixel `i` samples the grid at `(0.5 + i) / chunk - 0.5`, clamped
/// to the grid (nearest-edge behavior outside it).
pub fn interpolate_centers(a: &Volume, chunk: Shape3D, target: Shape3D) -> Volume {
    let shape = a.shape();
    let centers = |dim: usize, step: usize| {
        (0..dim).map(move |i| (0.5 + i as f64) / step as f64 - 0.5)
    };

    let rows = axis_weights(centers(target.rows, chunk.rows), shape.rows);
    let cols = axis_weights(centers(target.cols, chunk.cols), shape.cols);
    let frames = axis_weights(centers(target.frames, chunk.frames), shape.frames);

    trilinear(a, &rows, &cols, &frames)
}
