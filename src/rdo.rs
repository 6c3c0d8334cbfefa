//! Rate-distortion optimization: per-block convex hulls in the (rate,
//! distortion) plane and the Lagrangian bisection that drives the mean rate
//! toward the target bits per pixel.

use crate::plane::Volume;

/// Bits-per-pixel ceiling of the 24-bit baseline.
pub const RATE_MAX: f64 = 24.0;
/// Worst possible mean squared error between two byte planes.
pub const DISTORTION_MAX: f64 = 255.0 * 255.0;

const LAMBDA_LO: f64 = 0.01;
const LAMBDA_HI: f64 = 1000.0;
const LAMBDA_EPS: f64 = 0.01;

/// One RD candidate of a block. `mode_idx` is negative only for the
/// synthetic hull sentinels, which never survive hull construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RdPoint {
    pub mode_idx: isize,
    pub rate: f64,
    pub distortion: f64,
}

fn sse(a: &Volume, b: &Volume) -> u64 {
    assert_eq!(a.shape(), b.shape());
    a.data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| {
            let d = i64::from(x) - i64::from(y);
            (d * d) as u64
        })
        .sum()
}

/// Mean squared error over the three planes merged, i.e. Y, U and V
/// concatenated along the cols axis before averaging.
pub fn merged_mse(source: [&Volume; 3], decoded: [&Volume; 3]) -> f64 {
    let mut total = 0u64;
    let mut count = 0usize;
    for (s, d) in source.iter().zip(decoded.iter()) {
        total += sse(s, d);
        count += s.shape().count();
    }
    total as f64 / count as f64
}

fn cross(o: &RdPoint, a: &RdPoint, b: &RdPoint) -> f64 {
    (a.rate - o.rate) * (b.distortion - o.distortion)
        - (a.distortion - o.distortion) * (b.rate - o.rate)
}

// Andrew's monotone chain; returns hull vertices only, collinear boundary
// points excluded, matching what a qhull vertex list would contain.
fn hull_vertices(mut points: Vec<RdPoint>) -> Vec<RdPoint> {
    points.sort_by(|a, b| {
        a.rate
            .partial_cmp(&b.rate)
            .unwrap()
            .then(a.distortion.partial_cmp(&b.distortion).unwrap())
            // candidates win over sentinels at identical coordinates,
            // lower mode index wins among candidates
            .then((a.mode_idx < 0).cmp(&(b.mode_idx < 0)))
            .then(a.mode_idx.cmp(&b.mode_idx))
    });
    points.dedup_by(|a, b| a.rate == b.rate && a.distortion == b.distortion);

    if points.len() < 3 {
        return points;
    }

    let mut lower: Vec<RdPoint> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], &p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<RdPoint> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], &p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Lower-left convex hull of a block's RD candidates.
///
/// Three sentinel points with `mode_idx = -1` close the hull over the full
/// admissible range, so that the surviving vertices are exactly the
/// lower-left staircase between the cheapest and the most faithful
/// candidate. Sentinels are filtered back out of the result.
pub fn convex_hull(candidates: Vec<RdPoint>) -> Vec<RdPoint> {
    assert!(!candidates.is_empty());

    let r_min = candidates.iter().map(|p| p.rate).fold(f64::INFINITY, f64::min);
    let d_min = candidates.iter().map(|p| p.distortion).fold(f64::INFINITY, f64::min);

    let mut points = candidates;
    points.push(RdPoint { mode_idx: -1, rate: r_min, distortion: DISTORTION_MAX });
    points.push(RdPoint { mode_idx: -1, rate: RATE_MAX, distortion: DISTORTION_MAX });
    points.push(RdPoint { mode_idx: -1, rate: RATE_MAX, distortion: d_min });

    hull_vertices(points)
        .into_iter()
        .filter(|p| p.mode_idx >= 0)
        .collect()
}

// J = D + lambda * R; ties go to the lower rate, then the lower mode index.
fn choose_best(hull: &[RdPoint], lambda: f64) -> RdPoint {
    let mut best = hull[0];
    let mut best_cost = best.distortion + lambda * best.rate;

    for &p in &hull[1..] {
        let cost = p.distortion + lambda * p.rate;
        let better = cost < best_cost
            || (cost == best_cost
                && (p.rate < best.rate || (p.rate == best.rate && p.mode_idx < best.mode_idx)));
        if better {
            best = p;
            best_cost = cost;
        }
    }
    best
}

fn choose_all(hulls: &[Vec<RdPoint>], lambda: f64) -> (Vec<RdPoint>, f64) {
    let chosen: Vec<RdPoint> = hulls.iter().map(|hull| choose_best(hull, lambda)).collect();
    let mean_rate = chosen.iter().map(|p| p.rate).sum::<f64>() / chosen.len() as f64;
    (chosen, mean_rate)
}

/// Bisection on the Lagrange multiplier, returning one mode index per block.
///
/// The mean rate is non-increasing in lambda over the retained hull
/// vertices; the search keeps the choices of the last lambda whose mean rate
/// met the target. If no lambda in the bracket meets it, the cheapest-biased
/// end of the bracket is used so the emitted streams stay structurally
/// valid.
pub fn bisection(hulls: &[Vec<RdPoint>], target_bpp: f64) -> Vec<usize> {
    let mut lambda_a = LAMBDA_LO;
    let mut lambda_b = LAMBDA_HI;
    let mut best: Option<Vec<RdPoint>> = None;

    while lambda_b - lambda_a > LAMBDA_EPS {
        let lambda = (lambda_a + lambda_b) / 2.0;
        let (chosen, bpp) = choose_all(hulls, lambda);

        if bpp > target_bpp {
            lambda_a = lambda;
        } else {
            best = Some(chosen);
            lambda_b = lambda;
        }
    }

    let chosen = best.unwrap_or_else(|| choose_all(hulls, lambda_b).0);
    chosen.into_iter().map(|p| p.mode_idx as usize).collect()
}
