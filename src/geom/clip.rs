//! Convex-hull clipping of projected surfaces.
//!
//! A projected surface (see [`project`](super::project)) has two coordinates,
//! the signed distances to two planes through the ray. Its control points
//! bound the surface, so the parameter range along one direction in which
//! the control polygon can reach the origin bounds where the ray may hit.
//!
//! The control points are measured against a line through the origin that is
//! perpendicular to the summed corner diagonals of the mesh. Along the clipped
//! direction this gives one `(min, max)` envelope sample per control point,
//! and the zero crossings of the envelope bound the candidate interval.

use serde::{Deserialize, Serialize};

use super::mesh::PointKind;
use super::surface::{Direction, NurbsSurface, SurfaceError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClipError {
    #[error("clipping needs a projected surface, got {kind:?}")]
    NotProjected { kind: PointKind },
    #[error("clipping along {direction:?} needs at least 2 control points, got {count}")]
    TooFewSamples { direction: Direction, count: usize },
    #[error("corner diagonals of the control mesh cancel out")]
    DegenerateGeometry,
    #[error("invalid parametric interval {lower}..{upper}")]
    InvalidInterval { lower: f64, upper: f64 },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Lower and upper bound of a normalized parametric sub-interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamInterval {
    pub min: f64,
    pub max: f64,
}

impl ParamInterval {
    /// The whole normalized range `[0, 1]`.
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Map onto `[lower, upper]` with `(1 - s) * lower + s * upper`.
    #[must_use]
    pub fn map_to(self, lower: f64, upper: f64) -> (f64, f64) {
        (
            (1.0 - self.min) * lower + self.min * upper,
            (1.0 - self.max) * lower + self.max * upper,
        )
    }
}

/// Range of signed distances spanned by the control points at one index
/// along the clipped direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSample {
    /// Normalized position `i / (n - 1)` of the sample.
    pub param: f64,
    pub min: f64,
    pub max: f64,
}

/// Convex envelope of a projected control mesh along one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexEnvelope {
    samples: Vec<EnvelopeSample>,
}

const NO_MIN: f64 = 1.0e8;
const NO_MAX: f64 = -1.0e8;

fn sign(value: f64) -> i8 {
    if value < 0.0 { -1 } else { 1 }
}

/// Parameter at which the line through `(x0, y0)` and `(x1, y1)` crosses zero.
#[allow(clippy::float_cmp)]
fn find_zero(x0: f64, x1: f64, y0: f64, y1: f64) -> Option<f64> {
    if y1 == y0 {
        return None;
    }
    Some(x0 - y0 * (x1 - x0) / (y1 - y0))
}

impl ConvexEnvelope {
    pub fn build(surface: &NurbsSurface, direction: Direction) -> Result<Self, ClipError> {
        let kind = surface.kind();
        if kind != PointKind::Projected {
            return Err(ClipError::NotProjected { kind });
        }

        let mesh = surface.mesh();
        let count = surface.count(direction);
        if count < 2 {
            return Err(ClipError::TooFewSamples { direction, count });
        }

        let [p1, p2, p3, p4] = mesh.corners();
        let (v1, v2) = match direction {
            Direction::Row => (diff(p1, p3), diff(p2, p4)),
            Direction::Col => (diff(p1, p2), diff(p3, p4)),
        };
        let v3 = [v1[0] + v2[0], v1[1] + v2[1]];
        let norm = v3[0].hypot(v3[1]);
        if norm == 0.0 || !norm.is_finite() {
            return Err(ClipError::DegenerateGeometry);
        }
        let a = v3[1] / norm;
        let b = -v3[0] / norm;

        let last = (count - 1) as f64;
        let mut samples: Vec<EnvelopeSample> = (0..count)
            .map(|i| EnvelopeSample {
                param: i as f64 / last,
                min: NO_MIN,
                max: NO_MAX,
            })
            .collect();

        for row in 0..mesh.rows() {
            for col in 0..mesh.cols() {
                let point = mesh.point(row, col);
                let value = -(point[0] * a + point[1] * b);
                let sample = match direction {
                    Direction::Row => &mut samples[col],
                    Direction::Col => &mut samples[row],
                };
                sample.min = sample.min.min(value);
                sample.max = sample.max.max(value);
            }
        }

        Ok(Self { samples })
    }

    #[must_use]
    pub fn samples(&self) -> &[EnvelopeSample] {
        &self.samples
    }

    /// Normalized interval that may contain a zero of the envelope.
    ///
    /// Crossings are padded by one percent of the unit range. Returns `None`
    /// when no zero can lie in `[0, 1]`.
    #[must_use]
    pub fn clip(&self) -> Option<ParamInterval> {
        let mut min = NO_MIN;
        let mut max = NO_MAX;

        for (k, lhs) in self.samples.iter().enumerate() {
            for rhs in &self.samples[k + 1..] {
                let crossings = [
                    find_zero(lhs.param, rhs.param, lhs.max, rhs.max),
                    find_zero(lhs.param, rhs.param, lhs.min, rhs.min),
                ];
                for d in crossings.into_iter().flatten() {
                    if d <= min {
                        min = d * 0.99;
                    }
                    if d >= max {
                        max = d * 0.99 + 0.01;
                    }
                }
            }
        }

        if min <= 0.0 {
            min = 0.0;
        }
        if max >= 1.0 {
            max = 1.0;
        }

        let first = self.samples.first()?;
        let last = self.samples.last()?;
        if sign(first.min) != sign(first.max) {
            min = 0.0;
        }
        if sign(last.min) != sign(last.max) {
            max = 1.0;
        }

        if min > max || max < 0.0 || min > 1.0 {
            return None;
        }
        Some(ParamInterval::new(min, max))
    }
}

fn diff(a: &[f64], b: &[f64]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

/// Parametric sub-interval along `direction` that may contain the ray hit.
///
/// `Ok(None)` means the projected control hull cannot reach the origin, so
/// the surface is missed.
pub fn clip_direction(
    surface: &NurbsSurface,
    direction: Direction,
) -> Result<Option<ParamInterval>, ClipError> {
    let envelope = ConvexEnvelope::build(surface, direction)?;
    Ok(envelope.clip())
}

/// [`clip_direction`] with cancelling diagonals read as "cannot narrow".
///
/// A degenerate dividing line keeps the whole range `[0, 1]`, which makes the
/// intersection driver split the patch instead.
pub fn candidate_interval(
    surface: &NurbsSurface,
    direction: Direction,
) -> Result<Option<ParamInterval>, ClipError> {
    match clip_direction(surface, direction) {
        Err(ClipError::DegenerateGeometry) => {
            log::trace!("degenerate {direction:?} clip, keeping the full range");
            Ok(Some(ParamInterval::UNIT))
        }
        other => other,
    }
}

/// Sub-surface covering exactly `[lower, upper]` along `direction`.
///
/// On a Bezier patch the result is re-parameterized onto the clamped knot
/// vector over the interval; interior knots inside the interval are kept.
pub fn extract_region(
    surface: &NurbsSurface,
    direction: Direction,
    lower: f64,
    upper: f64,
) -> Result<NurbsSurface, ClipError> {
    let (lo, hi) = surface.domain(direction);
    let inside = |value: f64| value.is_finite() && lo <= value && value <= hi;
    if !inside(lower) || !inside(upper) || lower >= upper {
        return Err(ClipError::InvalidInterval { lower, upper });
    }

    log::debug!("extracting {direction:?} region {lower}..{upper}");
    Ok(surface.sub_surface(direction, lower, upper)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::knot::KnotVector;
    use crate::geom::mesh::ControlMesh;

    fn projected(rows: usize, cols: usize, points: Vec<f64>) -> NurbsSurface {
        let mesh = ControlMesh::new(PointKind::Projected, rows, cols, points).unwrap();
        let u = KnotVector::clamped(cols, 0.0, 1.0).unwrap();
        let v = KnotVector::clamped(rows, 0.0, 1.0).unwrap();
        NurbsSurface::new(cols, rows, u, v, mesh).unwrap()
    }

    #[test]
    fn find_zero_skips_level_pairs() {
        assert_eq!(find_zero(0.0, 1.0, -1.0, 1.0), Some(0.5));
        assert_eq!(find_zero(0.0, 1.0, 2.0, 2.0), None);
    }

    #[test]
    fn envelope_has_one_sample_per_column_for_rows() {
        let surface = projected(
            2,
            3,
            vec![
                -0.5, 0.5, -0.5, 0.0, -0.5, -0.5, //
                0.5, 0.5, 0.5, 0.0, 0.5, -0.5,
            ],
        );
        let envelope = ConvexEnvelope::build(&surface, Direction::Row).unwrap();
        let params: Vec<f64> = envelope.samples().iter().map(|s| s.param).collect();
        assert_eq!(params, vec![0.0, 0.5, 1.0]);

        let envelope = ConvexEnvelope::build(&surface, Direction::Col).unwrap();
        assert_eq!(envelope.samples().len(), 2);
    }

    #[test]
    fn sign_disagreement_at_both_ends_keeps_full_range() {
        let surface = projected(
            2,
            2,
            vec![
                -0.5, -0.5, 0.5, -0.5, //
                0.5, 0.5, -0.5, 0.5,
            ],
        );
        let interval = clip_direction(&surface, Direction::Row).unwrap();
        assert_eq!(interval, Some(ParamInterval::UNIT));
    }

    #[test]
    fn cancelling_diagonals_are_degenerate() {
        let surface = projected(2, 2, vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            clip_direction(&surface, Direction::Row),
            Err(ClipError::DegenerateGeometry)
        );
    }

    #[test]
    fn extract_region_rejects_empty_interval() {
        let surface = projected(2, 2, vec![0.0; 8]);
        assert!(matches!(
            extract_region(&surface, Direction::Col, 0.5, 0.5),
            Err(ClipError::InvalidInterval { .. })
        ));
    }
}
