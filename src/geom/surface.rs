//! Tensor-product NURBS surfaces over a [`ControlMesh`].
//!
//! The u parameter runs along mesh rows ([`Direction::Row`]) and the v
//! parameter along mesh columns ([`Direction::Col`]):
//!
//! - `mesh.cols() == u_knots.len() - u_order`
//! - `mesh.rows() == v_knots.len() - v_order`
//!
//! Rational meshes are evaluated and refined in homogeneous space, so the
//! same code path serves every [`PointKind`].

use serde::{Deserialize, Serialize};

use super::core::Point3;
use super::knot::{KnotVector, KnotVectorError};
use super::mesh::{ControlMesh, MeshError, PointKind};

/// Parametric direction of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The u parameter, varying along a mesh row.
    Row,
    /// The v parameter, varying along a mesh column.
    Col,
}

impl Direction {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Row => Self::Col,
            Self::Col => Self::Row,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Knots(#[from] KnotVectorError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("{direction:?} order must be >= 1")]
    InvalidOrder { direction: Direction },
    #[error("{direction:?} knot vector must have {expected} knots, got {actual}")]
    KnotCountMismatch {
        direction: Direction,
        expected: usize,
        actual: usize,
    },
    #[error("{direction:?} order {order} exceeds control point count {count}")]
    OrderExceedsControlPoints {
        direction: Direction,
        order: usize,
        count: usize,
    },
    #[error("{direction:?} parametric domain is empty")]
    DegenerateDomain { direction: Direction },
    #[error("point kind {kind:?} is not supported by this operation")]
    UnsupportedPointKind { kind: PointKind },
    #[error("parameter {value} is not finite")]
    InvalidParameter { value: f64 },
    #[error("parameter {value} lies outside the {direction:?} domain")]
    OutsideDomain { direction: Direction, value: f64 },
    #[error("empty parametric interval {lower}..{upper}")]
    EmptyInterval { lower: f64, upper: f64 },
    #[error("rational point has zero weight")]
    ZeroWeight,
}

/// Index `i` of the non-empty span `knots[i] <= u < knots[i + 1]`, clamped to
/// the valid spans `order - 1 ..= count - 1`.
fn find_span(knots: &[f64], order: usize, count: usize, u: f64) -> usize {
    let p = order - 1;
    let n = count - 1;
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// De Boor recursion on the `order` points of span `span`, with the r-th
/// level using parameter `arg(r)`.
///
/// With a constant `arg` this evaluates the curve; with successive new knots
/// it evaluates the blossom, which is how refinement computes new control
/// points. `d` holds `order` points of `coords` values; the result ends up in
/// the last one.
fn de_boor(
    d: &mut [f64],
    coords: usize,
    knots: &[f64],
    order: usize,
    span: usize,
    arg: impl Fn(usize) -> f64,
) {
    for r in 1..order {
        let u = arg(r);
        for j in (r..order).rev() {
            let i = span + 1 - order + j;
            let denom = knots[i + order - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            let (lo, hi) = d.split_at_mut(j * coords);
            let prev = &lo[(j - 1) * coords..];
            for (cur, &p) in hi[..coords].iter_mut().zip(prev) {
                *cur = p * (1.0 - alpha) + *cur * alpha;
            }
        }
    }
}

/// Control points of the curve `(points, knots, order)` re-expressed over
/// `new_knots`, appended to `out`.
fn refine_curve(
    points: &[f64],
    coords: usize,
    knots: &[f64],
    order: usize,
    new_knots: &[f64],
    out: &mut Vec<f64>,
) {
    let count = knots.len() - order;
    let new_count = new_knots.len() - order;
    let mut work = vec![0.0; order * coords];

    for j in 0..new_count {
        let span = find_span(knots, order, count, new_knots[j]);
        work.copy_from_slice(&points[(span + 1 - order) * coords..(span + 1) * coords]);
        de_boor(&mut work, coords, knots, order, span, |r| new_knots[j + r]);
        out.extend_from_slice(&work[(order - 1) * coords..]);
    }
}

/// A NURBS surface: two orders, two knot vectors and a control mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNurbsSurface")]
pub struct NurbsSurface {
    u_order: usize,
    v_order: usize,
    u_knots: KnotVector,
    v_knots: KnotVector,
    mesh: ControlMesh,
    direction: Direction,
}

/// Unchecked serde form of [`NurbsSurface`]; `direction` may be omitted.
#[derive(Deserialize)]
struct RawNurbsSurface {
    u_order: usize,
    v_order: usize,
    u_knots: KnotVector,
    v_knots: KnotVector,
    mesh: ControlMesh,
    direction: Option<Direction>,
}

impl TryFrom<RawNurbsSurface> for NurbsSurface {
    type Error = SurfaceError;

    fn try_from(raw: RawNurbsSurface) -> Result<Self, Self::Error> {
        let surface = Self::new(raw.u_order, raw.v_order, raw.u_knots, raw.v_knots, raw.mesh)?;
        Ok(surface.with_direction(raw.direction.unwrap_or(Direction::Row)))
    }
}

impl NurbsSurface {
    pub fn new(
        u_order: usize,
        v_order: usize,
        u_knots: KnotVector,
        v_knots: KnotVector,
        mesh: ControlMesh,
    ) -> Result<Self, SurfaceError> {
        validate_direction(Direction::Row, u_order, &u_knots, mesh.cols())?;
        validate_direction(Direction::Col, v_order, &v_knots, mesh.rows())?;

        Ok(Self {
            u_order,
            v_order,
            u_knots,
            v_knots,
            mesh,
            direction: Direction::Row,
        })
    }

    /// Same surface tagged with a preferred processing direction.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn u_order(&self) -> usize {
        self.u_order
    }

    #[must_use]
    pub const fn v_order(&self) -> usize {
        self.v_order
    }

    #[must_use]
    pub const fn u_knots(&self) -> &KnotVector {
        &self.u_knots
    }

    #[must_use]
    pub const fn v_knots(&self) -> &KnotVector {
        &self.v_knots
    }

    #[must_use]
    pub const fn mesh(&self) -> &ControlMesh {
        &self.mesh
    }

    #[must_use]
    pub const fn kind(&self) -> PointKind {
        self.mesh.kind()
    }

    #[must_use]
    pub const fn order(&self, direction: Direction) -> usize {
        match direction {
            Direction::Row => self.u_order,
            Direction::Col => self.v_order,
        }
    }

    #[must_use]
    pub const fn knots(&self, direction: Direction) -> &KnotVector {
        match direction {
            Direction::Row => &self.u_knots,
            Direction::Col => &self.v_knots,
        }
    }

    /// Number of control points along `direction`.
    #[must_use]
    pub const fn count(&self, direction: Direction) -> usize {
        match direction {
            Direction::Row => self.mesh.cols(),
            Direction::Col => self.mesh.rows(),
        }
    }

    /// Parametric domain along `direction`.
    #[must_use]
    pub fn domain(&self, direction: Direction) -> (f64, f64) {
        let knots = self.knots(direction).as_slice();
        let order = self.order(direction);
        (knots[order - 1], knots[knots.len() - order])
    }

    /// Extent of the full knot vector (first to last knot) along `direction`.
    #[must_use]
    pub fn knot_extent(&self, direction: Direction) -> (f64, f64) {
        let knots = self.knots(direction).as_slice();
        (knots[0], knots[knots.len() - 1])
    }

    /// Per-coordinate `(min, max)` of the control points.
    ///
    /// By the convex hull property the surface lies inside these bounds.
    #[must_use]
    pub fn control_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.mesh.bounds()
    }

    /// Raw mesh coordinates of the surface at `(u, v)`.
    ///
    /// Parameters are clamped to the domain. Rational surfaces return
    /// homogeneous coordinates (weight last).
    pub fn evaluate(&self, u: f64, v: f64) -> Result<Vec<f64>, SurfaceError> {
        for value in [u, v] {
            if !value.is_finite() {
                return Err(SurfaceError::InvalidParameter { value });
            }
        }

        let (u0, u1) = self.domain(Direction::Row);
        let (v0, v1) = self.domain(Direction::Col);
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let coords = self.mesh.coords();
        let (p, q) = (self.u_order, self.v_order);
        let u_knots = self.u_knots.as_slice();
        let v_knots = self.v_knots.as_slice();
        let span_u = find_span(u_knots, p, self.mesh.cols(), u);
        let span_v = find_span(v_knots, q, self.mesh.rows(), v);

        let mut column = Vec::with_capacity(q * coords);
        let mut d = vec![0.0; p * coords];
        for row in (span_v + 1 - q)..=span_v {
            let points = self.mesh.row(row);
            d.copy_from_slice(&points[(span_u + 1 - p) * coords..(span_u + 1) * coords]);
            de_boor(&mut d, coords, u_knots, p, span_u, |_| u);
            column.extend_from_slice(&d[(p - 1) * coords..]);
        }

        de_boor(&mut column, coords, v_knots, q, span_v, |_| v);
        Ok(column[(q - 1) * coords..].to_vec())
    }

    /// Euclidean point of a 3D surface at `(u, v)`.
    pub fn point_at(&self, u: f64, v: f64) -> Result<Point3, SurfaceError> {
        let kind = self.kind();
        if matches!(kind, PointKind::Projected) || kind.spatial_coords() < 3 {
            return Err(SurfaceError::UnsupportedPointKind { kind });
        }

        let raw = self.evaluate(u, v)?;
        if kind.is_rational() {
            let w = raw[raw.len() - 1];
            if w == 0.0 {
                return Err(SurfaceError::ZeroWeight);
            }
            Ok(Point3::new(raw[0] / w, raw[1] / w, raw[2] / w))
        } else {
            Ok(Point3::new(raw[0], raw[1], raw[2]))
        }
    }

    /// Re-express the surface over `new_knots` along `direction`.
    ///
    /// New control points come from the Oslo recurrence, evaluated as the
    /// blossom of the span containing each new knot. The result is exact when
    /// `new_knots` refines the current vector (knot insertion) and when it
    /// clamps a sub-interval lying inside one span; other vectors yield the
    /// polynomial piece of the span where each new control point starts.
    /// [`NurbsSurface::sub_surface`] cuts out arbitrary intervals exactly.
    pub fn refine(&self, direction: Direction, new_knots: &KnotVector) -> Result<Self, SurfaceError> {
        let order = self.order(direction);
        if new_knots.len() < 2 * order {
            return Err(SurfaceError::OrderExceedsControlPoints {
                direction,
                order,
                count: new_knots.len().saturating_sub(order),
            });
        }

        let coords = self.mesh.coords();
        let knots = self.knots(direction).as_slice();
        let new_count = new_knots.len() - order;
        let (rows, cols) = match direction {
            Direction::Row => (self.mesh.rows(), new_count),
            Direction::Col => (new_count, self.mesh.cols()),
        };

        let mesh = match direction {
            Direction::Row => {
                let mut points = Vec::with_capacity(rows * cols * coords);
                for row in 0..rows {
                    refine_curve(
                        self.mesh.row(row),
                        coords,
                        knots,
                        order,
                        new_knots.as_slice(),
                        &mut points,
                    );
                }
                ControlMesh::new(self.kind(), rows, cols, points)?
            }
            Direction::Col => {
                let mut mesh = ControlMesh::zeroed(self.kind(), rows, cols)?;
                let mut column = Vec::with_capacity(new_count * coords);
                for col in 0..cols {
                    column.clear();
                    refine_curve(
                        &self.mesh.column(col),
                        coords,
                        knots,
                        order,
                        new_knots.as_slice(),
                        &mut column,
                    );
                    for (row, point) in column.chunks_exact(coords).enumerate() {
                        mesh.point_mut(row, col).copy_from_slice(point);
                    }
                }
                mesh
            }
        };

        let (u_knots, v_knots) = match direction {
            Direction::Row => (new_knots.clone(), self.v_knots.clone()),
            Direction::Col => (self.u_knots.clone(), new_knots.clone()),
        };
        Ok(Self::new(self.u_order, self.v_order, u_knots, v_knots, mesh)?
            .with_direction(self.direction))
    }

    /// Split into two surfaces along `direction`.
    ///
    /// The split value is the middle distinct interior knot, or the domain
    /// midpoint when there is none. Raising its multiplicity to the order
    /// separates the two halves exactly.
    pub fn split(&self, direction: Direction) -> Result<(Self, Self), SurfaceError> {
        let order = self.order(direction);
        let kv = self.knots(direction);
        let interior = kv.distinct_interior(order);
        let value = if interior.is_empty() {
            let (lo, hi) = self.domain(direction);
            0.5 * (lo + hi)
        } else {
            interior[interior.len() / 2]
        };

        let refined_kv = kv.with_multiplicity(value, order)?;
        let refined = self.refine(direction, &refined_kv)?;
        let first = first_index(&refined_kv, value)?;
        log::trace!("split {direction:?} at {value} (knot index {first})");

        let left_kv = refined_kv.extract(0, first + order)?;
        let right_kv = refined_kv.extract(first, refined_kv.len())?;
        let count = refined.count(direction);
        let left_mesh = slice_mesh(&refined.mesh, direction, 0, first)?;
        let right_mesh = slice_mesh(&refined.mesh, direction, first, count)?;

        Ok((
            self.rebuild(direction, left_kv, left_mesh)?,
            self.rebuild(direction, right_kv, right_mesh)?,
        ))
    }

    /// Sub-surface covering exactly `[lower, upper]` along `direction`.
    ///
    /// Both bounds are raised to full multiplicity, which cuts the surface at
    /// them without changing its shape, and the spans in between are kept.
    /// Interior knots inside the interval carry over, so the result is a
    /// single clamped span only when the interval lies within one span.
    pub fn sub_surface(
        &self,
        direction: Direction,
        lower: f64,
        upper: f64,
    ) -> Result<Self, SurfaceError> {
        let (lo, hi) = self.domain(direction);
        for value in [lower, upper] {
            if !value.is_finite() {
                return Err(SurfaceError::InvalidParameter { value });
            }
            if value < lo || value > hi {
                return Err(SurfaceError::OutsideDomain { direction, value });
            }
        }
        if lower >= upper {
            return Err(SurfaceError::EmptyInterval { lower, upper });
        }

        let order = self.order(direction);
        let refined_kv = self
            .knots(direction)
            .with_multiplicity(lower, order)?
            .with_multiplicity(upper, order)?;
        let refined = self.refine(direction, &refined_kv)?;
        let start = first_index(&refined_kv, lower)?;
        let end = first_index(&refined_kv, upper)?;

        let kv = refined_kv.extract(start, end + order)?;
        let mesh = slice_mesh(&refined.mesh, direction, start, end)?;
        self.rebuild(direction, kv, mesh)
    }

    /// Same orders and other-direction knots, new `kv` and `mesh`.
    fn rebuild(
        &self,
        direction: Direction,
        kv: KnotVector,
        mesh: ControlMesh,
    ) -> Result<Self, SurfaceError> {
        let (u_knots, v_knots) = match direction {
            Direction::Row => (kv, self.v_knots.clone()),
            Direction::Col => (self.u_knots.clone(), kv),
        };
        Ok(Self::new(self.u_order, self.v_order, u_knots, v_knots, mesh)?
            .with_direction(self.direction))
    }

    /// True when both directions consist of a single clamped span.
    #[must_use]
    pub fn is_bezier(&self) -> bool {
        self.u_knots.is_single_span(self.u_order) && self.v_knots.is_single_span(self.v_order)
    }

    /// Decompose into single-span (Bezier) patches.
    ///
    /// Patches are split at interior knots until none remain; unclamped end
    /// knots are then clamped onto the domain.
    pub fn bezier_patches(&self) -> Result<Vec<Self>, SurfaceError> {
        let mut pending = vec![self.clone()];
        let mut patches = Vec::new();

        while let Some(surface) = pending.pop() {
            let split_dir = [Direction::Row, Direction::Col].into_iter().find(|&dir| {
                !surface
                    .knots(dir)
                    .distinct_interior(surface.order(dir))
                    .is_empty()
            });
            if let Some(dir) = split_dir {
                let (left, right) = surface.split(dir)?;
                pending.push(right);
                pending.push(left);
                continue;
            }

            let mut patch = surface;
            for dir in [Direction::Row, Direction::Col] {
                let order = patch.order(dir);
                if !patch.knots(dir).is_single_span(order) {
                    let (lo, hi) = patch.domain(dir);
                    patch = patch.refine(dir, &KnotVector::clamped(order, lo, hi)?)?;
                }
            }
            patches.push(patch);
        }

        log::trace!("decomposed surface into {} bezier patches", patches.len());
        Ok(patches)
    }
}

fn validate_direction(
    direction: Direction,
    order: usize,
    knots: &KnotVector,
    count: usize,
) -> Result<(), SurfaceError> {
    if order == 0 {
        return Err(SurfaceError::InvalidOrder { direction });
    }
    let expected = count + order;
    if knots.len() != expected {
        return Err(SurfaceError::KnotCountMismatch {
            direction,
            expected,
            actual: knots.len(),
        });
    }
    if count < order {
        return Err(SurfaceError::OrderExceedsControlPoints {
            direction,
            order,
            count,
        });
    }
    let kv = knots.as_slice();
    if kv[order - 1] >= kv[kv.len() - order] {
        return Err(SurfaceError::DegenerateDomain { direction });
    }
    Ok(())
}

/// Index of the first knot equal to `value`.
#[allow(clippy::float_cmp)]
fn first_index(kv: &KnotVector, value: f64) -> Result<usize, SurfaceError> {
    kv.as_slice()
        .iter()
        .position(|&k| k == value)
        .ok_or(SurfaceError::InvalidParameter { value })
}

/// Control points with index `start..end` along `direction`.
fn slice_mesh(
    mesh: &ControlMesh,
    direction: Direction,
    start: usize,
    end: usize,
) -> Result<ControlMesh, MeshError> {
    let coords = mesh.coords();
    match direction {
        Direction::Row => {
            let mut points = Vec::with_capacity(mesh.rows() * (end - start) * coords);
            for row in 0..mesh.rows() {
                points.extend_from_slice(&mesh.row(row)[start * coords..end * coords]);
            }
            ControlMesh::new(mesh.kind(), mesh.rows(), end - start, points)
        }
        Direction::Col => {
            let width = mesh.cols() * coords;
            let points = mesh.as_slice()[start * width..end * width].to_vec();
            ControlMesh::new(mesh.kind(), end - start, mesh.cols(), points)
        }
    }
}
