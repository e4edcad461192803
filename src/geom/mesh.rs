//! Control meshes: a row-major grid of control points with a tagged point kind.
//!
//! A mesh row is a run of `cols` points along the surface's u direction; a
//! column is a run of `rows` points along v. Points are stored flat, each
//! taking `kind.coords()` consecutive values.

use serde::{Deserialize, Serialize};

use super::core::Point3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("control mesh must have at least one row and one column, got {rows}x{cols}")]
    EmptyMesh { rows: usize, cols: usize },
    #[error("control mesh expects {expected} coordinates ({rows}x{cols} points), got {actual}")]
    PointCountMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{weights} weights given for {points} points")]
    WeightCountMismatch { points: usize, weights: usize },
    #[error("point kind {kind:?} has no coordinates")]
    InvalidPointKind { kind: PointKind },
    #[error("control points must be finite")]
    NonFinitePoint,
    #[error("failed to allocate storage for {requested} coordinates")]
    OutOfMemory { requested: usize },
}

/// What the coordinates of a control point mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointKind {
    /// `n` euclidean coordinates.
    Cartesian(usize),
    /// `n` homogeneous coordinates; the last one is the weight and the others
    /// are stored already multiplied by it.
    Rational(usize),
    /// Signed distances to a pair of clipping planes (2 coordinates).
    Projected,
}

impl PointKind {
    /// Euclidean XYZ.
    pub const XYZ: Self = Self::Cartesian(3);
    /// Homogeneous XYZW.
    pub const XYZW: Self = Self::Rational(4);

    /// Number of stored values per control point.
    #[must_use]
    pub const fn coords(self) -> usize {
        match self {
            Self::Cartesian(n) | Self::Rational(n) => n,
            Self::Projected => 2,
        }
    }

    #[must_use]
    pub const fn is_rational(self) -> bool {
        matches!(self, Self::Rational(_))
    }

    /// Number of coordinates that carry position, excluding any weight.
    #[must_use]
    pub const fn spatial_coords(self) -> usize {
        match self {
            Self::Cartesian(n) => n,
            Self::Rational(n) => n.saturating_sub(1),
            Self::Projected => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlMesh")]
pub struct ControlMesh {
    kind: PointKind,
    rows: usize,
    cols: usize,
    points: Vec<f64>,
}

/// Unchecked serde form of [`ControlMesh`].
#[derive(Deserialize)]
struct RawControlMesh {
    kind: PointKind,
    rows: usize,
    cols: usize,
    points: Vec<f64>,
}

impl TryFrom<RawControlMesh> for ControlMesh {
    type Error = MeshError;

    fn try_from(raw: RawControlMesh) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.rows, raw.cols, raw.points)
    }
}

impl ControlMesh {
    pub fn new(
        kind: PointKind,
        rows: usize,
        cols: usize,
        points: Vec<f64>,
    ) -> Result<Self, MeshError> {
        if kind.coords() == 0 || (kind.is_rational() && kind.coords() < 2) {
            return Err(MeshError::InvalidPointKind { kind });
        }
        if rows == 0 || cols == 0 {
            return Err(MeshError::EmptyMesh { rows, cols });
        }
        let expected = rows * cols * kind.coords();
        if points.len() != expected {
            return Err(MeshError::PointCountMismatch {
                rows,
                cols,
                expected,
                actual: points.len(),
            });
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(MeshError::NonFinitePoint);
        }
        Ok(Self {
            kind,
            rows,
            cols,
            points,
        })
    }

    /// All-zero mesh of the given shape.
    pub fn zeroed(kind: PointKind, rows: usize, cols: usize) -> Result<Self, MeshError> {
        let requested = rows * cols * kind.coords();
        let mut points = Vec::new();
        points
            .try_reserve_exact(requested)
            .map_err(|_| MeshError::OutOfMemory { requested })?;
        points.resize(requested, 0.0);
        Self::new(kind, rows, cols, points)
    }

    /// Euclidean XYZ mesh from a row-major grid of points.
    pub fn from_points(rows: usize, cols: usize, points: &[Point3]) -> Result<Self, MeshError> {
        let flat = points.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        Self::new(PointKind::XYZ, rows, cols, flat)
    }

    /// Homogeneous XYZW mesh from euclidean points and their weights.
    pub fn from_weighted_points(
        rows: usize,
        cols: usize,
        points: &[Point3],
        weights: &[f64],
    ) -> Result<Self, MeshError> {
        if weights.len() != points.len() {
            return Err(MeshError::WeightCountMismatch {
                points: points.len(),
                weights: weights.len(),
            });
        }
        let flat = points
            .iter()
            .zip(weights)
            .flat_map(|(p, &w)| [p.x * w, p.y * w, p.z * w, w])
            .collect();
        Self::new(PointKind::XYZW, rows, cols, flat)
    }

    #[must_use]
    pub const fn kind(&self) -> PointKind {
        self.kind
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn coords(&self) -> usize {
        self.kind.coords()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    /// Coordinates of the point at `(row, col)`.
    ///
    /// # Panics
    /// Panics when `row >= rows` or `col >= cols`.
    #[must_use]
    pub fn point(&self, row: usize, col: usize) -> &[f64] {
        let start = self.offset(row, col);
        &self.points[start..start + self.coords()]
    }

    pub fn point_mut(&mut self, row: usize, col: usize) -> &mut [f64] {
        let start = self.offset(row, col);
        let coords = self.coords();
        &mut self.points[start..start + coords]
    }

    /// Points in row-major order.
    pub fn iter_points(&self) -> impl Iterator<Item = &[f64]> {
        self.points.chunks_exact(self.coords())
    }

    /// Row `row` as a contiguous slice of `cols` points.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.cols * self.coords();
        &self.points[row * width..(row + 1) * width]
    }

    /// Column `col` copied into a contiguous buffer of `rows` points.
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.rows * self.coords());
        for row in 0..self.rows {
            out.extend_from_slice(self.point(row, col));
        }
        out
    }

    /// Corner points `(row 0, col 0)`, `(row 0, last col)`, `(last row, col 0)`,
    /// `(last row, last col)`.
    #[must_use]
    pub fn corners(&self) -> [&[f64]; 4] {
        let last_row = self.rows - 1;
        let last_col = self.cols - 1;
        [
            self.point(0, 0),
            self.point(0, last_col),
            self.point(last_row, 0),
            self.point(last_row, last_col),
        ]
    }

    /// Per-coordinate `(min, max)` over all control points.
    #[must_use]
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let coords = self.coords();
        let mut min = vec![f64::INFINITY; coords];
        let mut max = vec![f64::NEG_INFINITY; coords];
        for point in self.iter_points() {
            for (i, &value) in point.iter().enumerate() {
                min[i] = min[i].min(value);
                max[i] = max[i].max(value);
            }
        }
        (min, max)
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(row < self.rows && col < self.cols, "control point index out of range");
        (row * self.cols + col) * self.coords()
    }
}
