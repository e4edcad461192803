//! Projection of a surface's control mesh onto a pair of planes.
//!
//! A ray is the intersection of two planes. Replacing every control point by
//! its signed distances to those planes yields a 2D surface whose zeros are
//! exactly the ray hits, which is what the clipping stage works on.

use super::core::Plane;
use super::mesh::{ControlMesh, PointKind};
use super::surface::{Direction, NurbsSurface, SurfaceError};

/// Signed distances of one control point to `plane`.
///
/// Rational points are dehomogenized for the distance and the result is
/// re-weighted, so the projected surface stays a valid rational image.
fn distance(point: &[f64], rational: bool, plane: Plane) -> f64 {
    if rational {
        let w = point[point.len() - 1];
        let xyz = [point[0] / w, point[1] / w, point[2] / w];
        plane.signed_distance_coords(&xyz) * w
    } else {
        plane.signed_distance_coords(point)
    }
}

/// Project `surface` onto the planes `plane1` and `plane2`.
///
/// The result has the same orders and knot vectors, [`PointKind::Projected`]
/// control points `(d1, d2)`, and [`Direction::Col`] as its processing
/// direction.
pub fn project(
    surface: &NurbsSurface,
    plane1: &Plane,
    plane2: &Plane,
) -> Result<NurbsSurface, SurfaceError> {
    let kind = surface.kind();
    if matches!(kind, PointKind::Projected) || kind.spatial_coords() < 3 {
        return Err(SurfaceError::UnsupportedPointKind { kind });
    }

    let source = surface.mesh();
    let rational = kind.is_rational();
    if rational && source.iter_points().any(|p| p[p.len() - 1] == 0.0) {
        return Err(SurfaceError::ZeroWeight);
    }

    let mut mesh = ControlMesh::zeroed(PointKind::Projected, source.rows(), source.cols())?;
    for row in 0..source.rows() {
        for col in 0..source.cols() {
            let point = source.point(row, col);
            let out = mesh.point_mut(row, col);
            out[0] = distance(point, rational, *plane1);
            out[1] = distance(point, rational, *plane2);
        }
    }

    Ok(NurbsSurface::new(
        surface.u_order(),
        surface.v_order(),
        surface.u_knots().clone(),
        surface.v_knots().clone(),
        mesh,
    )?
    .with_direction(Direction::Col))
}
