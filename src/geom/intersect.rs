//! Ray/surface intersection by projection clipping.
//!
//! The ray is written as the intersection of two planes and the surface is
//! projected onto them, so hits are the zeros of a 2D distance surface. The
//! projected surface is cut into Bezier patches, and each patch is narrowed by
//! alternately clipping its u and v ranges until it is smaller than
//! [`IntersectOptions::uv_tolerance`] in both. A clip that cannot remove at
//! least `1 - split_threshold` of the range splits the patch instead, which
//! separates multiple hits and breaks up hulls that straddle the origin.

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::clip::{ClipError, candidate_interval, extract_region};
use super::core::{Plane, Point3, Ray, Tolerance};
use super::project::project;
use super::surface::{Direction, NurbsSurface, SurfaceError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntersectError {
    #[error("ray must have a finite origin and a finite, non-zero direction")]
    DegenerateRay,
    #[error("invalid intersection options: {0}")]
    InvalidOptions(&'static str),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Clip(#[from] ClipError),
}

/// Options for [`intersect`] and [`ray_surface_hits`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectOptions {
    /// A patch narrower than this in both u and v is reported as a hit.
    pub uv_tolerance: f64,
    /// Clipped intervals wider than this fraction of the patch split it instead.
    pub split_threshold: f64,
    /// Clip steps a patch (and the patches split from it) may take.
    pub max_iterations: usize,
    /// Slack for the test that a projected patch's bounds contain the origin.
    pub tolerance: Tolerance,
}

impl Default for IntersectOptions {
    fn default() -> Self {
        Self {
            uv_tolerance: 1e-6,
            split_threshold: 0.8,
            max_iterations: 100,
            tolerance: Tolerance::DEFAULT,
        }
    }
}

impl IntersectOptions {
    #[must_use]
    pub const fn uv_tolerance(mut self, uv_tolerance: f64) -> Self {
        self.uv_tolerance = uv_tolerance;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn validate(&self) -> Result<(), IntersectError> {
        if !(self.uv_tolerance.is_finite() && self.uv_tolerance > 0.0) {
            return Err(IntersectError::InvalidOptions("uv_tolerance must be positive"));
        }
        if !(self.split_threshold > 0.0 && self.split_threshold <= 1.0) {
            return Err(IntersectError::InvalidOptions(
                "split_threshold must lie in (0, 1]",
            ));
        }
        if self.max_iterations == 0 {
            return Err(IntersectError::InvalidOptions("max_iterations must be >= 1"));
        }
        Ok(())
    }
}

/// Surface parameters of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvHit {
    pub u: f64,
    pub v: f64,
    /// Clip and split steps taken by the patch that converged.
    pub subdivisions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceHit {
    pub uv: UvHit,
    pub point: Point3,
    /// Ray parameter `t` with `point ≈ origin + t * direction`; negative
    /// behind the origin.
    pub distance: f64,
}

/// Two orthogonal planes whose line of intersection is the ray.
pub fn planes_from_ray(ray: &Ray) -> Result<(Plane, Plane), IntersectError> {
    if !ray.origin.is_finite() {
        return Err(IntersectError::DegenerateRay);
    }
    let direction = ray
        .direction
        .normalized()
        .ok_or(IntersectError::DegenerateRay)?;
    let normal1 = direction
        .orthogonal()
        .ok_or(IntersectError::DegenerateRay)?;
    let normal2 = normal1.cross(direction);
    Ok((
        Plane::through(ray.origin, normal1),
        Plane::through(ray.origin, normal2),
    ))
}

struct Work {
    patch: NurbsSurface,
    steps: usize,
}

/// Parameters at which `surface` meets the line `plane1 ∩ plane2`.
///
/// Hits whose u and v both lie within `uv_tolerance` of an earlier hit are
/// merged into it.
pub fn intersect(
    surface: &NurbsSurface,
    plane1: &Plane,
    plane2: &Plane,
    options: IntersectOptions,
) -> Result<Vec<UvHit>, IntersectError> {
    options.validate()?;

    let projected = project(surface, plane1, plane2)?;
    let mut pending: Vec<Work> = projected
        .bezier_patches()?
        .into_iter()
        .rev()
        .map(|patch| Work { patch, steps: 0 })
        .collect();

    let mut hits: Vec<UvHit> = Vec::new();
    while let Some(work) = pending.pop() {
        let Some(hit) = clip_step(work, &options, &mut pending)? else {
            continue;
        };
        let duplicate = hits.iter().any(|h| {
            (h.u - hit.u).abs() <= options.uv_tolerance
                && (h.v - hit.v).abs() <= options.uv_tolerance
        });
        if duplicate {
            log::trace!("merged duplicate hit at ({}, {})", hit.u, hit.v);
        } else {
            hits.push(hit);
        }
    }

    Ok(hits)
}

/// One clipping step on `work`: either discards it, converges to a hit, or
/// pushes its narrowed or split successors onto `pending`.
fn clip_step(
    work: Work,
    options: &IntersectOptions,
    pending: &mut Vec<Work>,
) -> Result<Option<UvHit>, IntersectError> {
    let Work { patch, steps } = work;
    if steps >= options.max_iterations {
        let (u0, u1) = patch.domain(Direction::Row);
        let (v0, v1) = patch.domain(Direction::Col);
        log::warn!(
            "dropping patch u {u0}..{u1} v {v0}..{v1} after {steps} clip steps without converging"
        );
        return Ok(None);
    }
    if !origin_in_bounds(&patch, options.tolerance) {
        return Ok(None);
    }

    let dir = patch.direction();
    let Some(interval) = candidate_interval(&patch, dir)? else {
        return Ok(None);
    };

    if interval.width() > options.split_threshold {
        let (left, right) = patch.split(dir)?;
        let next = dir.other();
        pending.push(Work {
            patch: right.with_direction(next),
            steps: steps + 1,
        });
        pending.push(Work {
            patch: left.with_direction(next),
            steps: steps + 1,
        });
        return Ok(None);
    }

    let (k0, k1) = patch.knot_extent(dir);
    let (lower, upper) = interval.map_to(k0, k1);
    let (mut lower, mut upper) = (lower.max(k0), upper.min(k1));
    if upper <= lower {
        let pad = 0.25 * options.uv_tolerance;
        lower = (lower - pad).max(k0);
        upper = (upper + pad).min(k1);
    }
    let narrowed = extract_region(&patch, dir, lower, upper)?;

    let (u0, u1) = narrowed.domain(Direction::Row);
    let (v0, v1) = narrowed.domain(Direction::Col);
    let (du, dv) = (u1 - u0, v1 - v0);
    if du < options.uv_tolerance && dv < options.uv_tolerance {
        let hit = UvHit {
            u: 0.5 * (u0 + u1),
            v: 0.5 * (v0 + v1),
            subdivisions: steps + 1,
        };
        log::debug!("hit at ({}, {}) after {} steps", hit.u, hit.v, hit.subdivisions);
        return Ok(Some(hit));
    }

    let next = if du > dv { Direction::Row } else { Direction::Col };
    pending.push(Work {
        patch: narrowed.with_direction(next),
        steps: steps + 1,
    });
    Ok(None)
}

fn origin_in_bounds(patch: &NurbsSurface, tol: Tolerance) -> bool {
    let (min, max) = patch.control_bounds();
    min.iter()
        .zip(&max)
        .all(|(&lo, &hi)| lo <= tol.eps && hi >= -tol.eps)
}

/// Hits of `ray` on a 3D surface, sorted by ray parameter.
pub fn ray_surface_hits(
    surface: &NurbsSurface,
    ray: &Ray,
    options: IntersectOptions,
) -> Result<Vec<SurfaceHit>, IntersectError> {
    let (plane1, plane2) = planes_from_ray(ray)?;
    let dd = ray.direction.dot(ray.direction);

    let mut hits = intersect(surface, &plane1, &plane2, options)?
        .into_iter()
        .map(|uv| -> Result<SurfaceHit, IntersectError> {
            let point = surface.point_at(uv.u, uv.v)?;
            let distance = (point - ray.origin).dot(ray.direction) / dd;
            Ok(SurfaceHit { uv, point, distance })
        })
        .collect::<Result<Vec<_>, _>>()?;

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(hits)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        /// [`ray_surface_hits`] for every ray, evaluated in parallel.
        pub fn intersect_rays(
            surface: &NurbsSurface,
            rays: &[Ray],
            options: IntersectOptions,
        ) -> Vec<Result<Vec<SurfaceHit>, IntersectError>> {
            rays.par_iter()
                .map(|ray| ray_surface_hits(surface, ray, options))
                .collect()
        }
    } else {
        /// [`ray_surface_hits`] for every ray.
        pub fn intersect_rays(
            surface: &NurbsSurface,
            rays: &[Ray],
            options: IntersectOptions,
        ) -> Vec<Result<Vec<SurfaceHit>, IntersectError>> {
            rays.iter()
                .map(|ray| ray_surface_hits(surface, ray, options))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::core::Vec3;

    #[test]
    fn ray_lies_on_both_planes() {
        let ray = Ray::new(Point3::new(1.0, -2.0, 0.5), Vec3::new(0.3, 0.4, -1.2));
        let (p1, p2) = planes_from_ray(&ray).unwrap();
        for t in [-1.0, 0.0, 2.5] {
            let point = ray.point_at(t);
            assert!(p1.signed_distance(point).abs() < 1e-12);
            assert!(p2.signed_distance(point).abs() < 1e-12);
        }
        assert!(p1.normal.dot(p2.normal).abs() < 1e-12);
    }

    #[test]
    fn zero_direction_is_rejected() {
        let ray = Ray::new(Point3::ORIGIN, Vec3::ZERO);
        assert_eq!(planes_from_ray(&ray), Err(IntersectError::DegenerateRay));
    }

    #[test]
    fn options_are_validated() {
        let opts = IntersectOptions::default().uv_tolerance(0.0);
        assert!(matches!(opts.validate(), Err(IntersectError::InvalidOptions(_))));
        let opts = IntersectOptions::default().max_iterations(0);
        assert!(matches!(opts.validate(), Err(IntersectError::InvalidOptions(_))));
        assert!(IntersectOptions::default().validate().is_ok());
    }
}
