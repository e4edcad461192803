mod clip;
mod core;
mod intersect;
mod knot;
mod mesh;
mod project;
mod surface;

pub use clip::{
    ClipError, ConvexEnvelope, EnvelopeSample, ParamInterval, candidate_interval, clip_direction,
    extract_region,
};
pub use core::{Plane, Point3, Ray, Tolerance, Vec3};
pub use intersect::{
    IntersectError, IntersectOptions, SurfaceHit, UvHit, intersect, intersect_rays,
    planes_from_ray, ray_surface_hits,
};
pub use knot::{KnotVector, KnotVectorError};
pub use mesh::{ControlMesh, MeshError, PointKind};
pub use project::project;
pub use surface::{Direction, NurbsSurface, SurfaceError};

#[cfg(test)]
mod tests;
