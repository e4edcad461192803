//! NURBS knot-vector algebra and ray/surface clipping.
//!
//! Everything lives in [`geom`]: knot vectors, control meshes and surfaces,
//! projection of a surface onto a ray's plane pair, convex-hull clipping, and
//! the intersection driver built on top of them.
//!
//! The crate logs through the [`log`] facade and never installs a logger.
//! Enable the `parallel` feature to run batch ray queries on rayon.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
