use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    ClipError, ControlMesh, Direction, KnotVector, NurbsSurface, ParamInterval, Point3, PointKind,
    Ray, Vec3, clip_direction, extract_region, planes_from_ray, project,
};

/// Degree 3 flat patch over the unit square with x = u and y = v.
fn flat_cubic_patch() -> NurbsSurface {
    let points: Vec<Point3> = (0..4)
        .flat_map(|r| (0..4).map(move |c| Point3::new(f64::from(c) / 3.0, f64::from(r) / 3.0, 0.0)))
        .collect();
    let mesh = ControlMesh::from_points(4, 4, &points).unwrap();
    let kv = KnotVector::open_uniform(4, 0.0, 1.0, 0).unwrap();
    NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap()
}

fn vertical_ray(x: f64, y: f64) -> Ray {
    Ray::new(Point3::new(x, y, 1.0), Vec3::new(0.0, 0.0, -1.0))
}

fn projected_for(surface: &NurbsSurface, ray: &Ray) -> NurbsSurface {
    let (plane1, plane2) = planes_from_ray(ray).unwrap();
    project(surface, &plane1, &plane2).unwrap()
}

#[test]
fn centre_ray_clips_to_a_narrow_interval_around_the_hit() {
    let projected = projected_for(&flat_cubic_patch(), &vertical_ray(0.5, 0.5));

    for dir in [Direction::Row, Direction::Col] {
        let interval = clip_direction(&projected, dir).unwrap().unwrap();
        assert!(0.0 <= interval.min && interval.min <= interval.max && interval.max <= 1.0);
        assert!(interval.contains(0.5), "{dir:?}: {interval:?}");
        assert!((interval.min - 0.495).abs() < 1e-9);
        assert!((interval.max - 0.505).abs() < 1e-9);
    }
}

#[test]
fn off_centre_ray_moves_the_interval() {
    let projected = projected_for(&flat_cubic_patch(), &vertical_ray(0.2, 0.9));

    let u = clip_direction(&projected, Direction::Row).unwrap().unwrap();
    let v = clip_direction(&projected, Direction::Col).unwrap().unwrap();
    assert!(u.contains(0.2) && u.width() < 0.02);
    assert!(v.contains(0.9) && v.width() < 0.02);
}

#[test]
fn patch_offset_to_one_side_of_both_planes_clips_to_nothing() {
    let projected = projected_for(&flat_cubic_patch(), &vertical_ray(5.0, 5.0));
    let (min, _) = projected.control_bounds();
    assert!(min[0] > 0.0 || min[1] > 0.0);

    assert_eq!(clip_direction(&projected, Direction::Row).unwrap(), None);
    assert_eq!(clip_direction(&projected, Direction::Col).unwrap(), None);
}

#[test]
fn clip_interval_stays_inside_the_unit_range() {
    let mut rng = StdRng::seed_from_u64(53);
    let mut seen = 0;
    for _ in 0..300 {
        let points: Vec<f64> = (0..32).map(|_| rng.random_range(-1.0..1.0)).collect();
        let mesh = ControlMesh::new(PointKind::Projected, 4, 4, points).unwrap();
        let kv = KnotVector::clamped(4, 0.0, 1.0).unwrap();
        let surface = NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap();

        for dir in [Direction::Row, Direction::Col] {
            if let Some(interval) = clip_direction(&surface, dir).unwrap() {
                assert!(0.0 <= interval.min, "{interval:?}");
                assert!(interval.min <= interval.max, "{interval:?}");
                assert!(interval.max <= 1.0, "{interval:?}");
                seen += 1;
            }
        }
    }
    assert!(seen > 0);
}

#[test]
fn clipping_requires_projected_input() {
    let surface = flat_cubic_patch();
    assert_eq!(
        clip_direction(&surface, Direction::Row),
        Err(ClipError::NotProjected {
            kind: PointKind::XYZ
        })
    );
}

#[test]
fn single_control_point_direction_has_too_few_samples() {
    let mesh = ControlMesh::new(PointKind::Projected, 1, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    let u = KnotVector::clamped(2, 0.0, 1.0).unwrap();
    let v = KnotVector::clamped(1, 0.0, 1.0).unwrap();
    let surface = NurbsSurface::new(2, 1, u, v, mesh).unwrap();
    assert_eq!(
        clip_direction(&surface, Direction::Col),
        Err(ClipError::TooFewSamples {
            direction: Direction::Col,
            count: 1
        })
    );
}

#[test]
fn extract_region_matches_parent_on_the_sub_interval() {
    let points: Vec<Point3> = (0..16)
        .map(|i| {
            let (r, c) = (i / 4, i % 4);
            Point3::new(f64::from(c), f64::from(r), f64::from((r * c) % 3) * 0.5)
        })
        .collect();
    let mesh = ControlMesh::from_points(4, 4, &points).unwrap();
    let kv = KnotVector::clamped(4, 0.0, 1.0).unwrap();
    let surface = NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap();

    let region = extract_region(&surface, Direction::Row, 0.2, 0.6).unwrap();
    assert_eq!(region.u_knots(), &KnotVector::clamped(4, 0.2, 0.6).unwrap());
    assert_eq!(region.v_knots(), surface.v_knots());

    for (u, v) in [(0.2, 0.0), (0.35, 0.4), (0.6, 1.0), (0.5, 0.75)] {
        let a = surface.point_at(u, v).unwrap();
        let b = region.point_at(u, v).unwrap();
        assert!(a.distance_to(b) < 1e-12, "({u}, {v})");
    }

    let region = extract_region(&surface, Direction::Col, 0.1, 0.3).unwrap();
    assert_eq!(region.domain(Direction::Col), (0.1, 0.3));
    assert!(surface.point_at(0.7, 0.25).unwrap().distance_to(region.point_at(0.7, 0.25).unwrap()) < 1e-12);
}

#[test]
fn extract_region_validates_parameters() {
    let surface = flat_cubic_patch();
    assert_eq!(
        extract_region(&surface, Direction::Row, 0.6, 0.2).unwrap_err(),
        ClipError::InvalidInterval {
            lower: 0.6,
            upper: 0.2
        }
    );
    assert!(extract_region(&surface, Direction::Row, f64::NAN, 0.2).is_err());
    assert_eq!(
        extract_region(&surface, Direction::Col, 0.5, 1.5).unwrap_err(),
        ClipError::InvalidInterval {
            lower: 0.5,
            upper: 1.5
        }
    );
}

#[test]
fn extract_region_across_an_interior_knot_matches_parent() {
    let kv = KnotVector::open_uniform(4, 0.0, 1.0, 1).unwrap();
    let points: Vec<Point3> = (0..25)
        .map(|i| {
            let (r, c) = (i / 5, i % 5);
            let z = f64::from((r * 3 + c * 2) % 5) * 0.4 - 0.8;
            Point3::new(f64::from(c) * 0.25, f64::from(r) * 0.25, z)
        })
        .collect();
    let mesh = ControlMesh::from_points(5, 5, &points).unwrap();
    let surface = NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap();

    let region = extract_region(&surface, Direction::Row, 0.2, 0.8).unwrap();
    assert_eq!(region.domain(Direction::Row), (0.2, 0.8));
    assert_eq!(region.u_knots().distinct_interior(4), vec![0.5]);
    for u in [0.2, 0.3, 0.45, 0.5, 0.65, 0.8] {
        for v in [0.0, 0.3, 0.5, 1.0] {
            let a = surface.point_at(u, v).unwrap();
            let b = region.point_at(u, v).unwrap();
            assert!(a.distance_to(b) < 1e-9, "({u}, {v}): {a:?} != {b:?}");
        }
    }

    let region = extract_region(&surface, Direction::Col, 0.4, 0.6).unwrap();
    for (u, v) in [(0.1, 0.4), (0.5, 0.45), (0.9, 0.55), (0.3, 0.6)] {
        let a = surface.point_at(u, v).unwrap();
        let b = region.point_at(u, v).unwrap();
        assert!(a.distance_to(b) < 1e-9, "({u}, {v}): {a:?} != {b:?}");
    }
}

#[test]
fn interval_maps_onto_a_knot_domain() {
    let interval = ParamInterval::new(0.25, 0.5);
    assert_eq!(interval.map_to(2.0, 6.0), (3.0, 4.0));
    assert_eq!(ParamInterval::UNIT.width(), 1.0);
}
