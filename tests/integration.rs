use nurb_engine::geom::{
    ClipError, ControlMesh, Direction, IntersectOptions, KnotVector, NurbsSurface, ParamInterval,
    Plane, Point3, PointKind, Ray, Vec3, candidate_interval, clip_direction, extract_region,
    planes_from_ray, project, ray_surface_hits,
};

/// Degree 3 open-uniform 4x4 flat patch over the unit square.
fn unit_square_patch() -> NurbsSurface {
    let points: Vec<Point3> = (0..16)
        .map(|i| Point3::new(f64::from(i % 4) / 3.0, f64::from(i / 4) / 3.0, 0.0))
        .collect();
    let mesh = ControlMesh::from_points(4, 4, &points).unwrap();
    let kv = KnotVector::open_uniform(4, 0.0, 1.0, 0).unwrap();
    NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap()
}

#[test]
fn knot_vector_pipeline() {
    let base = KnotVector::open_uniform(3, 0.0, 4.0, 3).unwrap();
    assert_eq!(base.as_slice(), &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0]);

    let extra = KnotVector::uniform(0.0, 4.0, 1).unwrap();
    let merged = base.merge(&extra).unwrap();
    assert_eq!(merged.multiplicity(2.0), 2);

    let raised = merged.with_multiplicity(2.0, 3).unwrap();
    assert_eq!(raised.multiplicity(2.0), 3);

    let mut tail = raised.extract(4, raised.len()).unwrap();
    assert_eq!(tail.as_slice(), &[2.0, 2.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
    tail.normalize().unwrap();
    assert_eq!(tail.as_slice(), &[0.5, 0.5, 0.5, 0.75, 1.0, 1.0, 1.0]);
}

#[test]
fn unit_square_patch_projects_and_clips_around_the_centre_ray() {
    let surface = unit_square_patch();
    let ray = Ray::new(Point3::new(0.5, 0.5, 1.0), Vec3::new(0.0, 0.0, -1.0));
    let (plane1, plane2) = planes_from_ray(&ray).unwrap();

    let projected = project(&surface, &plane1, &plane2).unwrap();
    assert_eq!(projected.kind(), PointKind::Projected);
    assert_eq!(projected.mesh().rows(), 4);
    assert_eq!(projected.mesh().cols(), 4);

    let row = clip_direction(&projected, Direction::Row).unwrap().unwrap();
    assert!(0.0 <= row.min && row.min <= row.max && row.max <= 1.0);
    assert!(row.contains(0.5));

    let (lower, upper) = row.map_to(0.0, 1.0);
    let narrowed = extract_region(&projected, Direction::Row, lower, upper).unwrap();
    assert_eq!(narrowed.domain(Direction::Row), (lower, upper));
    let col = clip_direction(&narrowed, Direction::Col).unwrap().unwrap();
    assert!(col.contains(0.5));

    let hits = ray_surface_hits(&surface, &ray, IntersectOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].uv.u - 0.5).abs() < 1e-5);
    assert!((hits[0].uv.v - 0.5).abs() < 1e-5);
}

#[test]
fn twisted_patch_straddling_the_ray_keeps_the_full_row_interval() {
    // Bilinear twist: both end columns of the projected mesh cross the
    // dividing line, so neither bound can be clipped.
    let points: Vec<Point3> = (0..16)
        .map(|i| {
            let s = f64::from(i / 4) / 3.0;
            let t = f64::from(i % 4) / 3.0;
            let d1 = -0.5 + s + t - 2.0 * s * t;
            let d2 = -0.5 + s;
            Point3::new(-d2, d1, t)
        })
        .collect();
    let mesh = ControlMesh::from_points(4, 4, &points).unwrap();
    let kv = KnotVector::open_uniform(4, 0.0, 1.0, 0).unwrap();
    let surface = NurbsSurface::new(4, 4, kv.clone(), kv, mesh).unwrap();

    let ray = Ray::new(Point3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
    let (plane1, plane2) = planes_from_ray(&ray).unwrap();
    let projected = project(&surface, &plane1, &plane2).unwrap();

    assert_eq!(
        clip_direction(&projected, Direction::Row).unwrap(),
        Some(ParamInterval::UNIT)
    );
}

#[test]
fn parallel_planes_bounding_the_square_never_meet() {
    let surface = unit_square_patch();
    let left = Plane::new(Vec3::X, 0.0);
    let right = Plane::new(Vec3::X, 1.0);
    let projected = project(&surface, &left, &right).unwrap();

    assert_eq!(
        clip_direction(&projected, Direction::Row),
        Err(ClipError::DegenerateGeometry)
    );
    assert_eq!(clip_direction(&projected, Direction::Col).unwrap(), None);

    // The driver keeps the whole row range and splits.
    assert_eq!(
        candidate_interval(&projected, Direction::Row).unwrap(),
        Some(ParamInterval::UNIT)
    );
    assert_eq!(candidate_interval(&projected, Direction::Col).unwrap(), None);
}
