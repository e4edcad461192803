fn main() {
    if let Err(err) = native::run() {
        eprintln!("nurb_cli error: {err}");
        std::process::exit(1);
    }
}

mod native {
    use nurb_engine::geom::{
        ControlMesh, Direction, IntersectOptions, KnotVector, NurbsSurface, Point3, Ray, Vec3,
        clip_direction, extract_region, planes_from_ray, project, ray_surface_hits,
    };
    use std::fmt::Write as _;

    const USAGE: &str = r#"nurb_cli (nurb-engine)

USAGE:
  nurb_cli list
  nurb_cli run <scenario|all> [options]

SCENARIOS:
  knots
  clip_centre
  clip_offset
  ray_flat
  ray_arch

OPTIONS (run):
  --uv-tol <f64>     Parametric convergence tolerance for ray scenarios
  --max-iter <n>     Clip step limit per patch for ray scenarios
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut options = IntersectOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--uv-tol" => {
                    let value = args.value("--uv-tol")?;
                    let tol = value
                        .parse::<f64>()
                        .map_err(|e| format!("invalid --uv-tol `{value}`: {e}"))?;
                    options = options.uv_tolerance(tol);
                }
                "--max-iter" => {
                    let value = args.value("--max-iter")?;
                    let n = value
                        .parse::<usize>()
                        .map_err(|e| format!("invalid --max-iter `{value}`: {e}"))?;
                    options = options.max_iterations(n);
                }
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let scenarios: Vec<Scenario> = if scenario_name == "all" {
            Scenario::ALL.to_vec()
        } else {
            vec![Scenario::from_str(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?]
        };

        let mut report = String::new();
        let _ = writeln!(report, "# nurb-engine report v1");
        for scenario in scenarios {
            let _ = writeln!(report, "scenario {}", scenario.name());
            run_scenario(scenario, options, &mut report)?;
        }

        print!("{report}");
        Ok(())
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        Knots,
        ClipCentre,
        ClipOffset,
        RayFlat,
        RayArch,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::Knots,
            Scenario::ClipCentre,
            Scenario::ClipOffset,
            Scenario::RayFlat,
            Scenario::RayArch,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::Knots => "knots",
                Scenario::ClipCentre => "clip_centre",
                Scenario::ClipOffset => "clip_offset",
                Scenario::RayFlat => "ray_flat",
                Scenario::RayArch => "ray_arch",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            match name {
                "knots" => Some(Scenario::Knots),
                "clip_centre" => Some(Scenario::ClipCentre),
                "clip_offset" => Some(Scenario::ClipOffset),
                "ray_flat" => Some(Scenario::RayFlat),
                "ray_arch" => Some(Scenario::RayArch),
                _ => None,
            }
        }
    }

    fn run_scenario(
        scenario: Scenario,
        options: IntersectOptions,
        out: &mut String,
    ) -> Result<(), String> {
        match scenario {
            Scenario::Knots => scenario_knots(out),
            Scenario::ClipCentre => scenario_clip(Point3::new(0.5, 0.5, 1.0), out),
            Scenario::ClipOffset => scenario_clip(Point3::new(2.0, 2.0, 1.0), out),
            Scenario::RayFlat => scenario_ray(
                &unit_square()?,
                &Ray::new(Point3::new(0.3, 0.6, 1.0), Vec3::new(0.0, 0.0, -1.0)),
                options,
                out,
            ),
            Scenario::RayArch => scenario_ray(
                &arch()?,
                &Ray::new(Point3::new(-1.0, 0.3, 0.3), Vec3::X),
                options,
                out,
            ),
        }
        .map_err(|e| format!("{}: {e}", scenario.name()))
    }

    fn scenario_knots(out: &mut String) -> Result<(), String> {
        let err = |e: nurb_engine::geom::KnotVectorError| e.to_string();

        let base = KnotVector::open_uniform(3, 0.0, 4.0, 3).map_err(err)?;
        let extra = KnotVector::uniform(0.0, 4.0, 1).map_err(err)?;
        let merged = base.merge(&extra).map_err(err)?;
        let raised = merged.with_multiplicity(2.0, 3).map_err(err)?;
        let mut tail = raised.extract(4, raised.len()).map_err(err)?;
        tail.normalize().map_err(err)?;

        let _ = writeln!(out, "base {base}");
        let _ = writeln!(out, "merged {merged}");
        let _ = writeln!(out, "multiplicity(2) {}", merged.multiplicity(2.0));
        let _ = writeln!(out, "raised {raised}");
        let _ = writeln!(out, "normalized_tail {tail}");
        Ok(())
    }

    fn scenario_clip(origin: Point3, out: &mut String) -> Result<(), String> {
        let ray = Ray::new(origin, Vec3::new(0.0, 0.0, -1.0));
        let (plane1, plane2) = planes_from_ray(&ray).map_err(|e| e.to_string())?;
        let projected = project(&unit_square()?, &plane1, &plane2).map_err(|e| e.to_string())?;

        let Some(row) = clip_direction(&projected, Direction::Row).map_err(|e| e.to_string())?
        else {
            let _ = writeln!(out, "row none");
            return Ok(());
        };
        let _ = writeln!(out, "row {:.6} {:.6}", row.min, row.max);

        let (k0, k1) = projected.knot_extent(Direction::Row);
        let (lower, upper) = row.map_to(k0, k1);
        let narrowed =
            extract_region(&projected, Direction::Row, lower, upper).map_err(|e| e.to_string())?;
        match clip_direction(&narrowed, Direction::Col).map_err(|e| e.to_string())? {
            Some(col) => {
                let _ = writeln!(out, "col {:.6} {:.6}", col.min, col.max);
            }
            None => {
                let _ = writeln!(out, "col none");
            }
        }
        Ok(())
    }

    fn scenario_ray(
        surface: &NurbsSurface,
        ray: &Ray,
        options: IntersectOptions,
        out: &mut String,
    ) -> Result<(), String> {
        let hits = ray_surface_hits(surface, ray, options).map_err(|e| e.to_string())?;
        let _ = writeln!(out, "hits {}", hits.len());
        for hit in hits {
            let _ = writeln!(
                out,
                "hit uv {:.6} {:.6} point {:.6} {:.6} {:.6} t {:.6} steps {}",
                hit.uv.u,
                hit.uv.v,
                hit.point.x,
                hit.point.y,
                hit.point.z,
                hit.distance,
                hit.uv.subdivisions
            );
        }
        Ok(())
    }

    fn unit_square() -> Result<NurbsSurface, String> {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        build_surface(2, 2, 2, 2, &points)
    }

    /// Cubic arch in x/z extruded along y.
    fn arch() -> Result<NurbsSurface, String> {
        let profile = [(0.0, 0.0), (0.0, 1.3), (1.0, 1.3), (1.0, 0.0)];
        let points: Vec<Point3> = [0.0, 1.0]
            .into_iter()
            .flat_map(|y| profile.iter().map(move |&(x, z)| Point3::new(x, y, z)))
            .collect();
        build_surface(4, 2, 2, 4, &points)
    }

    fn build_surface(
        u_order: usize,
        v_order: usize,
        rows: usize,
        cols: usize,
        points: &[Point3],
    ) -> Result<NurbsSurface, String> {
        let u_knots = KnotVector::clamped(u_order, 0.0, 1.0).map_err(|e| e.to_string())?;
        let v_knots = KnotVector::clamped(v_order, 0.0, 1.0).map_err(|e| e.to_string())?;
        let mesh = ControlMesh::from_points(rows, cols, points).map_err(|e| e.to_string())?;
        NurbsSurface::new(u_order, v_order, u_knots, v_knots, mesh).map_err(|e| e.to_string())
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
