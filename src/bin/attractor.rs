//! Attractor safety-verification demo
//!
//! Verifies that `ẋ = 2x − xy, ẏ = 2x² − y`, started in a constrained
//! patch near `(1, −2)`, never leaves the disc
//! `(x−2)² + (y−1)² ≤ 22` clipped to `[−1,4]×[−4,6]`, by computing the
//! chain-reach fixed point on a grid. Writes the reach paving as JSON.
//!
//! Flags:
//!   --cell <L>    grid cell length (default 0.5)
//!   --depth <D>   grid subdivision depth (default 2)
//!   --out <PATH>  output JSON path (default attractor.json)

use anyhow::{Context, Result};
use flowbound::{
    AnalyserConfig, Canvas, ConstraintSet, EvolverConfig, Expr, Function, Grid, IntegratorConfig,
    Interval, IntervalBox, PicardIntegrator, Projection2, ReachabilityAnalyser, SafetyAnswer,
    VectorFieldEvolver, VertexListCanvas,
};
use std::path::PathBuf;
use std::sync::Arc;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cell: f64 = parse_flag(&args, "--cell").map_or(Ok(0.5), |s| s.parse())?;
    let depth: u32 = parse_flag(&args, "--depth").map_or(Ok(2), |s| s.parse())?;
    let out = PathBuf::from(parse_flag(&args, "--out").unwrap_or_else(|| "attractor.json".into()));

    let (x, y) = (Expr::var(0), Expr::var(1));
    let field = Function::symbolic(
        2,
        vec![
            2.0 * x.clone() - x.clone() * y.clone(),
            2.0 * x.clone().powi(2) - y.clone(),
        ],
    )?;

    let integrator = Arc::new(PicardIntegrator::new(
        IntegratorConfig::default().with_maximum_error(1e-4),
    ));
    let evolver = VectorFieldEvolver::new(
        field,
        integrator,
        EvolverConfig::default().with_maximum_step_size(0.125),
    );
    let analyser = ReachabilityAnalyser::new(
        evolver,
        Grid::regular(2, cell),
        AnalyserConfig::default()
            .with_grid_height(4)
            .with_maximum_grid_depth(depth)
            .with_lock_to_grid_time(0.5),
    );

    let initial = ConstraintSet::new(
        IntervalBox::new(vec![Interval::new(0.9, 1.0), Interval::new(-2.2, -2.0)]),
        vec![x.clone().powi(2) + (y.clone() + 2.0).powi(2) - 1.0],
    );
    let safe = ConstraintSet::new(
        IntervalBox::new(vec![Interval::new(-1.0, 4.0), Interval::new(-4.0, 6.0)]),
        vec![(x - 2.0).powi(2) + (y - 1.0).powi(2) - 22.0],
    );

    let certificate = analyser.verify_safety(&initial, &safe)?;
    match certificate.answer {
        SafetyAnswer::Safe => println!("safe: the reachable set stays inside the safe region"),
        SafetyAnswer::Unsafe => println!("unsafe: a reached cell provably leaves the safe region"),
        SafetyAnswer::Indeterminate => {
            println!("indeterminate: refine the grid or the error budgets")
        }
    }
    println!("reach paving: {} cells", certificate.reach.cell_count());

    let mut canvas = VertexListCanvas::new();
    canvas.set_fill_colour((120, 200, 140));
    certificate.reach.draw(&mut canvas, Projection2::xy());
    canvas.write(&out).with_context(|| format!("writing {}", out.display()))?;
    println!("wrote {}", out.display());
    Ok(())
}
