//! Van der Pol oscillator demo
//!
//! Evolves `ẋ = y, ẏ = −x + y(1 − x²)` from a thin box around
//! `(1.21, 2.01)` and writes the reach-set vertex lists as JSON for an
//! external plotting backend.
//!
//! Flags:
//!   --time <T>       evolution horizon (default 6.0)
//!   --step <H>       maximum step size (default 0.125)
//!   --max-error <E>  integrator error budget (default 1e-4)
//!   --out <PATH>     output JSON path (default vanderpol.json)

use anyhow::{Context, Result};
use flowbound::{
    Canvas, Enclosure, EvolverConfig, Expr, Function, IntegratorConfig, Interval, IntervalBox,
    PicardIntegrator, Projection2, VectorFieldEvolver, VertexListCanvas,
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

fn parse_f64(args: &[String], key: &str, default: f64) -> Result<f64> {
    match parse_flag(args, key) {
        None => Ok(default),
        Some(s) => s.parse::<f64>().with_context(|| format!("invalid value for {key}: {s}")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let time = parse_f64(&args, "--time", 6.0)?;
    let step = parse_f64(&args, "--step", 0.125)?;
    let max_error = parse_f64(&args, "--max-error", 1e-4)?;
    let out = PathBuf::from(parse_flag(&args, "--out").unwrap_or_else(|| "vanderpol.json".into()));

    let (x, y) = (Expr::var(0), Expr::var(1));
    let field = Function::symbolic(
        2,
        vec![y.clone(), -x.clone() + y.clone() * (1.0 - x.clone().powi(2))],
    )?;

    let integrator = Arc::new(PicardIntegrator::new(
        IntegratorConfig::default().with_maximum_error(max_error),
    ));
    let evolver = VectorFieldEvolver::new(
        field,
        integrator,
        EvolverConfig::default().with_maximum_step_size(step),
    );

    let eps = (2.0f64).powi(-10);
    let initial = Enclosure::from_box(
        &IntervalBox::new(vec![
            Interval::new(1.21 - eps, 1.21 + eps),
            Interval::new(2.01 - eps, 2.01 + eps),
        ]),
        vec!["x".into(), "y".into()],
    );

    let orbit = evolver.orbit(&initial, time)?;
    println!(
        "evolved for t = {time}: {} reach enclosures, {} final",
        orbit.reach().len(),
        orbit.final_set().len()
    );

    let mut canvas = VertexListCanvas::new();
    canvas.set_fill_colour((120, 170, 240));
    for enc in orbit.reach() {
        enc.draw(&mut canvas, Projection2::xy());
    }
    canvas.set_fill_colour((220, 80, 80));
    for enc in orbit.final_set() {
        enc.draw(&mut canvas, Projection2::xy());
    }
    canvas.write(&out).with_context(|| format!("writing {}", out.display()))?;
    println!("wrote {}", out.display());
    Ok(())
}
