use clap::Parser;
use tracing_subscriber::EnvFilter;

use sigma_dyn::app::App;

/// A diagnostic harness for the `sigma_dyn` tendency engine.
///
/// This binary does not integrate a simulation forward in time — there
/// is no leapfrog time-stepper wired into this crate (spec.md §1 keeps
/// that an external collaborator) — it instead evaluates the RHS for
/// the selected model tier back-to-back and reports a tendency norm
/// each step, which is enough to exercise every code path end to end.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Preset name (see `sigma_dyn::app::App::presets`) or a path to a
    /// YAML configuration file.
    input: String,

    /// Configuration overrides, applied in order: a `key=value` pair or
    /// a path to a `.yaml` file to merge on top.
    #[arg(short = 'p', long = "patch")]
    patches: Vec<String>,

    /// Number of RHS evaluations to run.
    #[arg(short = 'n', long = "steps", default_value_t = 10)]
    steps: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut app = App::from_preset_or_file(&cli.input, cli.patches)?.validate()?;

    let dt = app.config.time_stepping.dt;
    let mut model_time = app.config.control.start_time;
    let mut lf = 1;

    for step in 0..cli.steps {
        app.evaluate(lf, model_time).await?;
        let norm = app.vorticity_tendency_norm();
        tracing::info!(step, model_time, norm, "evaluated tendency");
        app.tasks.report_progress.advance(dt);
        model_time += dt;
        lf = if lf == 1 { 2 } else { 1 };
    }

    Ok(())
}
