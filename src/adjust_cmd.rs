//! Adjust command: train a method on a training table and adjust a
//! simulation table.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, info_span};

use sdba_adjust::{AdjustInput, TrainInput};
use sdba_io::{Table, read_table, write_table};

use crate::cli::AdjustArgs;
use crate::config::SdbaConfig;
use crate::convert;

fn resolve(path: Option<PathBuf>, fallback: &Option<PathBuf>, key: &str) -> Result<PathBuf> {
    path.or_else(|| fallback.clone())
        .ok_or_else(|| anyhow::anyhow!("no {key} path: set [io].{key} in config or use --{key}"))
}

/// Whether `table` holds a `<role>_<var>` column for every variable.
fn has_role(table: &Table, role: &str, variables: &[String]) -> bool {
    variables
        .iter()
        .all(|v| table.column(&format!("{role}_{v}")).is_some())
}

/// Run the adjustment pipeline.
pub fn run(args: AdjustArgs) -> Result<()> {
    let _cmd = info_span!("adjust").entered();

    // 1. Load config; CLI flags override it
    let toml_str = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config: {}", args.config.display()))?;
    let config: SdbaConfig = toml::from_str(&toml_str)
        .with_context(|| format!("failed to parse config: {}", args.config.display()))?;

    let train_path = resolve(args.train, &config.io.train, "train")?;
    let sim_path = resolve(args.sim, &config.io.sim, "sim")?;
    let output = resolve(args.output, &config.io.output, "output")?;
    let seed = args.seed.or(config.seed);

    let adjustment = convert::build_adjustment(&config.method, seed)?;
    let writer_cfg = convert::build_writer_config(&config.io)?;
    info!(method = %adjustment, ?seed, "configured");

    // 2. Training data
    let train = read_table(&train_path)
        .with_context(|| format!("failed to read training table: {}", train_path.display()))?;
    let variables = if config.io.variables.is_empty() {
        train.variables("ref")
    } else {
        config.io.variables.clone()
    };
    if variables.is_empty() {
        bail!(
            "no variables to adjust: {} has no ref_<var> column and [io].variables is empty",
            train_path.display()
        );
    }
    info!(?variables, rows = train.len(), "training data loaded");

    let input = TrainInput::new(
        train.series("ref", &variables)?,
        train.series("hist", &variables)?,
    )?;

    // 3. Train
    let trained = adjustment
        .train(&input)
        .with_context(|| format!("training {adjustment} failed"))?;
    if args.show_params {
        for (name, array) in trained.to_dataset().iter() {
            info!(name, dims = ?array.dims(), shape = ?array.data().shape(), "trained variable");
        }
    }

    // 4. Simulation, with an optional base scenario
    let sim_table = read_table(&sim_path)
        .with_context(|| format!("failed to read simulation table: {}", sim_path.display()))?;
    let mut adjust_input = AdjustInput::new(sim_table.series("sim", &variables)?);
    if has_role(&sim_table, "scen", &variables) {
        debug!("using scen_* columns as base scenario");
        adjust_input = adjust_input.with_scen(sim_table.series("scen", &variables)?)?;
    }

    // 5. Adjust
    let adjusted = trained
        .adjust(&adjust_input)
        .with_context(|| format!("adjusting with {adjustment} failed"))?;

    // 6. Write
    let mut out = Table::new(adjusted.scen().time().clone());
    out.insert_series("scen", &variables, adjusted.scen())?;
    if let Some(trend) = adjusted.trend() {
        out.insert_series("trend", &variables, trend)?;
    }
    if let Some(sim_q) = adjusted.sim_q() {
        out.insert_series("sim_q", &variables, sim_q)?;
    }
    write_table(&output, &out, &writer_cfg)
        .with_context(|| format!("failed to write Parquet: {}", output.display()))?;
    info!(path = %output.display(), rows = out.len(), "scenario written");

    Ok(())
}
