use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Statistical bias adjustment of climate model time series.
#[derive(Parser)]
#[command(
    name = "sdba",
    version,
    about = "Statistical bias adjustment of climate model time series"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Train a method on ref/hist and adjust a simulation.
    Adjust(AdjustArgs),
}

/// Arguments for the `adjust` subcommand.
#[derive(clap::Args)]
pub struct AdjustArgs {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "sdba.toml")]
    pub config: PathBuf,

    /// Override training Parquet path from config.
    #[arg(long)]
    pub train: Option<PathBuf>,

    /// Override simulation Parquet path from config.
    #[arg(long)]
    pub sim: Option<PathBuf>,

    /// Override output Parquet path from config.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override global RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Also write the trained parameters' shapes to the log.
    #[arg(long)]
    pub show_params: bool,
}
