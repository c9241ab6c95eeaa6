use std::error::Error;
use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use commands::{
    covariance::{self, CovarianceArgs},
    order::{self, OrderArgs},
    reduce::{self, ReduceArgs},
    verify::{self, VerifyArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "spotred", about = "Ion microprobe spot reduction CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a task over a spot file and write the hashed report.
    Reduce(ReduceArgs),
    /// Print the resolved execution order of a task's expressions.
    Order(OrderArgs),
    /// Write the correlation and covariance matrices of a task's parameter models.
    Covariance(CovarianceArgs),
    /// Check the content hash of a previously written report.
    Verify(VerifyArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Reduce(args) => reduce::run(&args),
        Command::Order(args) => order::run(&args),
        Command::Covariance(args) => covariance::run(&args),
        Command::Verify(args) => verify::run(&args),
    }
}

fn write_json<P: AsRef<Path>, T: serde::Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
