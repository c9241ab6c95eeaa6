use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use spotred_report::model_matrices;

use super::{build_task, load_task_file};
use crate::write_json;

#[derive(Args, Debug)]
pub struct CovarianceArgs {
    /// YAML task definition.
    #[arg(long)]
    pub task: PathBuf,
    /// Destination JSON file.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &CovarianceArgs) -> Result<(), Box<dyn Error>> {
    let task = build_task(load_task_file(&args.task)?, Vec::new(), |_| {})?;
    let matrices = model_matrices(task.parameters());
    write_json(&args.out, &matrices)?;
    log::info!(
        "wrote matrices for {} models to {}",
        matrices.len(),
        args.out.display()
    );
    Ok(())
}
