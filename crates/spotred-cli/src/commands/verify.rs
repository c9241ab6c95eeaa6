use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use spotred_report::{from_json_slice, ReductionReport};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Report written by `spotred reduce`.
    #[arg(long)]
    pub report: PathBuf,
}

pub fn run(args: &VerifyArgs) -> Result<(), Box<dyn Error>> {
    let report: ReductionReport = from_json_slice(&fs::read(&args.report)?)?;
    if !report.verify_hash()? {
        return Err(format!("report hash mismatch in {}", args.report.display()).into());
    }
    println!("{}", report.report_hash);
    Ok(())
}
