use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use spotred_report::{to_canonical_json_bytes, ReductionReport};
use spotred_task::{OvercountMode, ReductionHandle};

use super::{build_task, load_spots, load_task_file};
use crate::write_json;

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// YAML task definition.
    #[arg(long)]
    pub task: PathBuf,
    /// JSON array of spots.
    #[arg(long)]
    pub spots: PathBuf,
    /// Output directory for the report and summary.
    #[arg(long)]
    pub out: PathBuf,
    /// Overcount correction overriding the task file (`none`, `207`, `208`).
    #[arg(long)]
    pub mode: Option<OvercountMode>,
    /// Spread per-spot stages across a thread pool.
    #[arg(long, default_value_t = false)]
    pub parallel: bool,
    /// Worker threads when running in parallel; zero lets the pool decide.
    #[arg(long)]
    pub threads: Option<usize>,
    /// Progress polling interval in milliseconds.
    #[arg(long, default_value_t = 200)]
    pub poll_ms: u64,
}

pub fn run(args: &ReduceArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let file = load_task_file(&args.task)?;
    let spots = load_spots(&args.spots)?;
    let task = build_task(file, spots, |config| {
        if let Some(mode) = args.mode {
            config.overcount_mode = mode;
        }
        if args.parallel {
            config.parallel = true;
        }
        if let Some(threads) = args.threads {
            config.threads = threads;
        }
    })?;

    let handle = ReductionHandle::spawn(task);
    while !handle.is_finished() {
        let progress = handle.progress();
        log::info!("evaluated {}/{}", progress.completed(), progress.total());
        thread::sleep(Duration::from_millis(args.poll_ms.max(1)));
    }
    let task = handle.join()?;

    let report = ReductionReport::from_task(&task)?;
    fs::write(args.out.join("report.json"), to_canonical_json_bytes(&report)?)?;

    let summary = json!({
        "task": report.task,
        "overcount_mode": report.overcount_mode,
        "report_hash": report.report_hash,
        "spots": report.spots.len(),
        "records": report.records(),
    });
    write_json(args.out.join("summary.json"), &summary)?;
    log::info!("report {} written to {}", report.report_hash, args.out.display());
    Ok(())
}
