use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use spotred_expr::Stage;

use super::{build_task, load_task_file};

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// YAML task definition.
    #[arg(long)]
    pub task: PathBuf,
    /// Group the order into evaluation stages.
    #[arg(long, default_value_t = false)]
    pub stages: bool,
}

pub fn run(args: &OrderArgs) -> Result<(), Box<dyn Error>> {
    let task = build_task(load_task_file(&args.task)?, Vec::new(), |_| {})?;
    if args.stages {
        for (index, stage) in task.order().stages(task.registry()).iter().enumerate() {
            match stage {
                Stage::PerSpot(names) => println!("{index}\tper-spot\t{}", names.join(", ")),
                Stage::Summary(name) => println!("{index}\tsummary\t{name}"),
            }
        }
    } else {
        for (index, name) in task.order().names().iter().enumerate() {
            println!("{index}\t{name}");
        }
    }
    Ok(())
}
