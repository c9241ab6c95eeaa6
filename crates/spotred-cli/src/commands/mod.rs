pub mod covariance;
pub mod order;
pub mod reduce;
pub mod verify;

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use spotred_core::{ParameterSet, ParametersModel, Spot};
use spotred_expr::Expression;
use spotred_report::{from_json_slice, from_yaml_slice};
use spotred_task::{Task, TaskConfig};

/// YAML layout of a task definition.
#[derive(Debug, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub config: TaskConfig,
    #[serde(default)]
    pub parameters: Vec<ParametersModel>,
    #[serde(default)]
    pub expressions: Vec<Expression>,
}

pub fn load_task_file(path: &Path) -> Result<TaskFile, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(from_yaml_slice(&bytes)?)
}

pub fn load_spots(path: &Path) -> Result<Vec<Spot>, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(from_json_slice(&bytes)?)
}

/// Builds a task from a task file, adjusting its configuration first.
pub fn build_task(
    file: TaskFile,
    spots: Vec<Spot>,
    adjust: impl FnOnce(&mut TaskConfig),
) -> Result<Task, Box<dyn Error>> {
    let mut config = file.config;
    adjust(&mut config);
    let parameters = file
        .parameters
        .into_iter()
        .fold(ParameterSet::new(), ParameterSet::with_model);
    Ok(Task::new(config, parameters, file.expressions, spots)?)
}
