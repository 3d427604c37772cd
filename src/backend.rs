//! Boundary to the external detector used for training and inference.
//!
//! No detector lives in this crate. Callers plug one in through
//! [`TrainingBackend`] / [`InferenceBackend`] and drive it with
//! [`run_training`] / [`run_inference`], which check inputs and time the call.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{ReduceError, Result};

/// Training hyper-parameters, usually read from a `hyp.yaml` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub task: String,
    pub epochs: u32,
    pub batch: u32,
    pub imgsz: u32,
    pub optimizer: String,
    pub device: String,
    /// Save a checkpoint every N epochs, negative disables
    #[serde(default = "default_save_period")]
    pub save_period: i32,
    #[serde(default)]
    pub workers: u32,
    /// Training time budget in hours, overrides `epochs` when set
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub pretrained: bool,
    #[serde(default)]
    pub cache: bool,
}

fn default_save_period() -> i32 {
    -1
}

impl HyperParams {
    /// Load and validate hyper-parameters from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ReduceError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| ReduceError::io(path, e))?;
        let params: HyperParams = serde_yaml::from_reader(BufReader::new(file))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ReduceError::Configuration(
                "epochs must be greater than zero".to_string(),
            ));
        }
        if self.batch == 0 {
            return Err(ReduceError::Configuration(
                "batch must be greater than zero".to_string(),
            ));
        }
        if self.imgsz == 0 {
            return Err(ReduceError::Configuration(
                "imgsz must be greater than zero".to_string(),
            ));
        }
        if self.time.is_some_and(|hours| hours <= 0.0) {
            return Err(ReduceError::Configuration(
                "time must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trains a model from a weights file and a data configuration
pub trait TrainingBackend {
    type Metrics;

    fn train(
        &mut self,
        model: &Path,
        data_config: &Path,
        params: &HyperParams,
    ) -> std::result::Result<Self::Metrics, String>;
}

/// Runs a trained model on one image
pub trait InferenceBackend {
    type Detections;

    fn predict(&mut self, weights: &Path, image: &Path)
        -> std::result::Result<Self::Detections, String>;
}

/// A backend result with the wall-clock time the call took
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

fn require_file(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ReduceError::SourceNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Validate inputs and run one training job
pub fn run_training<B: TrainingBackend>(
    backend: &mut B,
    model: &Path,
    data_config: &Path,
    params: &HyperParams,
) -> Result<Timed<B::Metrics>> {
    require_file(model)?;
    require_file(data_config)?;
    params.validate()?;

    info!(
        "Training {} for {} epochs (batch {}, imgsz {}, device {})",
        model.display(),
        params.epochs,
        params.batch,
        params.imgsz,
        params.device
    );
    let start = Instant::now();
    let value = backend
        .train(model, data_config, params)
        .map_err(ReduceError::Backend)?;
    let elapsed = start.elapsed();
    info!("Training finished in {:.2}s", elapsed.as_secs_f64());

    Ok(Timed { value, elapsed })
}

/// Validate inputs and run inference on one image
pub fn run_inference<B: InferenceBackend>(
    backend: &mut B,
    weights: &Path,
    image: &Path,
) -> Result<Timed<B::Detections>> {
    require_file(weights)?;
    require_file(image)?;

    let start = Instant::now();
    let value = backend
        .predict(weights, image)
        .map_err(ReduceError::Backend)?;
    let elapsed = start.elapsed();
    info!(
        "Inference on {} took {:.3}s",
        image.display(),
        elapsed.as_secs_f64()
    );

    Ok(Timed { value, elapsed })
}
