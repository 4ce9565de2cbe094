//! ONNX Runtime backend for neural network checkpoints

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

/// Loaded ONNX session with its resolved input/output names
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .finish()
    }
}

/// Raw tensor returned by a session run
#[derive(Debug, Clone)]
pub struct OnnxOutput {
    pub shape: Vec<i64>,
    pub data: Vec<f64>,
}

impl OnnxModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(path)
            .context(format!("Failed to load ONNX graph from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        // Prefer an explicitly named prediction output, else the first one
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("output") || o.name.contains("variable"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "output".to_string());

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }

    /// Run a single row through the graph
    pub fn run(&mut self, row: &[f64]) -> Result<OnnxOutput> {
        let shape = vec![1_i64, row.len() as i64];
        let values: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, values)).context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output = outputs
            .get(self.output_name.as_str())
            .context(format!("Graph produced no output named {}", self.output_name))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .context("Output is not a float tensor")?;

        let result = OnnxOutput {
            shape: shape.iter().copied().collect(),
            data: data.iter().map(|&v| v as f64).collect(),
        };
        debug!(shape = ?result.shape, "ONNX inference complete");
        Ok(result)
    }
}
