//! CLIP image tower served through ONNX Runtime

use hf_hub::api::tokio::Api;
use image::DynamicImage;
use ort::{
  execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProviderDispatch,
  },
  session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
  value::Tensor,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::preprocess::{preprocess, INPUT_SIZE};
use super::{Embedding, ImageEncoder};
use crate::config::{Device, Settings};
use crate::error::{RecommendError, RecommendResult};

const INPUT_NAME: &str = "pixel_values";
const OUTPUT_NAME: &str = "image_embeds";

pub struct ClipImageEncoder {
  session: Mutex<Session>,
  dimension: usize,
  model_id: String,
}

// Model initialization
#[cfg(not(tarpaulin_include))]
impl ClipImageEncoder {
  /// Load the vision model named by the settings, downloading it if needed
  pub async fn load(settings: &Settings) -> RecommendResult<Self> {
    let (model_path, model_id) = match &settings.model_path {
      Some(path) => (path.clone(), path.display().to_string()),
      None => {
        let path = Self::download_model(&settings.model_repo, &settings.model_file).await?;
        (path, format!("{}/{}", settings.model_repo, settings.model_file))
      }
    };

    let device = settings.device;
    let threads = settings.encoder_workers;
    tokio::task::spawn_blocking(move || Self::from_file(&model_path, model_id, device, threads))
      .await
      .map_err(|e| RecommendError::encoder_unavailable(format!("model loader panicked: {e}")))?
  }

  /// Create a session from a local ONNX file and probe its output dimension
  pub fn from_file(
    model_path: &Path,
    model_id: String,
    device: Device,
    intra_threads: usize,
  ) -> RecommendResult<Self> {
    if !model_path.is_file() {
      return Err(RecommendError::encoder_unavailable(format!(
        "model file not found: {}",
        model_path.display()
      )));
    }

    info!("Loading image encoder from {}", model_path.display());
    let session = Self::build_session(model_path, device, intra_threads)
      .map_err(|e| RecommendError::encoder_unavailable(format!("failed to create session: {e}")))?;

    let mut encoder = Self { session: Mutex::new(session), dimension: 0, model_id };
    encoder.dimension = encoder.probe_dimension()?;
    info!("Image encoder ready ({}-dimensional embeddings)", encoder.dimension);

    Ok(encoder)
  }

  async fn download_model(repo_name: &str, file: &str) -> RecommendResult<PathBuf> {
    let api = Api::new()
      .map_err(|e| RecommendError::encoder_unavailable(format!("HF API initialization failed: {e}")))?;

    info!("Fetching {file} from {repo_name}");
    api
      .model(repo_name.to_string())
      .get(file)
      .await
      .map_err(|e| RecommendError::encoder_unavailable(format!("failed to download model: {e}")))
  }

  fn build_session(model_path: &Path, device: Device, intra_threads: usize) -> ort::Result<Session> {
    Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(intra_threads.max(1))?
      .with_execution_providers(Self::execution_providers(device))?
      .commit_from_file(model_path)
  }

  /// Run a blank image through the model once so the output width is known up front
  fn probe_dimension(&self) -> RecommendResult<usize> {
    let blank = DynamicImage::new_rgb8(INPUT_SIZE, INPUT_SIZE);
    let raw = self.run(&blank)?;
    if raw.is_empty() {
      return Err(RecommendError::encoder_unavailable("model produced an empty embedding"));
    }
    Ok(raw.len())
  }
}

// Hardware selection
#[cfg(not(tarpaulin_include))]
impl ClipImageEncoder {
  fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();

    match device {
      Device::Cpu => {}
      Device::Cuda => providers.push(CUDAExecutionProvider::default().build().error_on_failure()),
      Device::Coreml => providers.push(CoreMLExecutionProvider::default().build().error_on_failure()),
      Device::Auto => {
        #[cfg(target_os = "macos")]
        {
          providers.push(CoreMLExecutionProvider::default().build());
        }

        #[cfg(target_os = "linux")]
        {
          if Self::is_cuda_available() {
            providers.push(CUDAExecutionProvider::default().build());
          }
        }
      }
    }

    providers.push(CPUExecutionProvider::default().build());
    providers
  }

  #[cfg(target_os = "linux")]
  fn is_cuda_available() -> bool {
    std::process::Command::new("nvidia-smi")
      .output()
      .map(|output| output.status.success())
      .unwrap_or(false)
  }
}

// Inference
impl ClipImageEncoder {
  fn run(&self, image: &DynamicImage) -> RecommendResult<Vec<f32>> {
    let pixels = preprocess(image, INPUT_SIZE);
    let input = Tensor::from_array(pixels)
      .map_err(|e| RecommendError::encoder_unavailable(format!("failed to build input tensor: {e}")))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| RecommendError::encoder_unavailable("encoder session lock poisoned"))?;
    let outputs = session
      .run(ort::inputs![INPUT_NAME => input])
      .map_err(|e| RecommendError::encoder_unavailable(format!("inference failed: {e}")))?;

    extract_embedding(&outputs)
  }
}

fn extract_embedding(outputs: &SessionOutputs<'_>) -> RecommendResult<Vec<f32>> {
  let output = match outputs.get(OUTPUT_NAME) {
    Some(value) => value,
    None => {
      debug!("No {OUTPUT_NAME} output, falling back to the first model output");
      &outputs[0]
    }
  };

  let (shape, data) = output
    .try_extract_tensor::<f32>()
    .map_err(|e| RecommendError::encoder_unavailable(format!("unexpected model output: {e}")))?;

  match &shape[..] {
    [1, dim] | [dim] if *dim as usize == data.len() => Ok(data.to_vec()),
    other => Err(RecommendError::encoder_unavailable(format!(
      "expected a single pooled embedding, got output shape {other:?}"
    ))),
  }
}

impl ImageEncoder for ClipImageEncoder {
  fn embed(&self, image: &DynamicImage) -> RecommendResult<Embedding> {
    let raw = self.run(image)?;
    if raw.len() != self.dimension {
      return Err(RecommendError::DimensionMismatch { expected: self.dimension, actual: raw.len() });
    }
    Embedding::from_raw(&raw)
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_id(&self) -> String {
    self.model_id.clone()
  }
}
