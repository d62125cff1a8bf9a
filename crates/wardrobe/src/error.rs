use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendError {
  #[error("Failed to decode image: {message}")]
  Decode { message: String },

  #[error("Image encoder unavailable: {message}")]
  EncoderUnavailable { message: String },

  #[error("Encoder produced a degenerate embedding (norm {norm:e})")]
  DegenerateEmbedding { norm: f64 },

  #[error("Embedding dimension mismatch: gallery has {expected}, query has {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("Gallery artifacts are inconsistent: {message}")]
  GalleryInconsistent { message: String },

  #[error("Gallery identifier {identifier:?} cannot be stored in a line-delimited list")]
  InvalidIdentifier { identifier: String },

  #[error("Encoding did not finish within {seconds}s")]
  Timeout { seconds: u64 },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type RecommendResult<T> = Result<T, RecommendError>;

impl RecommendError {
  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode { message: message.into() }
  }

  pub fn encoder_unavailable(message: impl Into<String>) -> Self {
    Self::EncoderUnavailable { message: message.into() }
  }

  pub fn gallery_inconsistent(message: impl Into<String>) -> Self {
    Self::GalleryInconsistent { message: message.into() }
  }

  /// HTTP status reported to clients when this error ends a request
  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::Decode { .. } => StatusCode::BAD_REQUEST,
      Self::DegenerateEmbedding { .. } => StatusCode::UNPROCESSABLE_ENTITY,
      Self::EncoderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
      Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
      Self::DimensionMismatch { .. }
      | Self::GalleryInconsistent { .. }
      | Self::InvalidIdentifier { .. }
      | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Whether a cached gallery that produced this error should be rebuilt
  pub fn invalidates_cache(&self) -> bool {
    matches!(
      self,
      Self::GalleryInconsistent { .. } | Self::DimensionMismatch { .. } | Self::Io(_)
    )
  }
}
