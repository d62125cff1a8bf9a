//! HTTP client for a running wardrobe server
//!
//! Lets the CLI send a query image to a remote server instead of loading the
//! encoder and gallery locally.

use anyhow::{anyhow, Context, Result};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

use crate::server::handlers::recommend::UPLOAD_FIELD;
use crate::server::types::{ErrorResponse, GalleryResponse, RecommendResponse, StatusResponse};

/// Configuration for the wardrobe HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Base URL of the server (e.g., "http://127.0.0.1:8000")
  pub base_url: String,
  /// Request timeout in seconds
  pub timeout_secs: u64,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self { base_url: "http://127.0.0.1:8000".to_string(), timeout_secs: 60 }
  }
}

impl ClientConfig {
  pub fn for_url(base_url: &str) -> Self {
    Self { base_url: base_url.trim_end_matches('/').to_string(), ..Self::default() }
  }
}

pub struct RecommendClient {
  client: Client,
  config: ClientConfig,
}

impl RecommendClient {
  pub fn with_config(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .context("Failed to create HTTP client")?;

    Ok(Self { client, config })
  }

  /// Upload an image file and return the server's ranked matches
  pub async fn recommend(&self, image: &Path, k: Option<i64>) -> Result<RecommendResponse> {
    let bytes = tokio::fs::read(image).await.with_context(|| format!("Failed to read {}", image.display()))?;
    let file_name = image.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "upload".to_string());

    self.recommend_bytes(bytes, file_name, k).await
  }

  pub async fn recommend_bytes(&self, bytes: Vec<u8>, file_name: String, k: Option<i64>) -> Result<RecommendResponse> {
    let form = multipart::Form::new().part(UPLOAD_FIELD, multipart::Part::bytes(bytes).file_name(file_name));

    let mut request = self.client.post(format!("{}/api/recommend", self.config.base_url)).multipart(form);
    if let Some(k) = k {
      request = request.query(&[("k", k)]);
    }

    let response = request.send().await.with_context(|| format!("Could not reach {}", self.config.base_url))?;
    parse(response).await
  }

  pub async fn status(&self) -> Result<StatusResponse> {
    let response = self.client.get(format!("{}/status", self.config.base_url)).send().await?;
    parse(response).await
  }

  pub async fn gallery(&self) -> Result<GalleryResponse> {
    let response = self.client.get(format!("{}/api/gallery", self.config.base_url)).send().await?;
    parse(response).await
  }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
  let status = response.status();
  if status.is_success() {
    return Ok(response.json::<T>().await?);
  }

  let message = match response.json::<ErrorResponse>().await {
    Ok(body) => body.error,
    Err(_) => "no error details".to_string(),
  };
  Err(anyhow!("Server returned {status}: {message}"))
}
