//! Request context and middleware for the REST API
//!
//! Every request gets a [`RequestContext`] in its extensions so handlers can
//! tag their log lines with the same request id the middleware logs.

use axum::{
  extract::Request,
  http::{HeaderValue, Method, Uri},
  middleware::Next,
  response::Response,
};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub user_agent: String,
}

impl RequestContext {
  pub fn from_request(request: &Request) -> Self {
    let user_agent = request
      .headers()
      .get("user-agent")
      .and_then(|v| v.to_str().ok())
      .unwrap_or("none")
      .to_string();

    Self {
      request_id: Uuid::new_v4(),
      method: request.method().clone(),
      uri: request.uri().clone(),
      user_agent,
    }
  }
}

/// Middleware to inject RequestContext into all requests and log their outcome
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
  let context = RequestContext::from_request(&request);
  let start_time = Instant::now();

  info!(
    request_id = %context.request_id,
    method = %context.method,
    path = context.uri.path(),
    user_agent = context.user_agent.as_str(),
    "Request started"
  );

  request.extensions_mut().insert(context.clone());
  let mut response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  let status = response.status();
  if status.is_server_error() {
    warn!(request_id = %context.request_id, status = status.as_u16(), duration_ms, "Request failed");
  } else {
    info!(request_id = %context.request_id, status = status.as_u16(), duration_ms, "Request completed");
  }

  if let Ok(value) = HeaderValue::from_str(&context.request_id.to_string()) {
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
  }
  response
}
