//! Relay endpoints forwarding query strings to the upstream API.
//!
//! Lets a browser front end talk to the API from its own origin.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
  Json, Router,
  extract::{RawQuery, State},
  http::StatusCode,
  routing::get,
};
use serde_json::Value;
use tower_http::trace::{self, TraceLayer};

use crate::fetch::FetchError;
use crate::fetch::client::RefugesClient;

type RelayResult = std::result::Result<Json<Value>, (StatusCode, String)>;

async fn relay(client: &RefugesClient, endpoint: &str, query: Option<String>) -> RelayResult {
  client
    .relay(endpoint, query.as_deref().unwrap_or_default())
    .await
    .map(Json)
    .map_err(|e| {
      tracing::warn!("Relaying {endpoint} failed: {e}");
      match e {
        FetchError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
      }
    })
}

async fn bbox(State(client): State<Arc<RefugesClient>>, RawQuery(query): RawQuery) -> RelayResult {
  relay(&client, "bbox", query).await
}

async fn contributions(
  State(client): State<Arc<RefugesClient>>,
  RawQuery(query): RawQuery,
) -> RelayResult {
  relay(&client, "contributions", query).await
}

async fn healthcheck() {}

#[must_use]
pub fn router(client: Arc<RefugesClient>) -> Router {
  Router::new()
    .route("/api/refuges/bbox", get(bbox))
    .route("/api/refuges/contributions", get(contributions))
    .route("/healthcheck", get(healthcheck))
    .with_state(client)
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    )
}

/// Serves the relay on localhost until the process ends.
pub async fn serve(client: RefugesClient, port: u16) -> Result<()> {
  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  let listener = tokio::net::TcpListener::bind(addr).await?;
  tracing::info!(
    "Relaying {} on http://{}",
    client.base_url(),
    listener.local_addr()?
  );
  axum::serve(listener, router(Arc::new(client))).await?;
  Ok(())
}
