use crate::observability::metrics::record_jwks_request;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use common::jwks::JwkSet;
use std::sync::Arc;
use tracing::instrument;

/// Cache lifetime advertised to JWKS consumers.
pub const JWKS_CACHE_CONTROL: &str = "max-age=300";

/// Handle JWKS request
///
/// GET /.well-known/jwks.json
///
/// Returns the authority's public signing key in JWKS format (RFC 7517).
/// The key is held in memory, so this never fails.
#[instrument(name = "us.jwks.get", skip_all)]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<JwkSet>) {
    record_jwks_request();

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(JWKS_CACHE_CONTROL));

    (headers, Json(state.token_issuer.jwks()))
}
