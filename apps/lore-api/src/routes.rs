use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use lore_service::{Error, SearchOptions, SearchResponse};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(flatten)]
	pub options: SearchOptions,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&payload.query, payload.options).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::RetrievalFailed { .. } => {
				tracing::error!(error = %message, "Search failed on every retrieval source.");

				Self::new(StatusCode::SERVICE_UNAVAILABLE, "retrieval_unavailable", message)
			},
			Error::Provider { .. } => Self::new(StatusCode::BAD_GATEWAY, "provider_error", message),
			Error::ProviderMismatch { .. } => {
				tracing::error!(error = %message, "Provider response does not fit the deployment.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "provider_mismatch", message)
			},
			Error::Storage { .. } | Error::Qdrant { .. } => {
				tracing::error!(error = %message, "Search failed on storage.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
			Error::Timeout { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "timeout", message),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
