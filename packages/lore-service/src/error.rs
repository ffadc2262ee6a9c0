pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	/// A provider answered with a shape that cannot match the deployment, such as the wrong
	/// embedding dimension. Retrying cannot fix it.
	#[error("Provider misconfigured: {message}")]
	ProviderMismatch { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
	#[error("All retrieval sources failed. vector: {vector}; lexical: {lexical}")]
	RetrievalFailed { vector: String, lexical: String },
}
impl Error {
	/// Whether another attempt against the same source could succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::Provider { .. }
				| Self::Storage { .. }
				| Self::Qdrant { .. }
				| Self::Timeout { .. }
		)
	}
}

impl From<lore_storage::Error> for Error {
	fn from(err: lore_storage::Error) -> Self {
		match err {
			lore_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			lore_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			lore_storage::Error::NotFound(message) => Self::NotFound { message },
			lore_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<lore_providers::Error> for Error {
	fn from(err: lore_providers::Error) -> Self {
		let message = err.to_string();

		match err {
			lore_providers::Error::InvalidConfig { .. }
			| lore_providers::Error::InvalidHeaderName(_)
			| lore_providers::Error::InvalidHeaderValue(_) => Self::ProviderMismatch { message },
			_ => Self::Provider { message },
		}
	}
}
