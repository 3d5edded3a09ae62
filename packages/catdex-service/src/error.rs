use catdex_storage::models::Direction;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to parse timestamp {value:?}: {message}")]
	Parse { value: String, message: String },
	#[error("No indexed record anchors the {direction} watermark. Run a full reindex first.")]
	NoWatermark { direction: Direction },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Catalog error: {message}")]
	Catalog { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
}
impl Error {
	/// Only failures of remote collaborators are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Catalog { .. } | Self::Provider { .. } | Self::Index { .. })
	}

	pub(crate) fn catalog(err: catdex_providers::Error) -> Self {
		match err {
			catdex_providers::Error::InvalidRequest { message } => Self::InvalidRequest { message },
			other => Self::Catalog { message: other.to_string() },
		}
	}
}

impl From<catdex_providers::Error> for Error {
	fn from(err: catdex_providers::Error) -> Self {
		match err {
			catdex_providers::Error::InvalidRequest { message } => Self::InvalidRequest { message },
			other => Self::Provider { message: other.to_string() },
		}
	}
}

impl From<catdex_storage::Error> for Error {
	fn from(err: catdex_storage::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
