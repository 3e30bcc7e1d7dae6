pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<scholar_storage::Error> for Error {
	fn from(err: scholar_storage::Error) -> Self {
		match err {
			scholar_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			scholar_storage::Error::Unavailable(message) => Self::Storage { message },
			scholar_storage::Error::Qdrant(inner) => Self::Storage { message: inner.to_string() },
		}
	}
}
impl From<scholar_providers::Error> for Error {
	fn from(err: scholar_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
