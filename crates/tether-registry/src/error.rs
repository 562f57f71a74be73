/// Errors returned by registry backends.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  #[error("registry item '{id}' not found in {table}")]
  NotFound { table: String, id: String },

  /// The backing store failed.
  #[error("registry backend error: {message}")]
  Backend { message: String },

  #[error("registry item serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}
