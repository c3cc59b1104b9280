use thiserror::Error;

/// Core error types shared by the storefront crates
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
