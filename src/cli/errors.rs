use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Extraction(#[from] eozonal::Error),
}
