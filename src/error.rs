use thiserror::Error;

#[derive(Error, Debug)]
pub enum MushError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Split error: {0}")]
    Split(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, MushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = MushError::Dataset("no rows".to_string());
        assert_eq!(err.to_string(), "Dataset error: no rows");

        let err = MushError::InvalidInput("unknown feature 'colour'".to_string());
        assert_eq!(err.to_string(), "Invalid input: unknown feature 'colour'");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "mushroom.csv");
        let err: MushError = io.into();
        assert!(matches!(err, MushError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }
}
