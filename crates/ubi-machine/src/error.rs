use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("machine {0:?} does not exist")]
    NotFound(String),

    #[error("machine {0:?} already exists")]
    AlreadyExists(String),

    #[error("invalid machine name {0:?}: use letters, digits, '-', '.' and '_'")]
    InvalidName(String),

    #[error("store error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt machine record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    #[error(transparent)]
    Driver(#[from] ubi_driver::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
