use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node {0} not found")]
    NodeNotFound(u64),

    #[error("edge {0} not found")]
    EdgeNotFound(u64),

    #[error("missing endpoint node {0}")]
    MissingNode(u64),

    #[error("node id {0} already exists")]
    DuplicateId(u64),

    #[error("invalid snapshot magic")]
    InvalidMagic,

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    #[error("snapshot corrupted: {0}")]
    Corrupt(&'static str),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
