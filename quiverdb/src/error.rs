use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] quiverdb_graph::Error),

    #[error(transparent)]
    Query(#[from] quiverdb_query::Error),

    #[error("a transaction is already active")]
    NestedTransaction,

    #[error("no active transaction")]
    NoActiveTransaction,
}
