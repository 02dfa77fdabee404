//! Error and result types for the query crate.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Malformed query text: byte offset into the source plus a message.
    Parse { offset: usize, message: String },
    /// A function name the evaluator does not know.
    UnknownFunction(String),
    /// A known function called with the wrong number of arguments.
    ArgumentError {
        function: String,
        expected: &'static str,
        got: usize,
    },
    /// A variable referenced before any clause bound it.
    UnboundVariable(String),
    /// An error surfaced by the underlying store.
    Graph(quiverdb_graph::Error),
    Other(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse { offset, message } => {
                write!(f, "parse error at offset {offset}: {message}")
            }
            Error::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            Error::ArgumentError {
                function,
                expected,
                got,
            } => write!(f, "{function} expects {expected} argument(s), got {got}"),
            Error::UnboundVariable(name) => write!(f, "variable not bound: {name}"),
            Error::Graph(err) => write!(f, "{err}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<quiverdb_graph::Error> for Error {
    fn from(err: quiverdb_graph::Error) -> Self {
        Error::Graph(err)
    }
}
