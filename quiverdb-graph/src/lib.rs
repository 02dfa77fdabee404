//! In-memory property-graph storage for QuiverDB.
//!
//! The [`Store`] owns all nodes and edges by id; entities reference each
//! other by id, never by shared pointers. Label and relationship-type
//! indexes give O(1) candidate lookup, and [`Store::snapshot`] /
//! [`Store::restore`] capture and replay the entire observable state, which
//! is also what the transaction layer and the persistence codecs build on.

pub mod codec;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use snapshot::{EdgeRecord, NodeRecord, Snapshot};
pub use store::{Edge, EdgeId, EdgeSpec, Node, NodeId, Store};
pub use value::Value;
