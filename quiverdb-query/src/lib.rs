//! Cypher parsing and execution for QuiverDB.
//!
//! [`parse`] turns query text into an AST; [`executor::execute`] runs the
//! AST against a [`quiverdb_graph::Store`] and yields a [`QueryResult`].

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod result;

use std::collections::BTreeMap;

use quiverdb_graph::Value;

pub use error::{Error, Result};
pub use executor::{Binding, Row, execute, MAX_VAR_LENGTH_HOPS};
pub use result::{QueryResult, Record};

/// Query parameters: `$name` placeholders resolve against this map.
pub type Params = BTreeMap<String, Value>;

pub fn parse(cypher: &str) -> Result<ast::Query> {
    parser::Parser::parse(cypher)
}
