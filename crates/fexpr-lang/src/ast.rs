pub mod error;
pub mod node;
pub mod parser;

/// A parsed expression; one expression text yields one tree.
pub type Program = node::Node;
