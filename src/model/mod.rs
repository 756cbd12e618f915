//! In-memory representation the wire decoder (`crate::wire`) is parsed
//! into, plus the parser itself.

pub mod node;
mod parser;

pub use node::{Attribute, AttributeValue, Node};
pub use parser::parse_model;

use crate::tensor::Tensor;

/// Ordered sequence of nodes and initializers, plus the declared input and
/// output names.
#[derive(Debug, Default)]
pub struct Graph {
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    pub initializers: Vec<Tensor>,
    pub input_name: String,
    pub output_name: String,
}

/// Owns exactly one [`Graph`]; every other top-level field in the file is
/// decoded-and-discarded.
#[derive(Debug, Default)]
pub struct Model {
    pub graph: Graph,
}

/// Maps an ONNX tensor rank to the fixed 4D (n, c, h, w) shape this engine
/// always operates in.
pub fn dims_to_nchw(dims: &[i64]) -> crate::error::InferResult<(usize, usize, usize, usize)> {
    use crate::error::InferError;
    let d = |i: usize| -> usize { dims.get(i).copied().unwrap_or(1).max(0) as usize };
    match dims.len() {
        0 => Ok((1, 1, 1, 1)),
        1 => Ok((1, 1, 1, d(0))),
        2 => Ok((1, 1, d(0), d(1))),
        3 => Ok((1, d(0), d(1), d(2))),
        4 => Ok((d(0), d(1), d(2), d(3))),
        n => Err(InferError::ParseError {
            offset: 0,
            what: format!("tensor rank {n} exceeds the supported maximum of 4"),
        }),
    }
}
