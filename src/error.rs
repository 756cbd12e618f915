use thiserror::Error;

/// The crate's single error type. Every fallible operation in the decoder,
/// parser, symbol table, attribute accessors, and kernels returns this.
#[derive(Error, Debug)]
pub enum InferError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("parse error at byte {offset}: {what}")]
    ParseError { offset: usize, what: String },

    #[error("shape error at node {node}: expected {expected:?}, found {actual:?}")]
    ShapeError {
        node: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unknown tensor name: {name}")]
    UnknownName { name: String },

    #[error("duplicate tensor name: {name}")]
    DuplicateName { name: String },

    #[error("unsupported operator {op_type} at node {node_index}")]
    UnsupportedOperator { op_type: String, node_index: usize },

    #[error("unsupported attribute value for {op_type}.{attr}: {value}")]
    UnsupportedAttributeValue {
        op_type: String,
        attr: String,
        value: String,
    },

    #[error("attribute type mismatch for {op_type}.{attr}")]
    AttributeTypeMismatch { op_type: String, attr: String },
}

pub type InferResult<T> = Result<T, InferError>;
