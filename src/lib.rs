//! A CPU-only inference engine for a fixed, small subset of ONNX opset 12:
//! enough to run a ResNet-50 v1-shaped residual classifier end to end. The
//! wire decoder is hand-rolled (no protobuf codegen); kernels run on dense
//! `ndarray` buffers in NCHW layout, optionally parallelized per output
//! channel with `rayon` under the `parallel` feature.

pub mod error;
pub mod interpreter;
pub mod kernels;
pub mod model;
pub mod symtab;
pub mod tensor;
pub mod wire;

pub use error::{InferError, InferResult};
pub use interpreter::run;
pub use model::{parse_model, Model};
pub use tensor::Tensor;
