//! Dense-numeric kernels for the operator set a residual classification
//! network needs. Every function here is a pure function of its input
//! tensors and attributes: no I/O, no shared state. With the `parallel`
//! feature (on by default) the channel-parallel loops in [`conv2d`] and
//! [`max_pool2d`] run over `ndarray`'s rayon-backed axis iterators, in the
//! same spirit as this codebase's existing `Zip::par_for_each` kernels;
//! without it, everything runs on the caller's thread.

mod conv;
mod elementwise;
mod gemm;
mod pool;

pub use conv::conv2d;
pub use elementwise::{add, batch_normalization, flatten, relu};
pub use gemm::gemm;
pub use pool::{global_average_pool, max_pool2d};
