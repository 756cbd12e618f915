use crate::error::{InferError, InferResult};
use ndarray::Array4;

/// An owned, dense 4D float buffer in NCHW layout, carrying the name it is
/// registered under in a [`crate::symtab::SymbolTable`].
///
/// Backed by `ndarray::Array4<f32>`, which already guarantees row-major
/// contiguous storage with the conventional `(c*h*w, h*w, w, 1)` strides,
/// so no custom buffer type is needed.
#[derive(Clone, Debug)]
pub struct Tensor {
    name: String,
    data: Array4<f32>,
}

impl Tensor {
    pub fn new(name: impl Into<String>, data: Array4<f32>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn zeros(name: impl Into<String>, dims: (usize, usize, usize, usize)) -> Self {
        Self::new(name, Array4::zeros(dims))
    }

    /// Builds a tensor from a flat row-major buffer, failing if its length
    /// does not equal the product of the requested dimensions.
    pub fn from_vec(
        name: impl Into<String>,
        dims: (usize, usize, usize, usize),
        buf: Vec<f32>,
    ) -> InferResult<Self> {
        let expected = dims.0 * dims.1 * dims.2 * dims.3;
        if buf.len() != expected {
            return Err(InferError::ParseError {
                offset: 0,
                what: format!(
                    "tensor buffer length {} does not match dims {:?} (expected {})",
                    buf.len(),
                    dims,
                    expected
                ),
            });
        }
        let data = Array4::from_shape_vec(dims, buf).map_err(|e| InferError::ParseError {
            offset: 0,
            what: format!("failed to build tensor: {e}"),
        })?;
        Ok(Self::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn shape(&self) -> [usize; 4] {
        let (n, c, h, w) = self.data.dim();
        [n, c, h, w]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array4<f32> {
        &mut self.data
    }

    pub fn as_slice(&self) -> InferResult<&[f32]> {
        self.data.as_slice().ok_or_else(|| InferError::ParseError {
            offset: 0,
            what: "tensor is not contiguous".to_string(),
        })
    }

    /// Returns false if any element is NaN or infinite; used by callers
    /// validating a network's final output.
    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
