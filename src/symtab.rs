use crate::error::{InferError, InferResult};
use crate::tensor::Tensor;

/// Name → owned tensor map for the lifetime of a single inference call.
/// Linear scan is acceptable at the scale this engine runs at (low
/// thousands of entries); a hash index would be a drop-in optimization
/// without changing observable behavior.
pub struct SymbolTable {
    entries: Vec<(String, Tensor)>,
}

impl SymbolTable {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cap),
        }
    }

    /// Takes ownership of `tensor`, failing if `name` is already registered.
    pub fn register(&mut self, name: impl Into<String>, tensor: Tensor) -> InferResult<()> {
        let name = name.into();
        if self.entries.iter().any(|(n, _)| n == &name) {
            return Err(InferError::DuplicateName { name });
        }
        self.entries.push((name, tensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> InferResult<&Tensor> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
            .ok_or_else(|| InferError::UnknownName {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the table and returns the tensor registered under `name`,
    /// used by the interpreter to move the final output out without an
    /// extra clone.
    pub fn into_tensor(mut self, name: &str) -> InferResult<Tensor> {
        if let Some(pos) = self.entries.iter().position(|(n, _)| n == name) {
            Ok(self.entries.swap_remove(pos).1)
        } else {
            Err(InferError::UnknownName {
                name: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_round_trips() {
        let mut t = SymbolTable::with_capacity(4);
        t.register("x", Tensor::zeros("x", (1, 1, 1, 1))).unwrap();
        assert!(t.get("x").is_ok());
    }

    #[test]
    fn duplicate_register_fails() {
        let mut t = SymbolTable::with_capacity(4);
        t.register("x", Tensor::zeros("x", (1, 1, 1, 1))).unwrap();
        let err = t
            .register("x", Tensor::zeros("x", (1, 1, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, InferError::DuplicateName { .. }));
    }

    #[test]
    fn missing_lookup_fails() {
        let t = SymbolTable::with_capacity(4);
        let err = t.get("missing").unwrap_err();
        assert!(matches!(err, InferError::UnknownName { .. }));
    }

    #[test]
    fn into_tensor_moves_the_named_entry_out() {
        let mut t = SymbolTable::with_capacity(4);
        t.register("a", Tensor::zeros("a", (1, 1, 1, 1))).unwrap();
        t.register("b", Tensor::zeros("b", (1, 1, 1, 2))).unwrap();
        let out = t.into_tensor("b").unwrap();
        assert_eq!(out.shape(), [1, 1, 1, 2]);
    }
}
