use crate::error::{InferError, InferResult};
use ndarray::{Array4, Zip};

/// `Y[i] = max(0, X[i])`, elementwise over the full buffer.
pub fn relu(x: &Array4<f32>) -> Array4<f32> {
    let mut out = x.clone();
    par_zip_map_inplace(&mut out, |v| {
        if *v < 0.0 {
            *v = 0.0;
        }
    });
    out
}

/// `Y = A + B`, elementwise; both operands must share the same shape
/// (no broadcasting).
pub fn add(a: &Array4<f32>, b: &Array4<f32>) -> InferResult<Array4<f32>> {
    if a.dim() != b.dim() {
        let (an, ac, ah, aw) = a.dim();
        let (bn, bc, bh, bw) = b.dim();
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![an, ac, ah, aw],
            actual: vec![bn, bc, bh, bw],
        });
    }
    Ok(a + b)
}

/// Inference-mode batch normalization, with per-channel `factor`/`offset`
/// precomputed once before the elementwise pass.
pub fn batch_normalization(
    x: &Array4<f32>,
    scale: &[f32],
    bias: &[f32],
    mean: &[f32],
    var: &[f32],
    epsilon: f32,
) -> InferResult<Array4<f32>> {
    let (n, c, h, w) = x.dim();
    if scale.len() != c || bias.len() != c || mean.len() != c || var.len() != c {
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![c],
            actual: vec![scale.len(), bias.len(), mean.len(), var.len()]
                .into_iter()
                .max()
                .into_iter()
                .collect(),
        });
    }

    let factors: Vec<f32> = (0..c).map(|ci| scale[ci] / (var[ci] + epsilon).sqrt()).collect();
    let offsets: Vec<f32> = (0..c).map(|ci| bias[ci] - mean[ci] * factors[ci]).collect();

    let mut out = Array4::<f32>::zeros((n, c, h, w));
    for ni in 0..n {
        for ci in 0..c {
            let factor = factors[ci];
            let offset = offsets[ci];
            for hi in 0..h {
                for wi in 0..w {
                    out[[ni, ci, hi, wi]] = x[[ni, ci, hi, wi]] * factor + offset;
                }
            }
        }
    }
    Ok(out)
}

/// Reshapes (N, C, H, W) into (N, C·H·W, 1, 1), a bitwise copy of the
/// underlying row-major buffer.
pub fn flatten(x: &Array4<f32>) -> Array4<f32> {
    let (n, c, h, w) = x.dim();
    let flat = x.iter().copied().collect::<Vec<f32>>();
    Array4::from_shape_vec((n, c * h * w, 1, 1), flat).expect("flatten preserves element count")
}

#[cfg(feature = "parallel")]
fn par_zip_map_inplace(arr: &mut Array4<f32>, f: impl Fn(&mut f32) + Sync + Send) {
    Zip::from(arr).par_for_each(f);
}

#[cfg(not(feature = "parallel"))]
fn par_zip_map_inplace(arr: &mut Array4<f32>, f: impl Fn(&mut f32)) {
    Zip::from(arr).for_each(f);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_zeroes_negatives() {
        let x = Array4::from_shape_vec((1, 1, 1, 3), vec![-1.0, 0.0, 2.0]).unwrap();
        let y = relu(&x);
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn relu_is_idempotent() {
        let x = Array4::from_shape_vec((1, 1, 1, 3), vec![-1.0, 0.0, 2.0]).unwrap();
        let once = relu(&x);
        let twice = relu(&once);
        assert_eq!(once.iter().collect::<Vec<_>>(), twice.iter().collect::<Vec<_>>());
    }

    #[test]
    fn add_requires_matching_shapes() {
        let a = Array4::zeros((1, 1, 1, 2));
        let b = Array4::zeros((1, 1, 1, 3));
        let err = add(&a, &b).unwrap_err();
        assert!(matches!(err, InferError::ShapeError { .. }));
    }

    #[test]
    fn batch_norm_identity_with_unit_scale_and_zero_epsilon() {
        let x = Array4::from_shape_vec((1, 2, 1, 1), vec![1.0, 2.0]).unwrap();
        let y = batch_normalization(&x, &[1.0, 1.0], &[0.0, 0.0], &[0.0, 0.0], &[1.0, 1.0], 0.0).unwrap();
        assert!((y[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((y[[0, 1, 0, 0]] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn batch_norm_applies_affine_transform() {
        let x = Array4::from_shape_vec((1, 1, 1, 1), vec![3.0]).unwrap();
        let y = batch_normalization(&x, &[2.0], &[1.0], &[1.0], &[3.0], 1.0).unwrap();
        // factor = 2 / sqrt(3+1) = 1.0, offset = 1 - 1*1 = 0 -> y = 3*1 + 0 = 3
        assert!((y[[0, 0, 0, 0]] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn flatten_preserves_element_count_and_byte_order() {
        let x = Array4::from_shape_vec((1, 2, 2, 2), (0..8).map(|v| v as f32).collect()).unwrap();
        let y = flatten(&x);
        assert_eq!(y.dim(), (1, 8, 1, 1));
        assert_eq!(
            x.iter().copied().collect::<Vec<_>>(),
            y.iter().copied().collect::<Vec<_>>()
        );
    }
}
