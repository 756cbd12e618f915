use crate::error::{InferError, InferResult};
use ndarray::Array4;

/// General matrix multiply, per ONNX Gemm semantics:
/// `Y = alpha * op(A) * op(B) + beta * C`.
///
/// `a` and `b` are read as logical 2D matrices: `a` has physical shape
/// `(a.dim().0, a.dim().1 * a.dim().2 * a.dim().3)`, `b` has physical shape
/// `(b.dim().2, b.dim().3)` with `b.dim().0 * b.dim().1 == 1` required.
/// `op(_)` transposes its operand when the matching `trans` flag is set.
/// `bias`, if present, has length `N` and broadcasts across the `M` output
/// rows. Output shape is `(M, 1, 1, N)`.
#[allow(clippy::too_many_arguments)]
pub fn gemm(
    a: &Array4<f32>,
    b: &Array4<f32>,
    bias: Option<&[f32]>,
    alpha: f32,
    beta: f32,
    trans_a: bool,
    trans_b: bool,
) -> InferResult<Array4<f32>> {
    let (an, ac, ah, aw) = a.dim();
    let (bn, bc, bh, bw) = b.dim();
    if bn * bc != 1 {
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![1, 1],
            actual: vec![bn, bc],
        });
    }

    let a_rows = an;
    let a_cols = ac * ah * aw;
    let (a_r, a_c) = if trans_a { (a_cols, a_rows) } else { (a_rows, a_cols) };

    let b_rows = bh;
    let b_cols = bw;
    let (b_r, b_c) = if trans_b { (b_cols, b_rows) } else { (b_rows, b_cols) };

    if a_c != b_r {
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![a_c],
            actual: vec![b_r],
        });
    }

    let m = a_r;
    let k = a_c;
    let n = b_c;

    if let Some(bias) = bias {
        if bias.len() != n {
            return Err(InferError::ShapeError {
                node: 0,
                expected: vec![n],
                actual: vec![bias.len()],
            });
        }
    }

    let a_flat: Vec<f32> = a.iter().copied().collect();
    let b_flat: Vec<f32> = b.iter().copied().collect();

    let a_at = |r: usize, c: usize| -> f32 {
        if trans_a {
            a_flat[c * a_cols + r]
        } else {
            a_flat[r * a_cols + c]
        }
    };
    let b_at = |r: usize, c: usize| -> f32 {
        if trans_b {
            b_flat[c * b_cols + r]
        } else {
            b_flat[r * b_cols + c]
        }
    };

    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a_at(i, p) * b_at(p, j);
            }
            sum *= alpha;
            if let Some(bias) = bias {
                sum += beta * bias[j];
            }
            out[i * n + j] = sum;
        }
    }

    Ok(Array4::from_shape_vec((m, 1, 1, n), out).expect("gemm output sized from m*n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trans_b_matches_standard_matmul_against_transposed_b() {
        // A: (2,2) as (N=2,C=2,H=1,W=1); B: (2,3) logically, stored transposed as (N=1,C=1,H=3,W=2)
        let a = Array4::from_shape_vec((2, 2, 1, 1), vec![1., 2., 3., 4.]).unwrap();
        let b = Array4::from_shape_vec((1, 1, 3, 2), vec![1., 2., 3., 4., 5., 6.]).unwrap();
        // op(B) with transB=true is B^T: (2,3) = [[1,3,5],[2,4,6]]
        let y = gemm(&a, &b, None, 1.0, 0.0, false, true).unwrap();
        assert_eq!(y.dim(), (2, 1, 1, 3));
        // row0 = [1,2] . cols of B^T -> [1*1+2*2, 1*3+2*4, 1*5+2*6] = [5, 11, 17]
        let expected = [5., 11., 17., 11., 25., 39.];
        for (got, want) in y.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4);
        }
    }

    #[test]
    fn bias_scaled_by_beta_and_broadcast_across_rows() {
        let a = Array4::from_shape_vec((1, 1, 1, 2), vec![1., 1.]).unwrap();
        let b = Array4::from_shape_vec((1, 1, 2, 1), vec![1., 1.]).unwrap();
        let y = gemm(&a, &b, Some(&[10.0]), 1.0, 2.0, false, false).unwrap();
        assert!((y[[0, 0, 0, 0]] - 22.0).abs() < 1e-6);
    }

    #[test]
    fn trans_a_transposes_the_logical_matrix() {
        let a = Array4::from_shape_vec((2, 1, 1, 2), vec![1., 2., 3., 4.]).unwrap();
        let b = Array4::from_shape_vec((1, 1, 2, 1), vec![1., 0.]).unwrap();
        // a physically (2,2) row-major: [[1,2],[3,4]], transA => op(a) = [[1,3],[2,4]]
        let y = gemm(&a, &b, None, 1.0, 0.0, true, false).unwrap();
        assert_eq!(y.dim(), (2, 1, 1, 1));
        assert!((y[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((y[[1, 0, 0, 0]] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_inner_dimension_is_a_shape_error() {
        let a = Array4::from_shape_vec((1, 1, 1, 3), vec![1., 2., 3.]).unwrap();
        let b = Array4::from_shape_vec((1, 1, 2, 1), vec![1., 1.]).unwrap();
        let err = gemm(&a, &b, None, 1.0, 0.0, false, false).unwrap_err();
        assert!(matches!(err, InferError::ShapeError { .. }));
    }
}
