use crate::error::{InferError, InferResult};
use ndarray::Array4;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Max pooling with stride and symmetric padding; out-of-bounds window
/// positions are treated as −∞ and so never win the max.
pub fn max_pool2d(
    x: &Array4<f32>,
    kernel: (usize, usize),
    stride: (usize, usize),
    pad: (usize, usize),
) -> InferResult<Array4<f32>> {
    let (n, c, hin, win) = x.dim();
    let (kh, kw) = kernel;
    let (sh, sw) = stride;
    let (ph, pw) = pad;

    let h_out = pool_output_len(hin, ph, kh, sh)?;
    let w_out = pool_output_len(win, pw, kw, sw)?;

    let mut out = Array4::<f32>::zeros((n, c, h_out, w_out));

    for ni in 0..n {
        let planes: Vec<Vec<f32>> = compute_channels(0..c, |ci| {
            let mut plane = vec![f32::NEG_INFINITY; h_out * w_out];
            for oh in 0..h_out {
                for ow in 0..w_out {
                    let mut max_val = f32::NEG_INFINITY;
                    for khi in 0..kh {
                        let in_h = oh as i64 * sh as i64 - ph as i64 + khi as i64;
                        if in_h < 0 || in_h >= hin as i64 {
                            continue;
                        }
                        for kwi in 0..kw {
                            let in_w = ow as i64 * sw as i64 - pw as i64 + kwi as i64;
                            if in_w < 0 || in_w >= win as i64 {
                                continue;
                            }
                            let v = x[[ni, ci, in_h as usize, in_w as usize]];
                            if v > max_val {
                                max_val = v;
                            }
                        }
                    }
                    plane[oh * w_out + ow] = max_val;
                }
            }
            plane
        });

        for (ci, plane) in planes.into_iter().enumerate() {
            for oh in 0..h_out {
                for ow in 0..w_out {
                    out[[ni, ci, oh, ow]] = plane[oh * w_out + ow];
                }
            }
        }
    }

    Ok(out)
}

fn pool_output_len(in_len: usize, pad: usize, kernel: usize, stride: usize) -> InferResult<usize> {
    let numerator = in_len as i64 + 2 * pad as i64 - kernel as i64;
    if numerator < 0 {
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![kernel],
            actual: vec![in_len],
        });
    }
    Ok((numerator / stride as i64) as usize + 1)
}

/// Global average pool: (N, C, H, W) → (N, C, 1, 1), the mean of every
/// spatial activation per (n, c).
pub fn global_average_pool(x: &Array4<f32>) -> InferResult<Array4<f32>> {
    let (n, c, h, w) = x.dim();
    let count = (h * w) as f32;
    let mut out = Array4::<f32>::zeros((n, c, 1, 1));
    for ni in 0..n {
        for ci in 0..c {
            let mut sum = 0.0f32;
            for hi in 0..h {
                for wi in 0..w {
                    sum += x[[ni, ci, hi, wi]];
                }
            }
            out[[ni, ci, 0, 0]] = sum / count;
        }
    }
    Ok(out)
}

#[cfg(feature = "parallel")]
fn compute_channels<T, F>(range: std::ops::Range<usize>, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    range.into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn compute_channels<T, F>(range: std::ops::Range<usize>, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    range.map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_average_pool_computes_the_spatial_mean() {
        let x = Array4::from_shape_vec((1, 1, 2, 2), vec![1., 2., 3., 4.]).unwrap();
        let y = global_average_pool(&x).unwrap();
        assert_eq!(y.dim(), (1, 1, 1, 1));
        assert!((y[[0, 0, 0, 0]] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn max_pool_basic_window() {
        let x = Array4::from_shape_vec((1, 1, 4, 4), (0..16).map(|v| v as f32).collect()).unwrap();
        let y = max_pool2d(&x, (2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(y.dim(), (1, 1, 2, 2));
        assert!((y[[0, 0, 0, 0]] - 5.0).abs() < 1e-6);
        assert!((y[[0, 0, 1, 1]] - 15.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_window_positions_do_not_win_the_max() {
        let x = Array4::from_shape_vec((1, 1, 1, 1), vec![-5.0]).unwrap();
        let y = max_pool2d(&x, (3, 3), (1, 1), (1, 1)).unwrap();
        assert_eq!(y.dim(), (1, 1, 1, 1));
        assert!((y[[0, 0, 0, 0]] - (-5.0)).abs() < 1e-6);
    }
}
