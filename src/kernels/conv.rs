use crate::error::{InferError, InferResult};
use ndarray::Array4;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 2D convolution with stride, symmetric padding, dilation, optional bias,
/// and `group == 1` or depthwise (`group == Cin == Cout`), per ONNX Conv
/// semantics.
///
/// `x`: (N, Cin, Hin, Win). `w`: (Cout, Cin/group, kH, kW). `bias`: length
/// `Cout`, if present.
pub fn conv2d(
    x: &Array4<f32>,
    w: &Array4<f32>,
    bias: Option<&[f32]>,
    stride: (usize, usize),
    pad: (usize, usize),
    dilation: (usize, usize),
    group: i64,
) -> InferResult<Array4<f32>> {
    let (n, cin, hin, win) = x.dim();
    let (cout, cin_per_group, kh, kw) = w.dim();
    let (sh, sw) = stride;
    let (ph, pw) = pad;
    let (dh, dw) = dilation;

    let depthwise = group == cin as i64 && group == cout as i64;
    if group != 1 && !depthwise {
        return Err(InferError::UnsupportedAttributeValue {
            op_type: "Conv".to_string(),
            attr: "group".to_string(),
            value: group.to_string(),
        });
    }
    if depthwise && cin_per_group != 1 {
        return Err(InferError::UnsupportedAttributeValue {
            op_type: "Conv".to_string(),
            attr: "group".to_string(),
            value: group.to_string(),
        });
    }

    let h_out = conv_output_len(hin, ph, dh, kh, sh)?;
    let w_out = conv_output_len(win, pw, dw, kw, sw)?;

    let mut out = Array4::<f32>::zeros((n, cout, h_out, w_out));

    for ni in 0..n {
        let planes: Vec<Vec<f32>> = compute_channels(0..cout, |oc| {
            let mut plane = vec![0.0f32; h_out * w_out];
            for oh in 0..h_out {
                for ow in 0..w_out {
                    let mut sum = 0.0f32;
                    if depthwise {
                        let ic = oc;
                        sum += conv_window_sum(x, w, ni, ic, oc, 0, oh, ow, sh, sw, ph, pw, dh, dw, kh, kw);
                    } else {
                        for ic in 0..cin {
                            sum += conv_window_sum(x, w, ni, ic, oc, ic, oh, ow, sh, sw, ph, pw, dh, dw, kh, kw);
                        }
                    }
                    if let Some(b) = bias {
                        sum += b[oc];
                    }
                    plane[oh * w_out + ow] = sum;
                }
            }
            plane
        });

        for (oc, plane) in planes.into_iter().enumerate() {
            for oh in 0..h_out {
                for ow in 0..w_out {
                    out[[ni, oc, oh, ow]] = plane[oh * w_out + ow];
                }
            }
        }
    }

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn conv_window_sum(
    x: &Array4<f32>,
    w: &Array4<f32>,
    ni: usize,
    ic: usize,
    oc: usize,
    w_ic: usize,
    oh: usize,
    ow: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    dh: usize,
    dw: usize,
    kh: usize,
    kw: usize,
) -> f32 {
    let (_, _, hin, win) = x.dim();
    let mut sum = 0.0f32;
    for khi in 0..kh {
        let in_h = oh as i64 * sh as i64 - ph as i64 + khi as i64 * dh as i64;
        if in_h < 0 || in_h >= hin as i64 {
            continue;
        }
        for kwi in 0..kw {
            let in_w = ow as i64 * sw as i64 - pw as i64 + kwi as i64 * dw as i64;
            if in_w < 0 || in_w >= win as i64 {
                continue;
            }
            sum += x[[ni, ic, in_h as usize, in_w as usize]] * w[[oc, w_ic, khi, kwi]];
        }
    }
    sum
}

fn conv_output_len(in_len: usize, pad: usize, dilation: usize, kernel: usize, stride: usize) -> InferResult<usize> {
    let effective_kernel = dilation * (kernel - 1) + 1;
    let numerator = in_len as i64 + 2 * pad as i64 - effective_kernel as i64 - 1;
    if numerator < 0 {
        return Err(InferError::ShapeError {
            node: 0,
            expected: vec![kernel],
            actual: vec![in_len],
        });
    }
    Ok((numerator / stride as i64) as usize + 1)
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
