//! Separable Gaussian smoothing of merged fields.
//!
//! Unset (NaN) samples neither contribute nor get filled: each set sample is
//! the weighted mean of the set samples in its window, with the kernel weights
//! renormalized over what is present.

use rayon::prelude::*;

use common::Buffer2;

use crate::config::SmoothingConfig;

const ROWS_PER_CHUNK: usize = 32;

/// Normalized 1-D Gaussian of `2 * radius + 1` taps.
pub fn gaussian_kernel_1d(sigma: f32, radius: usize) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

#[inline]
fn weighted_mean(kernel: &[f32], center: usize, len: usize, sample: impl Fn(usize) -> f32) -> f32 {
    let radius = kernel.len() / 2;
    let start = center.saturating_sub(radius);
    let end = (center + radius).min(len - 1);

    let mut sum = 0.0f32;
    let mut weight_sum = 0.0f32;
    for i in start..=end {
        let v = sample(i);
        if !v.is_nan() {
            let w = kernel[i + radius - center];
            sum += v * w;
            weight_sum += w;
        }
    }
    sum / weight_sum
}

fn smooth_rows(input: &Buffer2<f32>, kernel: &[f32]) -> Buffer2<f32> {
    let width = input.width();
    let mut output = vec![f32::NAN; input.len()];
    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(width).enumerate() {
                let row = input.row(y_start + local_y);
                for (x, out) in out_row.iter_mut().enumerate() {
                    if !row[x].is_nan() {
                        *out = weighted_mean(kernel, x, width, |i| row[i]);
                    }
                }
            }
        });
    Buffer2::new(width, input.height(), output)
}

fn smooth_columns(input: &Buffer2<f32>, kernel: &[f32]) -> Buffer2<f32> {
    let (width, height) = input.size();
    let mut output = vec![f32::NAN; input.len()];
    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                for (x, out) in out_row.iter_mut().enumerate() {
                    if !input[(x, y)].is_nan() {
                        *out = weighted_mean(kernel, y, height, |i| input[(x, i)]);
                    }
                }
            }
        });
    Buffer2::new(width, height, output)
}

/// Smooths along x, then along y.
pub fn smooth(field: &Buffer2<f32>, config: &SmoothingConfig) -> Buffer2<f32> {
    if field.is_empty() || config.radius == 0 {
        return field.clone();
    }
    let kernel = gaussian_kernel_1d(config.sigma, config.radius);
    smooth_columns(&smooth_rows(field, &kernel), &kernel)
}
