//! Lanczos3 downscaling.
//!
//! Separable: one horizontal pass, then one vertical pass. The kernel is
//! stretched by the scale factor so every input pixel contributes (no aliasing).
//! Unset (NaN) inputs are skipped and the remaining weights renormalized; an
//! output pixel with no set input in its support stays unset.

use std::f32::consts::PI;
use std::sync::OnceLock;

use rayon::prelude::*;

use common::Buffer2;

const ROWS_PER_CHUNK: usize = 32;

/// Lanczos lobes.
const LANCZOS_A: usize = 3;

/// Kernel samples per unit interval.
const LUT_RESOLUTION: usize = 4096;

/// Weight sums below this are treated as "no data".
const MIN_WEIGHT: f32 = 1e-6;

#[inline]
fn lanczos_kernel_direct(x: f32, a: f32) -> f32 {
    if x.abs() < 1e-6 {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }

    let pi_x = PI * x;
    let pi_x_a = pi_x / a;

    (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
}

static LANCZOS3_LUT: OnceLock<Vec<f32>> = OnceLock::new();

#[inline]
fn lanczos3(x: f32) -> f32 {
    let lut = LANCZOS3_LUT.get_or_init(|| {
        (0..=LANCZOS_A * LUT_RESOLUTION)
            .map(|i| lanczos_kernel_direct(i as f32 / LUT_RESOLUTION as f32, LANCZOS_A as f32))
            .collect()
    });
    let abs_x = x.abs();
    if abs_x >= LANCZOS_A as f32 {
        return 0.0;
    }
    lut[(abs_x * LUT_RESOLUTION as f32 + 0.5) as usize]
}

/// Input taps of one output coordinate.
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

fn taps(input_len: usize, output_len: usize) -> Vec<Taps> {
    let scale = input_len as f32 / output_len as f32;
    let support = LANCZOS_A as f32 * scale.max(1.0);

    (0..output_len)
        .map(|out| {
            let center = (out as f32 + 0.5) * scale - 0.5;
            let start = (center - support).ceil().max(0.0) as usize;
            let end = ((center + support).floor() as usize).min(input_len - 1);
            let weights = (start..=end)
                .map(|i| lanczos3((i as f32 - center) / scale.max(1.0)))
                .collect();
            Taps { start, weights }
        })
        .collect()
}

#[inline]
fn apply(taps: &Taps, sample: impl Fn(usize) -> f32) -> f32 {
    let mut sum = 0.0f32;
    let mut weight_sum = 0.0f32;
    for (k, &w) in taps.weights.iter().enumerate() {
        let v = sample(taps.start + k);
        if !v.is_nan() {
            sum += v * w;
            weight_sum += w;
        }
    }
    if weight_sum.abs() < MIN_WEIGHT {
        f32::NAN
    } else {
        sum / weight_sum
    }
}

/// Downscales `image` by an integer `factor`. Output is `max(1, w / factor) x max(1, h / factor)`.
///
/// # Panics
///
/// Panics if `factor` is 0.
pub fn downscale(image: &Buffer2<f32>, factor: u32) -> Buffer2<f32> {
    assert!(factor > 0, "scale factor must be positive");
    if factor == 1 || image.is_empty() {
        return image.clone();
    }

    let (width, height) = image.size();
    let out_w = (width / factor as usize).max(1);
    let out_h = (height / factor as usize).max(1);

    let x_taps = taps(width, out_w);
    let mut horizontal = vec![0.0f32; out_w * height];
    horizontal
        .par_chunks_mut(out_w * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(out_w).enumerate() {
                let row = image.row(y_start + local_y);
                for (out, t) in out_row.iter_mut().zip(&x_taps) {
                    *out = apply(t, |i| row[i]);
                }
            }
        });
    let horizontal = Buffer2::new(out_w, height, horizontal);

    let y_taps = taps(height, out_h);
    let mut output = vec![0.0f32; out_w * out_h];
    output
        .par_chunks_mut(out_w * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(out_w).enumerate() {
                let t = &y_taps[y_start + local_y];
                for (x, out) in out_row.iter_mut().enumerate() {
                    *out = apply(t, |i| horizontal[(x, i)]);
                }
            }
        });

    Buffer2::new(out_w, out_h, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::textured_image;

    #[test]
    fn test_kernel_shape() {
        assert_eq!(lanczos3(0.0), 1.0);
        assert!(lanczos3(1.0).abs() < 1e-3);
        assert!(lanczos3(2.0).abs() < 1e-3);
        assert_eq!(lanczos3(3.0), 0.0);
        assert_eq!(lanczos3(-4.5), 0.0);
        assert!(lanczos3(1.5) < 0.0);
    }

    #[test]
    fn test_output_dimensions() {
        let image = textured_image(190, 37, 1);
        assert_eq!(downscale(&image, 2).size(), (95, 18));
        assert_eq!(downscale(&image, 4).size(), (47, 9));
        assert_eq!(downscale(&image, 64).size(), (2, 1));
        assert_eq!(downscale(&image, 1), image);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let image = Buffer2::new_filled(64, 48, 0.75f32);
        let small = downscale(&image, 4);
        assert!(small.iter().all(|&v| (v - 0.75).abs() < 1e-5));
    }

    #[test]
    fn test_unset_pixels_are_skipped() {
        // Left half unset, right half constant.
        let image = Buffer2::from_fn(40, 20, |x, _| if x < 20 { f32::NAN } else { 2.0 });
        let small = downscale(&image, 2);
        assert!(small[(0, 5)].is_nan());
        assert!((small[(19, 5)] - 2.0).abs() < 1e-5);
        assert!((small[(10, 5)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_average_is_preserved() {
        let image = textured_image(128, 128, 8);
        let small = downscale(&image, 4);
        let mean = |b: &Buffer2<f32>| b.iter().map(|&v| v as f64).sum::<f64>() / b.len() as f64;
        assert!((mean(&image) - mean(&small)).abs() < 0.01);
    }
}
