//! Zero-normalized cross-correlation template matching.
//!
//! Scores every placement of a template fully inside the search image. Window
//! means and energies come from summed-area tables, so only the numerator is
//! computed per template pixel.

use rayon::prelude::*;

use common::Buffer2;

/// Output rows per parallel chunk.
const ROWS_PER_CHUNK: usize = 8;

/// Windows or templates with less energy than this are flat and score 0.
const MIN_ENERGY: f64 = 1e-12;

/// Summed-area tables of values and squared values, padded by one zero row/column.
struct IntegralImage {
    sums: Buffer2<f64>,
    squares: Buffer2<f64>,
}

impl IntegralImage {
    fn new(image: &Buffer2<f32>) -> Self {
        let (width, height) = image.size();
        let mut sums = Buffer2::new_filled(width + 1, height + 1, 0.0f64);
        let mut squares = Buffer2::new_filled(width + 1, height + 1, 0.0f64);

        for y in 0..height {
            let mut row_sum = 0.0;
            let mut row_squares = 0.0;
            for x in 0..width {
                let v = image[(x, y)] as f64;
                row_sum += v;
                row_squares += v * v;
                sums[(x + 1, y + 1)] = sums[(x + 1, y)] + row_sum;
                squares[(x + 1, y + 1)] = squares[(x + 1, y)] + row_squares;
            }
        }

        Self { sums, squares }
    }

    #[inline]
    fn window(table: &Buffer2<f64>, x: usize, y: usize, width: usize, height: usize) -> f64 {
        table[(x + width, y + height)] - table[(x, y + height)] - table[(x + width, y)]
            + table[(x, y)]
    }
}

/// Correlation peak position (top-left corner of the best placement).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Correlation surface of `template` over `image`.
///
/// The output is `(iw - tw + 1) x (ih - th + 1)`; entry `(x, y)` scores the
/// template placed with its top-left corner at `(x, y)`. Scores lie in [-1, 1].
///
/// # Panics
///
/// Panics if the template is empty or larger than the image.
pub fn match_template(image: &Buffer2<f32>, template: &Buffer2<f32>) -> Buffer2<f32> {
    let (iw, ih) = image.size();
    let (tw, th) = template.size();
    assert!(
        tw > 0 && th > 0 && tw <= iw && th <= ih,
        "template {}x{} must fit inside image {}x{}",
        tw,
        th,
        iw,
        ih
    );

    let out_w = iw - tw + 1;
    let out_h = ih - th + 1;
    let n = (tw * th) as f64;

    let t_mean = template.iter().map(|&v| v as f64).sum::<f64>() / n;
    let centered: Vec<f64> = template.iter().map(|&v| v as f64 - t_mean).collect();
    let t_energy: f64 = centered.iter().map(|v| v * v).sum();
    let integral = IntegralImage::new(image);

    let mut scores = vec![0.0f32; out_w * out_h];
    if t_energy < MIN_ENERGY {
        return Buffer2::new(out_w, out_h, scores);
    }

    scores
        .par_chunks_mut(out_w * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(out_w).enumerate() {
                let y = y_start + local_y;
                for (x, out) in out_row.iter_mut().enumerate() {
                    let sum = IntegralImage::window(&integral.sums, x, y, tw, th);
                    let sum_sq = IntegralImage::window(&integral.squares, x, y, tw, th);
                    let w_energy = sum_sq - sum * sum / n;
                    if w_energy < MIN_ENERGY {
                        *out = 0.0;
                        continue;
                    }

                    // Sum of centered template times raw window equals the
                    // covariance numerator because the centered template sums to 0.
                    let mut numerator = 0.0f64;
                    for ty in 0..th {
                        let t_row = &centered[ty * tw..(ty + 1) * tw];
                        let i_row = &image.row(y + ty)[x..x + tw];
                        numerator += t_row
                            .iter()
                            .zip(i_row)
                            .map(|(&t, &v)| t * v as f64)
                            .sum::<f64>();
                    }

                    *out = (numerator / (t_energy * w_energy).sqrt()).clamp(-1.0, 1.0) as f32;
                }
            }
        });

    Buffer2::new(out_w, out_h, scores)
}

/// Highest score; ties go to the first occurrence in row-major order.
pub fn find_peak(scores: &Buffer2<f32>) -> Peak {
    let mut best = Peak {
        x: 0,
        y: 0,
        score: f32::NEG_INFINITY,
    };
    for (y, row) in scores.rows().enumerate() {
        for (x, &score) in row.iter().enumerate() {
            if score > best.score {
                best = Peak { x, y, score };
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::textured_image;

    #[test]
    fn test_exact_patch_scores_one_at_its_origin() {
        let image = textured_image(40, 30, 7);
        let template = image.crop(13, 9, 8, 8);
        let scores = match_template(&image, &template);
        assert_eq!(scores.size(), (33, 23));

        let peak = find_peak(&scores);
        assert_eq!((peak.x, peak.y), (13, 9));
        assert!((peak.score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_score_is_invariant_to_gain_and_offset() {
        let image = textured_image(24, 24, 3);
        let template = image.crop(5, 11, 6, 6).map(|v| v * 3.0 + 10.0);
        let peak = find_peak(&match_template(&image, &template));
        assert_eq!((peak.x, peak.y), (5, 11));
        assert!(peak.score > 0.999);
    }

    #[test]
    fn test_scores_are_bounded() {
        let image = textured_image(20, 20, 11);
        let template = textured_image(5, 5, 12);
        let scores = match_template(&image, &template);
        assert!(scores.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_flat_template_scores_zero_everywhere() {
        let image = textured_image(10, 10, 1);
        let template = Buffer2::new_filled(4, 4, 0.5f32);
        let scores = match_template(&image, &template);
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_peak_ties_resolve_row_major() {
        let scores = Buffer2::new(3, 2, vec![0.1, 0.9, 0.2, 0.9, 0.3, 0.9]);
        let peak = find_peak(&scores);
        assert_eq!((peak.x, peak.y), (1, 0));

        let flat = Buffer2::new_filled(4, 4, 0.0f32);
        assert_eq!((find_peak(&flat).x, find_peak(&flat).y), (0, 0));
    }

    #[test]
    fn test_full_size_template_has_single_placement() {
        let image = textured_image(6, 5, 2);
        let scores = match_template(&image, &image);
        assert_eq!(scores.size(), (1, 1));
        assert!((scores[(0, 0)] - 1.0).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "must fit inside image")]
    fn test_oversized_template_panics() {
        let image = textured_image(6, 6, 2);
        match_template(&image, &textured_image(7, 3, 2));
    }
}
