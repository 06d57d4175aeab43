//! Resampling merged fields from the reference onto the deformed configuration.

use rayon::prelude::*;

use common::Buffer2;

const ROWS_PER_CHUNK: usize = 32;

/// Interpolates `(a, ia)` .. `(b, ib)` at index `i`.
#[inline]
fn lerp_at(a: f32, ia: usize, b: f32, ib: usize, i: usize) -> f32 {
    let t = (i - ia) as f32 / (ib - ia) as f32;
    a + (b - a) * t
}

/// For every index below `len`, the nearest set index before and after it.
fn neighbours(len: usize, is_set: impl Fn(usize) -> bool) -> Vec<(Option<usize>, Option<usize>)> {
    let mut result = vec![(None, None); len];
    let mut last = None;
    for (i, entry) in result.iter_mut().enumerate() {
        entry.0 = last;
        if is_set(i) {
            last = Some(i);
        }
    }
    let mut next = None;
    for (i, entry) in result.iter_mut().enumerate().rev() {
        entry.1 = next;
        if is_set(i) {
            next = Some(i);
        }
    }
    result
}

/// Fills unset samples from their nearest set neighbours.
///
/// A gap is interpolated along its row and along its column when set samples
/// bound it on both sides; the fill is the mean of the available estimates.
/// Gaps open towards the border are not extrapolated and stay unset.
pub fn fill_linear(field: &Buffer2<f32>) -> Buffer2<f32> {
    let (width, height) = field.size();
    let mut sums = Buffer2::new_filled(width, height, 0.0f32);
    let mut counts = Buffer2::new_filled(width, height, 0u8);

    for y in 0..height {
        let row = field.row(y);
        let bounds = neighbours(width, |i| !row[i].is_nan());
        for (x, (before, after)) in bounds.into_iter().enumerate() {
            if let (true, Some(a), Some(b)) = (row[x].is_nan(), before, after) {
                sums[(x, y)] += lerp_at(row[a], a, row[b], b, x);
                counts[(x, y)] += 1;
            }
        }
    }
    for x in 0..width {
        let column = |i: usize| field[(x, i)];
        let bounds = neighbours(height, |i| !column(i).is_nan());
        for (y, (before, after)) in bounds.into_iter().enumerate() {
            if let (true, Some(a), Some(b)) = (column(y).is_nan(), before, after) {
                sums[(x, y)] += lerp_at(column(a), a, column(b), b, y);
                counts[(x, y)] += 1;
            }
        }
    }

    Buffer2::from_fn(width, height, |x, y| match counts[(x, y)] {
        0 => field[(x, y)],
        n => sums[(x, y)] / n as f32,
    })
}

/// Backward nearest-sample warp.
///
/// `u` and `v` are displacements in pixels on the same sampling grid as `field`;
/// `spacing` is the pixel distance between samples. Output sample `(x, y)` reads
/// input sample `(round(x - u / spacing), round(y - v / spacing))`. Samples that
/// map outside the grid or have no displacement are unset.
pub fn warp_nearest(
    field: &Buffer2<f32>,
    u: &Buffer2<f32>,
    v: &Buffer2<f32>,
    spacing: f32,
) -> Buffer2<f32> {
    assert!(
        field.same_size(u) && field.same_size(v),
        "displacement must share the field's sampling grid"
    );
    let width = field.width();
    if field.is_empty() {
        return field.clone();
    }

    let mut output = vec![f32::NAN; field.len()];
    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in chunk.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                for (x, out) in out_row.iter_mut().enumerate() {
                    let (du, dv) = (u[(x, y)], v[(x, y)]);
                    if du.is_nan() || dv.is_nan() {
                        continue;
                    }
                    let sx = (x as f32 - du / spacing).round() as i64;
                    let sy = (y as f32 - dv / spacing).round() as i64;
                    if let Some(&value) = field.checked_get(sx, sy) {
                        *out = value;
                    }
                }
            }
        });
    Buffer2::new(width, field.height(), output)
}
