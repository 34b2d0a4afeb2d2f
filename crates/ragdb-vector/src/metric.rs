//! Exact similarity math for flat search.

use ragdb_core::Metric;

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Squared Euclidean distance (what flat L2 indices report).
pub fn l2_sq(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum() }

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > f32::EPSILON { for x in v.iter_mut() { *x /= norm; } }
}

pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}

/// Native score of `stored` against `query` under `metric`.
pub fn score(metric: Metric, query: &[f32], stored: &[f32]) -> f32 {
    match metric {
        Metric::L2 => l2_sq(query, stored),
        Metric::InnerProduct => dot(query, stored),
    }
}
