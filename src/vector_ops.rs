use crate::config::{Number, EPSILON};
use wide::f32x8;

const LANES: usize = 8;

fn load_lane(values: &[Number], offset: usize) -> f32x8 {
    let mut lane = [0.0; LANES];
    lane.copy_from_slice(&values[offset..offset + LANES]);
    f32x8::new(lane)
}

/// Cosine similarity in `[-1, 1]`, computed eight lanes at a time.
///
/// Returns `None` when the vectors differ in length. A zero-magnitude input
/// scores `0.0` against everything.
pub fn compute_cosine_similarity_simd(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot_product = f32x8::splat(0.0);
    let mut mag_a = f32x8::splat(0.0);
    let mut mag_b = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % LANES);

    for i in (0..simd_len).step_by(LANES) {
        let va = load_lane(a, i);
        let vb = load_lane(b, i);
        dot_product += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();
    let mut scalar_mag_a = mag_a.reduce_add();
    let mut scalar_mag_b = mag_b.reduce_add();

    // Tail
    for i in simd_len..len {
        scalar_dot_product += a[i] * b[i];
        scalar_mag_a += a[i] * a[i];
        scalar_mag_b += b[i] * b[i];
    }

    let denominator = (scalar_mag_a * scalar_mag_b).sqrt();
    if denominator < EPSILON {
        Some(0.0)
    } else {
        Some((scalar_dot_product / denominator).clamp(-1.0, 1.0))
    }
}

pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude: Number = vector.iter().map(|&x| x * x).sum::<Number>().sqrt();
    if magnitude > EPSILON {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}
