//! Distance functions over encoded vectors
//!
//! Every function works directly on the stored byte layout so the hot search
//! loop never materializes decoded copies. All distances are "lower = closer".
//! No implicit normalization of vectors: cosine divides by the norms, it does
//! not rewrite stored data.

use byteorder::{ByteOrder, LittleEndian};

/// Size of the Int8 scale trailer
pub(crate) const INT8_TRAILER: usize = 4;

fn f32_components(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes.chunks_exact(4).map(LittleEndian::read_f32)
}

/// `1 - cos(a, b)` over f32 vectors
///
/// Range: [0, 2]. A zero-norm vector is treated as orthogonal to everything.
pub(crate) fn cosine_f32(a: &[u8], b: &[u8]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in f32_components(a).zip(f32_components(b)) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    cosine_from_parts(dot, norm_a, norm_b)
}

/// L2 distance over f32 vectors
pub(crate) fn euclidean_f32(a: &[u8], b: &[u8]) -> f32 {
    f32_components(a)
        .zip(f32_components(b))
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn int8_parts(bytes: &[u8]) -> (&[u8], f32) {
    let split = bytes.len().saturating_sub(INT8_TRAILER);
    let (values, trailer) = bytes.split_at(split);
    let scale = if trailer.len() == INT8_TRAILER {
        LittleEndian::read_f32(trailer)
    } else {
        0.0
    };
    (values, scale)
}

/// `1 - cos(a, b)` over Int8 vectors
///
/// Positive scales cancel out of the cosine, so the quantized components are
/// compared directly.
pub(crate) fn cosine_int8(a: &[u8], b: &[u8]) -> f32 {
    let (va, _) = int8_parts(a);
    let (vb, _) = int8_parts(b);
    let (mut dot, mut norm_a, mut norm_b) = (0i64, 0i64, 0i64);
    for (&x, &y) in va.iter().zip(vb.iter()) {
        let (x, y) = (x as i8 as i64, y as i8 as i64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    cosine_from_parts(dot as f32, norm_a as f32, norm_b as f32)
}

/// Approximate L2 distance over Int8 vectors, rescaled by each trailer
pub(crate) fn euclidean_int8(a: &[u8], b: &[u8]) -> f32 {
    let (va, sa) = int8_parts(a);
    let (vb, sb) = int8_parts(b);
    va.iter()
        .zip(vb.iter())
        .map(|(&x, &y)| {
            let d = (x as i8 as f32) * sa - (y as i8 as f32) * sb;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Number of differing bits
pub(crate) fn hamming(a: &[u8], b: &[u8]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum::<u32>() as f32
}

fn cosine_from_parts(dot: f32, norm_a_sq: f32, norm_b_sq: f32) -> f32 {
    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return 1.0;
    }
    let cos = dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt());
    // Rounding can push |cos| slightly past 1
    1.0 - cos.clamp(-1.0, 1.0)
}
