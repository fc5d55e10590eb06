//! Embedding codec: precision conversion and scoring
//!
//! ## Encodings
//!
//! | Precision | Layout                                  | Length            |
//! |-----------|-----------------------------------------|-------------------|
//! | Single    | f32 little-endian per component         | `4 * dims`        |
//! | Int8      | i8 per component, then f32 LE scale     | `dims + 4`        |
//! | Binary    | sign bit per component, MSB first       | `ceil(dims / 8)`  |
//!
//! Quantized sources can only be stored as-is; converting between two
//! non-Single precisions is rejected.

use byteorder::{ByteOrder, LittleEndian};

use crate::vector::distance::{self, INT8_TRAILER};
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::types::{DistanceMetric, EmbeddingType, VectorOptions};

/// Encode a raw vector from `source` precision into `destination` precision
///
/// # Errors
///
/// - `InvalidEncoding` for a conversion between two non-Single precisions
/// - `CorruptInput` when the raw bytes cannot be a `source` vector
pub fn encode(
    source: EmbeddingType,
    destination: EmbeddingType,
    raw: &[u8],
) -> VectorResult<Vec<u8>> {
    check_raw(source, raw)?;
    match (source, destination) {
        (EmbeddingType::Single, EmbeddingType::Single) => Ok(raw.to_vec()),
        (EmbeddingType::Single, EmbeddingType::Int8) => Ok(quantize_int8(raw)),
        (EmbeddingType::Single, EmbeddingType::Binary) => Ok(pack_signs(raw)),
        (from, to) if from == to => Ok(raw.to_vec()),
        (from, to) => Err(VectorError::InvalidEncoding { from, to }),
    }
}

/// Distance between two vectors encoded at the same precision
pub fn distance(precision: EmbeddingType, metric: DistanceMetric, a: &[u8], b: &[u8]) -> f32 {
    match (precision, metric) {
        (EmbeddingType::Single, DistanceMetric::Cosine) => distance::cosine_f32(a, b),
        (EmbeddingType::Single, DistanceMetric::Euclidean) => distance::euclidean_f32(a, b),
        (EmbeddingType::Int8, DistanceMetric::Cosine) => distance::cosine_int8(a, b),
        (EmbeddingType::Int8, DistanceMetric::Euclidean) => distance::euclidean_int8(a, b),
        (EmbeddingType::Binary, _) => distance::hamming(a, b),
    }
}

fn check_raw(source: EmbeddingType, raw: &[u8]) -> VectorResult<()> {
    match source {
        EmbeddingType::Single => {
            if raw.is_empty() || raw.len() % 4 != 0 {
                return Err(VectorError::corrupt(format!(
                    "{} bytes is not a whole number of f32 components",
                    raw.len()
                )));
            }
            if raw.chunks_exact(4).any(|c| !LittleEndian::read_f32(c).is_finite()) {
                return Err(VectorError::corrupt("vector contains NaN or infinity"));
            }
        }
        EmbeddingType::Int8 => {
            if raw.len() <= INT8_TRAILER {
                return Err(VectorError::corrupt("int8 vector is missing its scale trailer"));
            }
        }
        EmbeddingType::Binary => {
            if raw.is_empty() {
                return Err(VectorError::corrupt("empty binary vector"));
            }
        }
    }
    Ok(())
}

fn quantize_int8(raw: &[u8]) -> Vec<u8> {
    let max_abs = raw
        .chunks_exact(4)
        .map(|c| LittleEndian::read_f32(c).abs())
        .fold(0.0f32, f32::max);
    let scale = max_abs / 127.0;

    let mut out = Vec::with_capacity(raw.len() / 4 + INT8_TRAILER);
    for chunk in raw.chunks_exact(4) {
        let q = if scale == 0.0 {
            0.0
        } else {
            (LittleEndian::read_f32(chunk) / scale).round().clamp(-127.0, 127.0)
        };
        out.push(q as i8 as u8);
    }
    let mut trailer = [0u8; INT8_TRAILER];
    LittleEndian::write_f32(&mut trailer, scale);
    out.extend_from_slice(&trailer);
    out
}

fn pack_signs(raw: &[u8]) -> Vec<u8> {
    let dims = raw.len() / 4;
    let mut out = vec![0u8; (dims + 7) / 8];
    for (i, chunk) in raw.chunks_exact(4).enumerate() {
        if LittleEndian::read_f32(chunk) >= 0.0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

/// Encoding and scoring rules of one field, fixed at field creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    source: EmbeddingType,
    destination: EmbeddingType,
    metric: DistanceMetric,
}

impl Codec {
    /// Codec for a field's options
    pub fn for_options(options: &VectorOptions) -> Self {
        Codec {
            source: options.source,
            destination: options.destination,
            metric: options.metric,
        }
    }

    /// Encode a raw vector into the stored precision
    pub fn encode(&self, raw: &[u8]) -> VectorResult<Vec<u8>> {
        encode(self.source, self.destination, raw)
    }

    /// Distance between two stored vectors
    #[inline]
    pub fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        distance(self.destination, self.metric, a, b)
    }

    /// Map a distance to a similarity score (higher = more similar)
    ///
    /// Strictly decreasing in distance:
    /// - Cosine: `1 - d`, i.e. the cosine itself
    /// - Euclidean: `1 / (1 + d)`
    /// - Binary: `1 - d / bits`, the fraction of matching bits
    pub fn distance_to_score(&self, distance: f32, vector_len: usize) -> f32 {
        match (self.destination, self.metric) {
            (EmbeddingType::Binary, _) => {
                let bits = (vector_len * 8).max(1) as f32;
                1.0 - distance / bits
            }
            (_, DistanceMetric::Cosine) => 1.0 - distance,
            (_, DistanceMetric::Euclidean) => 1.0 / (1.0 + distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::types::RawVector;
    use proptest::prelude::*;

    fn raw(values: &[f32]) -> Vec<u8> {
        RawVector::from_f32(values).into_bytes()
    }

    #[test]
    fn test_single_is_identity() {
        let bytes = raw(&[1.0, -2.0, 3.5]);
        let encoded = encode(EmbeddingType::Single, EmbeddingType::Single, &bytes).unwrap();
        assert_eq!(encoded, bytes);
    }

    #[test]
    fn test_int8_length_and_scale() {
        let bytes = raw(&[127.0, -63.5, 0.0, 1.0]);
        let encoded = encode(EmbeddingType::Single, EmbeddingType::Int8, &bytes).unwrap();
        assert_eq!(encoded.len(), 4 + INT8_TRAILER);
        assert_eq!(encoded[0] as i8, 127);
        assert_eq!(encoded[1] as i8, -64);
        assert_eq!(encoded[2] as i8, 0);
        assert_eq!(encoded[3] as i8, 1);
        assert_eq!(LittleEndian::read_f32(&encoded[4..]), 1.0);
    }

    #[test]
    fn test_int8_zero_vector() {
        let zeros = raw(&[0.0, 0.0]);
        let encoded = encode(EmbeddingType::Single, EmbeddingType::Int8, &zeros).unwrap();
        assert_eq!(&encoded[..2], &[0, 0]);
        assert_eq!(LittleEndian::read_f32(&encoded[2..]), 0.0);
    }

    #[test]
    fn test_binary_packs_sign_bits() {
        let bytes = raw(&[1.0, -1.0, 0.0, -0.5, 2.0, -3.0, 4.0, -5.0, 6.0]);
        let encoded = encode(EmbeddingType::Single, EmbeddingType::Binary, &bytes).unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0], 0b1010_1010);
        assert_eq!(encoded[1], 0b1000_0000);
    }

    #[test]
    fn test_non_single_conversions_rejected() {
        let quantized = vec![1u8, 2, 3, 0, 0, 128, 63];
        let err = encode(EmbeddingType::Int8, EmbeddingType::Binary, &quantized).unwrap_err();
        assert!(matches!(
            err,
            VectorError::InvalidEncoding {
                from: EmbeddingType::Int8,
                to: EmbeddingType::Binary
            }
        ));
        assert!(encode(EmbeddingType::Binary, EmbeddingType::Single, &[0xff]).is_err());
        assert!(encode(EmbeddingType::Int8, EmbeddingType::Int8, &quantized).is_ok());
        assert!(encode(EmbeddingType::Binary, EmbeddingType::Binary, &[0xff]).is_ok());
    }

    #[test]
    fn test_corrupt_input() {
        assert!(matches!(
            encode(EmbeddingType::Single, EmbeddingType::Single, &[1, 2, 3]),
            Err(VectorError::CorruptInput { .. })
        ));
        assert!(encode(EmbeddingType::Single, EmbeddingType::Single, &[]).is_err());
        assert!(encode(EmbeddingType::Single, EmbeddingType::Int8, &raw(&[f32::NAN])).is_err());
        assert!(encode(EmbeddingType::Int8, EmbeddingType::Int8, &[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_binary_score_is_matching_fraction() {
        let codec = Codec::for_options(
            &VectorOptions::new(4, 8).destination(EmbeddingType::Binary),
        );
        assert_eq!(codec.distance_to_score(0.0, 2), 1.0);
        assert_eq!(codec.distance_to_score(16.0, 2), 0.0);
        assert_eq!(codec.distance_to_score(4.0, 2), 0.75);
    }

    #[test]
    fn test_quantized_search_preserves_nearest() {
        let codec = Codec::for_options(
            &VectorOptions::new(4, 8).destination(EmbeddingType::Int8),
        );
        let q = codec.encode(&raw(&[1.0, 0.1, 0.0])).unwrap();
        let near = codec.encode(&raw(&[0.9, 0.2, 0.0])).unwrap();
        let far = codec.encode(&raw(&[-1.0, 0.5, 0.3])).unwrap();
        assert!(codec.distance(&q, &near) < codec.distance(&q, &far));
    }

    proptest! {
        #[test]
        fn score_is_monotonic_in_distance(
            a in 0.0f32..1000.0,
            b in 0.0f32..1000.0,
            metric in prop_oneof![Just(DistanceMetric::Cosine), Just(DistanceMetric::Euclidean)],
            destination in prop_oneof![
                Just(EmbeddingType::Single),
                Just(EmbeddingType::Int8),
                Just(EmbeddingType::Binary)
            ],
        ) {
            let codec = Codec::for_options(
                &VectorOptions::new(4, 8).metric(metric).destination(destination),
            );
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(codec.distance_to_score(near, 256) >= codec.distance_to_score(far, 256));
        }

        #[test]
        fn int8_roundtrip_is_close(values in prop::collection::vec(-100.0f32..100.0, 1..64)) {
            let bytes = raw(&values);
            let encoded = encode(EmbeddingType::Single, EmbeddingType::Int8, &bytes).unwrap();
            let scale = LittleEndian::read_f32(&encoded[values.len()..]);
            for (i, v) in values.iter().enumerate() {
                let restored = (encoded[i] as i8 as f32) * scale;
                prop_assert!((restored - v).abs() <= scale * 0.5 + 1e-3);
            }
        }
    }
}
