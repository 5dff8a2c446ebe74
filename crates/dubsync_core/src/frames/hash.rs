//! Perceptual hashing and similarity scoring for frame comparison.
//!
//! Uses the `image_hasher` crate at a fixed 8x8 hash size, so every
//! algorithm yields a 64-bit fingerprint. Two fingerprints are compared by
//! normalized Hamming distance, expressed as a similarity score in [0, 100].

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};

use super::error::{FrameError, FrameResult};
use crate::models::HashAlgorithm;

/// Number of bits in a perceptual hash.
pub const HASH_BITS: u32 = 64;

/// Side length of the hash grid (8x8 = 64 bits).
const HASH_SIZE: u32 = 8;

/// A 64-bit fingerprint of a frame's downsampled luminance pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    /// Wrap raw hash bits.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw hash bits.
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Number of differing bits (0 = identical).
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Similarity score against another hash. See [`similarity`].
    pub fn similarity(&self, other: &PerceptualHash) -> f64 {
        similarity(self, other)
    }
}

impl std::fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Similarity of two hashes in [0, 100].
///
/// 100 means identical hashes, 0 means every bit differs. The score is
/// symmetric and only takes the 65 values `k * 100 / 64`.
pub fn similarity(a: &PerceptualHash, b: &PerceptualHash) -> f64 {
    let matching = HASH_BITS - a.distance(b);
    matching as f64 * 100.0 / HASH_BITS as f64
}

/// Computes perceptual hashes of decoded frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameHasher {
    algorithm: HashAlgorithm,
}

impl FrameHasher {
    /// Create a hasher for the given algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Get the configured algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash a frame.
    ///
    /// Deterministic for identical pixel input. Empty images are rejected
    /// with `FrameError::InvalidFrame`.
    pub fn hash(&self, image: &DynamicImage) -> FrameResult<PerceptualHash> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidFrame(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        let hash = self.build_hasher().hash_image(image);
        let bytes = hash.as_bytes();
        let bits: [u8; 8] = bytes.try_into().map_err(|_| {
            FrameError::InvalidFrame(format!(
                "expected a {}-bit hash, got {} bytes",
                HASH_BITS,
                bytes.len()
            ))
        })?;

        Ok(PerceptualHash(u64::from_be_bytes(bits)))
    }

    fn build_hasher(&self) -> Hasher {
        let alg = match self.algorithm {
            HashAlgorithm::Mean => HashAlg::Mean,
            HashAlgorithm::Gradient => HashAlg::Gradient,
            HashAlgorithm::Blockhash => HashAlg::Blockhash,
        };

        HasherConfig::new()
            .hash_alg(alg)
            .hash_size(HASH_SIZE, HASH_SIZE)
            .to_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use proptest::prelude::*;

    fn create_gradient_image() -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, _| {
            let v = (x * 4) as u8;
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn create_inverted_gradient_image() -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, _| {
            let v = 255 - (x * 4) as u8;
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_are_fully_similar() {
        let hasher = FrameHasher::default();
        let a = hasher.hash(&create_gradient_image()).unwrap();
        let b = hasher.hash(&create_gradient_image()).unwrap();

        assert_eq!(a, b);
        assert_eq!(similarity(&a, &b), 100.0);
    }

    #[test]
    fn all_algorithms_produce_stable_hashes() {
        for alg in [
            HashAlgorithm::Mean,
            HashAlgorithm::Gradient,
            HashAlgorithm::Blockhash,
        ] {
            let hasher = FrameHasher::new(alg);
            let a = hasher.hash(&create_gradient_image()).unwrap();
            let b = hasher.hash(&create_gradient_image()).unwrap();
            assert_eq!(a.distance(&b), 0, "{} should be deterministic", alg);
        }
    }

    #[test]
    fn inverted_image_is_dissimilar() {
        let hasher = FrameHasher::default();
        let a = hasher.hash(&create_gradient_image()).unwrap();
        let b = hasher.hash(&create_inverted_gradient_image()).unwrap();

        assert!(similarity(&a, &b) < 50.0);
    }

    #[test]
    fn empty_image_is_invalid() {
        let hasher = FrameHasher::default();
        let empty = DynamicImage::ImageLuma8(GrayImage::from_pixel(0, 0, Luma([0])));

        let result = hasher.hash(&empty);
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }

    #[test]
    fn similarity_from_distance() {
        let a = PerceptualHash::from_bits(0);
        let b = PerceptualHash::from_bits(0xFFFF);
        assert_eq!(a.distance(&b), 16);
        assert_eq!(similarity(&a, &b), 75.0);

        let c = PerceptualHash::from_bits(u64::MAX);
        assert_eq!(similarity(&a, &c), 0.0);
    }

    #[test]
    fn hash_displays_as_hex() {
        let hash = PerceptualHash::from_bits(0xABCD);
        assert_eq!(hash.to_string(), "000000000000abcd");
    }

    proptest! {
        #[test]
        fn prop_similarity_symmetric(a in any::<u64>(), b in any::<u64>()) {
            let (ha, hb) = (PerceptualHash::from_bits(a), PerceptualHash::from_bits(b));
            prop_assert_eq!(similarity(&ha, &hb), similarity(&hb, &ha));
        }

        #[test]
        fn prop_similarity_bounded(a in any::<u64>(), b in any::<u64>()) {
            let s = similarity(&PerceptualHash::from_bits(a), &PerceptualHash::from_bits(b));
            prop_assert!((0.0..=100.0).contains(&s));
        }

        #[test]
        fn prop_self_similarity_is_100(a in any::<u64>()) {
            let h = PerceptualHash::from_bits(a);
            prop_assert_eq!(similarity(&h, &h), 100.0);
        }
    }
}
