//! Content fingerprints and variant keys.

use blake3::Hasher as Blake3Hasher;

use super::plan::VariantSpec;

/// Version of the variant key derivation.
///
/// Bump whenever anything that changes encoded bytes changes (quality mapping,
/// resize filter, encoder settings). Every existing cache entry then misses and
/// the next run rebuilds, instead of silently trusting stale outputs.
pub const VARIANT_KEY_VERSION: u32 = 1;

/// Content and variant hashing.
pub struct Hasher;

impl Hasher {
    /// Generate a BLAKE3 hash from an in-memory byte buffer.
    ///
    /// The pipeline reads each source once and reuses the bytes for decoding.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }

    /// Derive the cache key for one variant of one source.
    ///
    /// Covers every input that affects the output bytes: key version, source
    /// fingerprint, size, pixel ratio, format and quality. Fields are
    /// length-delimited so no two distinct tuples share an encoding.
    pub fn variant_key(source_fingerprint: &str, spec: &VariantSpec) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(b"vadimage-variant");
        hasher.update(&VARIANT_KEY_VERSION.to_le_bytes());
        update_field(&mut hasher, source_fingerprint.as_bytes());
        hasher.update(&spec.size.to_le_bytes());
        hasher.update(&spec.pixel_ratio.to_le_bytes());
        update_field(&mut hasher, spec.format.extension().as_bytes());
        hasher.update(&[spec.quality]);
        hasher.finalize().to_hex().to_string()
    }
}

fn update_field(hasher: &mut Blake3Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
