//! Field-value encoding and hiding commitments.
//!
//! A document holder turns each raw value into one field element (decimal numbers parse
//! directly, short ASCII strings are byte-packed), draws two fresh nonces per field, and
//! publishes `commit(value, nonce_a, nonce_b)`. The circuit recomputes exactly this hash,
//! so input order and arity here are part of the protocol.

use crate::constants::{poseidon_config, MAX_STRING_BYTES, NONCES_PER_FIELD, NONCE_BYTES};
use crate::error::EncodingError;
use crate::schema::Schema;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use std::sync::OnceLock;

fn poseidon() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();
    CONFIG.get_or_init(poseidon_config)
}

/// Pack up to the first 31 characters of `s` big-endian into one field element.
///
/// A character above U+00FF cannot be represented as one byte and is encoded as `0x00`.
/// This is lossy (distinct strings may collide); [`Schema::check_values`] rejects such
/// strings before they get here.
pub fn encode_string_to_field(s: &str) -> Fr {
    let bytes: Vec<u8> = s
        .chars()
        .take(MAX_STRING_BYTES)
        .enumerate()
        .map(|(i, c)| match u8::try_from(u32::from(c)) {
            Ok(b) => b,
            Err(_) => {
                tracing::warn!(position = i, "string contains non-ascii characters, encoding as 0x00");
                0
            }
        })
        .collect();

    Fr::from_be_bytes_mod_order(&bytes)
}

/// Parse a decimal value of field `field`. Values at or above the modulus are rejected.
pub fn parse_numeric(field: usize, s: &str) -> Result<Fr, EncodingError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EncodingError::NotNumeric { field, value: s.to_string() });
    }
    let n = BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| EncodingError::NotNumeric { field, value: s.to_string() })?;
    if n >= BigUint::from(Fr::MODULUS) {
        return Err(EncodingError::NumericOverflow { field });
    }
    Ok(Fr::from(n))
}

/// Poseidon commitment to `value` under two independent nonces.
pub fn commit(value: Fr, nonce_a: Fr, nonce_b: Fr) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(poseidon());
    sponge.absorb(&vec![value, nonce_a, nonce_b]);
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Draw a fresh 31-byte nonce.
///
/// Callers must pass a cryptographically secure RNG; reusing a nonce across fields or
/// instances breaks hiding.
pub fn random_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> Fr {
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut bytes);
    Fr::from_le_bytes_mod_order(&bytes)
}

/// A holder's private witness: encoded values and `2 * num_fields` nonces.
///
/// Field `i` is committed with nonces `2i` and `2i + 1`.
#[derive(Clone, Debug)]
pub struct DocumentWitness {
    values: Vec<Fr>,
    nonces: Vec<Fr>,
}

impl DocumentWitness {
    /// Encode `raw_values` against `schema` and draw fresh nonces for every field.
    pub fn generate<R: RngCore + CryptoRng>(
        schema: &Schema,
        raw_values: &[String],
        rng: &mut R,
    ) -> Result<Self, EncodingError> {
        let values = schema.convert_values(raw_values)?;
        let nonces = (0..values.len() * NONCES_PER_FIELD).map(|_| random_nonce(rng)).collect();
        Self::from_parts(values, nonces)
    }

    /// Assemble a witness from already-encoded parts.
    pub fn from_parts(values: Vec<Fr>, nonces: Vec<Fr>) -> Result<Self, EncodingError> {
        let expected = values.len() * NONCES_PER_FIELD;
        if nonces.len() != expected {
            return Err(EncodingError::WrongNonceCount { expected, got: nonces.len() });
        }

        let mut seen = HashSet::with_capacity(nonces.len());
        for (index, n) in nonces.iter().enumerate() {
            if !seen.insert(*n) {
                return Err(EncodingError::NonceReuse { index });
            }
        }

        Ok(Self { values, nonces })
    }

    pub fn num_fields(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Fr] {
        &self.values
    }

    pub fn nonces(&self) -> &[Fr] {
        &self.nonces
    }

    pub fn nonce_pair(&self, field: usize) -> (Fr, Fr) {
        (self.nonces[2 * field], self.nonces[2 * field + 1])
    }

    /// Commitment for every field, in field order.
    pub fn commitments(&self) -> Vec<Fr> {
        (0..self.values.len())
            .map(|i| {
                let (a, b) = self.nonce_pair(i);
                commit(self.values[i], a, b)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn encodes_ascii_big_endian() {
        assert_eq!(encode_string_to_field("12"), Fr::from(0x3132u64));
        assert_eq!(encode_string_to_field("the"), Fr::from(0x746865u64));
        assert_eq!(encode_string_to_field(""), Fr::from(0u64));
    }

    #[test]
    fn truncates_to_31_bytes() {
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(encode_string_to_field(long), encode_string_to_field(&long[..31]));
        assert_ne!(encode_string_to_field(&long[..30]), encode_string_to_field(&long[..31]));
    }

    #[test]
    fn wide_characters_become_zero_bytes() {
        // U+20AC does not fit in a byte.
        assert_eq!(encode_string_to_field("a\u{20ac}b"), Fr::from(0x610062u64));
        assert_eq!(encode_string_to_field("a\u{20ac}b"), encode_string_to_field("a\u{4e2d}b"));
    }

    #[test]
    fn parses_numeric_values() {
        assert_eq!(parse_numeric(0, "100").unwrap(), Fr::from(100u64));
        assert_eq!(parse_numeric(0, "0042").unwrap(), Fr::from(42u64));
        assert!(matches!(parse_numeric(3, "-1"), Err(EncodingError::NotNumeric { field: 3, .. })));
        assert!(matches!(parse_numeric(3, "1e5"), Err(EncodingError::NotNumeric { field: 3, .. })));

        let modulus = BigUint::from(Fr::MODULUS).to_string();
        assert_eq!(parse_numeric(1, &modulus), Err(EncodingError::NumericOverflow { field: 1 }));
    }

    #[test]
    fn witness_commitments_use_paired_nonces() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let values = vec![Fr::from(100u64), Fr::from(200u64)];
        let nonces: Vec<Fr> = (0..4).map(|_| random_nonce(&mut rng)).collect();
        let witness = DocumentWitness::from_parts(values.clone(), nonces.clone()).unwrap();

        let commits = witness.commitments();
        assert_eq!(commits[0], commit(values[0], nonces[0], nonces[1]));
        assert_eq!(commits[1], commit(values[1], nonces[2], nonces[3]));
    }

    #[test]
    fn witness_rejects_bad_nonce_sets() {
        let values = vec![Fr::from(1u64), Fr::from(2u64)];
        let short = vec![Fr::from(9u64); 3];
        assert_eq!(
            DocumentWitness::from_parts(values.clone(), short).unwrap_err(),
            EncodingError::WrongNonceCount { expected: 4, got: 3 }
        );

        let reused = vec![Fr::from(9u64), Fr::from(10u64), Fr::from(11u64), Fr::from(9u64)];
        assert_eq!(
            DocumentWitness::from_parts(values, reused).unwrap_err(),
            EncodingError::NonceReuse { index: 3 }
        );
    }

    #[test]
    fn fresh_nonces_are_distinct() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = random_nonce(&mut rng);
        let b = random_nonce(&mut rng);
        assert_ne!(a, b);
        // 31 bytes always stay below the modulus, so no reduction happens.
        assert!(BigUint::from(a.into_bigint()).bits() <= 8 * NONCE_BYTES as u64);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn commit_is_deterministic_and_separates_inputs(
            v in any::<u64>(), a in any::<u64>(), b in any::<u64>(),
            v2 in any::<u64>(), a2 in any::<u64>(), b2 in any::<u64>(),
        ) {
            let c1 = commit(Fr::from(v), Fr::from(a), Fr::from(b));
            prop_assert_eq!(c1, commit(Fr::from(v), Fr::from(a), Fr::from(b)));

            let c2 = commit(Fr::from(v2), Fr::from(a2), Fr::from(b2));
            prop_assert_eq!(c1 == c2, (v, a, b) == (v2, a2, b2));
        }

        #[test]
        fn commit_depends_on_nonce_order(v in any::<u64>(), a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(
                commit(Fr::from(v), Fr::from(a), Fr::from(b)),
                commit(Fr::from(v), Fr::from(b), Fr::from(a))
            );
        }
    }
}
