//! Crate-wide constants shared by the codec, the circuit and the protocol.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Maximum number of bytes packed into one field element for string fields.
///
/// 31 bytes always fit below the BN254 scalar modulus.
pub const MAX_STRING_BYTES: usize = 31;

/// Bytes of entropy drawn for every commitment nonce.
pub const NONCE_BYTES: usize = 31;

/// Nonces per committed field (`nonce_a`, `nonce_b`).
pub const NONCES_PER_FIELD: usize = 2;

/// Bit width of the comparison gates.
///
/// Both sides of a comparison must lie in `[0, 2^COMPARATOR_BITS)`, otherwise the
/// comparison is unsatisfiable.
pub const COMPARATOR_BITS: usize = 64;

// Poseidon sponge configuration.
//
// The commitment hashes exactly three elements (value, nonce_a, nonce_b), so we use a
// width-4 sponge (rate=3, capacity=1) and absorb them in a single permutation.
pub const POSEIDON_RATE: usize = 3;
pub const POSEIDON_CAPACITY: usize = 1;

pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 56;

/// Poseidon S-box exponent (alpha).
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
///
/// Both the native hasher and the in-circuit gadget call this, so commitments created by
/// a document holder and commitments recomputed inside the proof always agree.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}
