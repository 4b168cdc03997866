//! Groth16 over BN254 for document circuits.
//!
//! Keys come from a local, single-party setup per compiled program. Whoever ran the setup
//! can forge proofs; a deployment that needs soundness against its operator must import
//! keys from an MPC ceremony instead.

use crate::circuit::DocumentCircuit;
use crate::codec::DocumentWitness;
use crate::compiler::ConstraintProgram;
use crate::error::ZkError;
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};

/// Verifier input vector: `commits` followed by `consts`, the circuit's allocation order.
pub fn public_inputs(commits: &[Fr], consts: &[Fr]) -> Vec<Fr> {
    let mut v = Vec::with_capacity(commits.len() + consts.len());
    v.extend_from_slice(commits);
    v.extend_from_slice(consts);
    v
}

/// Generate a Groth16 keypair for a compiled program.
///
/// Keys depend only on the program, so this runs once per schema.
pub fn setup_keys<R: RngCore + CryptoRng>(
    program: &ConstraintProgram,
    rng: &mut R,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    let circuit = DocumentCircuit::blank(program);

    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

/// Prove that `witness` satisfies `program`.
///
/// The witness is checked natively first, so an unsatisfiable witness fails with
/// [`ZkError::Unsatisfied`] instead of yielding a proof that cannot verify.
pub fn prove<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk: &ProvingKey<Bn254>,
    program: &ConstraintProgram,
    witness: &DocumentWitness,
) -> Result<Proof<Bn254>, ZkError> {
    if witness.num_fields() != program.num_fields {
        return Err(ZkError::FieldCountMismatch { expected: program.num_fields, got: witness.num_fields() });
    }
    program.check_witness(witness.values(), &program.constants_as_field())?;

    let circuit = DocumentCircuit::new(program, witness);

    Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng).map_err(|e| ZkError::Ark(format!("{e}")))
}

/// Verify a document proof against its public inputs.
pub fn verify(vk: &VerifyingKey<Bn254>, proof: &Proof<Bn254>, commits: &[Fr], consts: &[Fr]) -> Result<(), ZkError> {
    let pvk = PreparedVerifyingKey::from(vk.clone());
    verify_prepared(&pvk, proof, &public_inputs(commits, consts))
}

fn verify_prepared(pvk: &PreparedVerifyingKey<Bn254>, proof: &Proof<Bn254>, inputs: &[Fr]) -> Result<(), ZkError> {
    let ok = Groth16::<Bn254>::verify_proof(pvk, proof, inputs).map_err(|e| ZkError::Ark(format!("{e}")))?;
    if !ok {
        return Err(ZkError::VerificationFailed);
    }
    Ok(())
}

/// Checks an opaque proof against the public inputs of one submission.
///
/// This is the seam between the attestation protocol and whatever proving backend
/// produced the proof.
pub trait ProofVerifier {
    fn verify(&self, public_inputs: &[Fr], proof: &[u8]) -> Result<(), ZkError>;
}

/// [`ProofVerifier`] for compressed Groth16 proofs over BN254.
#[derive(Clone)]
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    num_public_inputs: usize,
}

impl Groth16Verifier {
    pub fn new(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            pvk: PreparedVerifyingKey::from(vk.clone()),
            // gamma_abc_g1 holds one element per public input plus the constant term.
            num_public_inputs: vk.gamma_abc_g1.len().saturating_sub(1),
        }
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, public_inputs: &[Fr], proof: &[u8]) -> Result<(), ZkError> {
        if public_inputs.len() != self.num_public_inputs {
            return Err(ZkError::PublicInputCountMismatch {
                expected: self.num_public_inputs,
                got: public_inputs.len(),
            });
        }
        let proof = deserialize_proof(proof)?;
        verify_prepared(&self.pvk, &proof, public_inputs)
    }
}

/// Compressed encodings of keys and proofs.
pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, ZkError> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ZkError> {
    Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}
