//! R1CS circuit interpreting a [`ConstraintProgram`].
//!
//! What this circuit proves (for one document submission):
//! 1) The prover knows `values[N]` and `nonces[2N]`.
//! 2) For every field, `Poseidon(values[i], nonces[2i], nonces[2i+1]) == commits[i]`, binding
//!    the private witness to the public commitments.
//! 3) Every comparison gate of the program holds over those private values and the public
//!    constants.
//!
//! Privacy: values and nonces are witnesses. Only commitments and constants are public.

use crate::codec::{commit, DocumentWitness};
use crate::compiler::{ConstraintProgram, Gate, Relation, Signal};
use crate::constants::poseidon_config;
use crate::schema::Op;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_ff::Field;
use ark_r1cs_std::convert::ToBitsGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Convert little-endian boolean bits into an FpVar.
fn bits_le_to_fp(bits_le: &[Boolean<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut acc = FpVar::<Fr>::constant(Fr::from(0u64));
    let mut coeff = FpVar::<Fr>::constant(Fr::from(1u64));

    for b in bits_le {
        // b ? coeff : 0
        let term = b.select(&coeff, &FpVar::<Fr>::constant(Fr::from(0u64)))?;
        acc += term;
        coeff += coeff.clone();
    }

    Ok(acc)
}

/// Enforce that `v` fits in `n` bits and return those `n` little-endian bits.
fn constrain_bits(v: &FpVar<Fr>, n: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let bits = v.to_bits_le()?;
    let low = bits[..n].to_vec();
    let reconstructed = bits_le_to_fp(&low)?;
    reconstructed.enforce_equal(v)?;
    Ok(low)
}

/// Boolean gadget: `a <= b` for `n`-bit operands.
///
/// Both operands are range-checked first. Then `b - a + 2^n` lies in `[1, 2^(n+1))` and its
/// bit `n` is set exactly when `a <= b`.
fn leq(a: &FpVar<Fr>, b: &FpVar<Fr>, n: usize) -> Result<Boolean<Fr>, SynthesisError> {
    constrain_bits(a, n)?;
    constrain_bits(b, n)?;

    let offset = FpVar::<Fr>::constant(Fr::from(2u64).pow([n as u64]));
    let shifted = b - a + offset;
    let bits = constrain_bits(&shifted, n + 1)?;
    Ok(bits[n].clone())
}

/// Circuit proving that committed document values satisfy a compiled schema.
#[derive(Clone, Debug)]
pub struct DocumentCircuit<'a> {
    pub program: &'a ConstraintProgram,

    /// Private witness.
    pub values: Vec<Fr>,
    pub nonces: Vec<Fr>,

    /// Public inputs.
    pub commits: Vec<Fr>,
    pub consts: Vec<Fr>,
}

impl<'a> DocumentCircuit<'a> {
    pub fn new(program: &'a ConstraintProgram, witness: &DocumentWitness) -> Self {
        Self {
            program,
            values: witness.values().to_vec(),
            nonces: witness.nonces().to_vec(),
            commits: witness.commitments(),
            consts: program.constants_as_field(),
        }
    }

    /// All-zero witness with matching commitments; constraints only depend on the program.
    pub fn blank(program: &'a ConstraintProgram) -> Self {
        let zero = Fr::from(0u64);
        let n = program.num_fields;
        Self {
            program,
            values: vec![zero; n],
            nonces: vec![zero; 2 * n],
            commits: vec![commit(zero, zero, zero); n],
            consts: program.constants_as_field(),
        }
    }
}

impl ConstraintSynthesizer<Fr> for DocumentCircuit<'_> {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let program = self.program;
        let n = program.num_fields;
        if self.values.len() != n
            || self.nonces.len() != 2 * n
            || self.commits.len() != n
            || self.consts.len() != program.num_constants()
        {
            return Err(SynthesisError::Unsatisfiable);
        }

        // --- Public inputs ---
        // IMPORTANT: allocation order MUST match `groth16::public_inputs`: commits, then consts.
        let commits = self
            .commits
            .iter()
            .map(|c| FpVar::<Fr>::new_input(cs.clone(), || Ok(*c)))
            .collect::<Result<Vec<_>, _>>()?;
        let consts = self
            .consts
            .iter()
            .map(|c| FpVar::<Fr>::new_input(cs.clone(), || Ok(*c)))
            .collect::<Result<Vec<_>, _>>()?;

        // --- Witness ---
        let values = self
            .values
            .iter()
            .map(|v| FpVar::<Fr>::new_witness(cs.clone(), || Ok(*v)))
            .collect::<Result<Vec<_>, _>>()?;
        let nonces = self
            .nonces
            .iter()
            .map(|v| FpVar::<Fr>::new_witness(cs.clone(), || Ok(*v)))
            .collect::<Result<Vec<_>, _>>()?;

        let var = |s: Signal| match s {
            Signal::Commit(i) => &commits[i],
            Signal::Const(i) => &consts[i],
            Signal::Value(i) => &values[i],
            Signal::Nonce(i) => &nonces[i],
        };

        let poseidon_cfg = poseidon_config();

        for gate in &program.gates {
            match *gate {
                Gate::Commitment { value, nonce_a, nonce_b, commit, .. } => {
                    let mut sponge = PoseidonSpongeVar::<Fr>::new(cs.clone(), &poseidon_cfg);
                    sponge.absorb(&vec![var(value).clone(), var(nonce_a).clone(), var(nonce_b).clone()])?;
                    let out = sponge.squeeze_field_elements(1)?[0].clone();
                    out.enforce_equal(var(commit))?;
                }
                Gate::Comparison { a, op, b, relation, rhs, .. } => {
                    let lhs = match op {
                        Op::Add => var(a) + var(b),
                        Op::Sub => var(a) - var(b),
                    };
                    let holds = match relation {
                        Relation::LessEq => leq(&lhs, var(rhs), program.comparator_bits)?,
                        Relation::GreaterEq => leq(var(rhs), &lhs, program.comparator_bits)?,
                    };
                    holds.enforce_equal(&Boolean::constant(true))?;
                }
            }
        }

        Ok(())
    }
}
