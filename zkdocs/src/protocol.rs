//! Attestation state machine for one deployed document instance.
//!
//! Per submitter: `Empty -> Posted -> (attestations, any order) -> FullyAttested -> Validated`.
//!
//! Transitions are split in two halves. [`DocumentInstance::decide`] checks a [`Command`]
//! against the current state and, if it is allowed, returns the [`LedgerEvent`] it would
//! record; it never mutates. [`DocumentInstance::apply`] folds an accepted event into the
//! state and cannot fail. A refused command therefore never leaves a partial update behind.

use crate::error::ProtocolError;
use crate::groth16::{public_inputs, ProofVerifier};
use crate::schema::Schema;
use crate::types::{fr_hex, fr_hex_vec, Address};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One committed field slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldCommitment {
    pub submitter: Address,
    #[serde(with = "fr_hex")]
    pub commitment: Fr,
    pub attester: Address,
    pub attested: bool,
}

/// A requested transition. The caller identity is part of the command.
#[derive(Clone, Debug)]
pub enum Command {
    AddInstitution { caller: Address, address: Address },
    PostFields { submitter: Address, commitments: Vec<Fr>, attesters: Vec<Address> },
    Attest { attester: Address, field_index: usize },
    Validate { submitter: Address, proof: Vec<u8> },
}

/// An accepted transition, as recorded on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    InstitutionAdded {
        address: Address,
    },
    FieldsPosted {
        submitter: Address,
        first_index: usize,
        #[serde(with = "fr_hex_vec")]
        commitments: Vec<Fr>,
        attesters: Vec<Address>,
    },
    FieldAttested {
        field_index: usize,
        attester: Address,
    },
    SubmitterValidated {
        submitter: Address,
    },
}

/// Result of a `validate` call that was not refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    Validated,
    AlreadyValidated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentInstance {
    schema_hash: String,
    admin: Address,
    constants: Vec<u64>,
    num_fields: usize,
    valid_institutions: BTreeSet<Address>,
    fields: Vec<FieldCommitment>,
    /// Submitter -> global index of its first field slot.
    submissions: BTreeMap<Address, usize>,
    validated_submitters: Vec<Address>,
    history: Vec<LedgerEvent>,
}

impl DocumentInstance {
    /// Deploy an instance for `schema`.
    ///
    /// `constants` and `num_fields` are the values the instance is parameterized with and
    /// must agree with what the schema declares.
    pub fn new(schema: &Schema, admin: Address, constants: &[u64], num_fields: usize) -> Result<Self, ProtocolError> {
        let expected = schema.constants();
        if expected != constants {
            return Err(ProtocolError::ConstantsMismatch { expected, got: constants.to_vec() });
        }
        if num_fields != schema.num_fields() {
            return Err(ProtocolError::FieldCountMismatch { expected: schema.num_fields(), got: num_fields });
        }

        Ok(Self {
            schema_hash: schema.schema_hash().to_string(),
            admin,
            constants: expected,
            num_fields,
            valid_institutions: schema.trusted_institutions().iter().map(|t| t.address).collect(),
            fields: Vec::new(),
            submissions: BTreeMap::new(),
            validated_submitters: Vec::new(),
            history: Vec::new(),
        })
    }

    /// Deploy with the parameters taken straight from the schema.
    pub fn from_schema(schema: &Schema, admin: Address) -> Self {
        Self {
            schema_hash: schema.schema_hash().to_string(),
            admin,
            constants: schema.constants(),
            num_fields: schema.num_fields(),
            valid_institutions: schema.trusted_institutions().iter().map(|t| t.address).collect(),
            fields: Vec::new(),
            submissions: BTreeMap::new(),
            validated_submitters: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Check `command` against the current state.
    ///
    /// `Ok(None)` means the command is accepted but changes nothing (a repeat `validate`).
    pub fn decide<V: ProofVerifier + ?Sized>(
        &self,
        command: &Command,
        verifier: &V,
    ) -> Result<Option<LedgerEvent>, ProtocolError> {
        match command {
            Command::AddInstitution { caller, address } => {
                if *caller != self.admin {
                    return Err(ProtocolError::NotAdmin(caller.to_string()));
                }
                if self.valid_institutions.contains(address) {
                    return Err(ProtocolError::InstitutionAlreadyValid(address.to_string()));
                }
                Ok(Some(LedgerEvent::InstitutionAdded { address: *address }))
            }

            Command::PostFields { submitter, commitments, attesters } => {
                if self.submissions.contains_key(submitter) {
                    return Err(ProtocolError::AlreadyPosted(submitter.to_string()));
                }
                if commitments.len() != self.num_fields {
                    return Err(ProtocolError::WrongArity {
                        what: "commitments",
                        expected: self.num_fields,
                        got: commitments.len(),
                    });
                }
                if attesters.len() != self.num_fields {
                    return Err(ProtocolError::WrongArity {
                        what: "attesters",
                        expected: self.num_fields,
                        got: attesters.len(),
                    });
                }
                if let Some((field, attester)) =
                    attesters.iter().enumerate().find(|(_, a)| !self.valid_institutions.contains(*a))
                {
                    return Err(ProtocolError::UnknownInstitution { field, attester: attester.to_string() });
                }
                Ok(Some(LedgerEvent::FieldsPosted {
                    submitter: *submitter,
                    first_index: self.fields.len(),
                    commitments: commitments.clone(),
                    attesters: attesters.clone(),
                }))
            }

            Command::Attest { attester, field_index } => {
                let slot = self.slot(*field_index)?;
                if slot.attester != *attester {
                    return Err(ProtocolError::WrongAttester {
                        field_index: *field_index,
                        caller: attester.to_string(),
                    });
                }
                if slot.attested {
                    return Err(ProtocolError::AlreadyAttested(*field_index));
                }
                Ok(Some(LedgerEvent::FieldAttested { field_index: *field_index, attester: *attester }))
            }

            Command::Validate { submitter, proof } => {
                if self.validated_submitters.contains(submitter) {
                    return Ok(None);
                }
                let inputs = self.public_inputs_for(submitter)?;
                verifier.verify(&inputs, proof)?;
                Ok(Some(LedgerEvent::SubmitterValidated { submitter: *submitter }))
            }
        }
    }

    /// Fold an accepted event into the state.
    ///
    /// Events must come from [`Self::decide`] on this same state (or from this instance's
    /// own history when replaying).
    pub fn apply(&mut self, event: LedgerEvent) {
        match &event {
            LedgerEvent::InstitutionAdded { address } => {
                self.valid_institutions.insert(*address);
            }
            LedgerEvent::FieldsPosted { submitter, first_index, commitments, attesters } => {
                debug_assert_eq!(*first_index, self.fields.len());
                self.submissions.insert(*submitter, *first_index);
                self.fields.extend(commitments.iter().zip(attesters).map(|(c, a)| FieldCommitment {
                    submitter: *submitter,
                    commitment: *c,
                    attester: *a,
                    attested: false,
                }));
            }
            LedgerEvent::FieldAttested { field_index, .. } => {
                if let Some(slot) = self.fields.get_mut(*field_index) {
                    slot.attested = true;
                }
            }
            LedgerEvent::SubmitterValidated { submitter } => {
                if !self.validated_submitters.contains(submitter) {
                    self.validated_submitters.push(*submitter);
                }
            }
        }
        self.history.push(event);
    }

    /// `decide` then `apply`.
    pub fn execute<V: ProofVerifier + ?Sized>(
        &mut self,
        command: Command,
        verifier: &V,
    ) -> Result<Option<LedgerEvent>, ProtocolError> {
        match self.decide(&command, verifier) {
            Ok(Some(event)) => {
                tracing::info!(schema_hash = %self.schema_hash, ?event, "transition applied");
                self.apply(event.clone());
                Ok(Some(event))
            }
            Ok(None) => {
                tracing::debug!(schema_hash = %self.schema_hash, "no-op transition");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(schema_hash = %self.schema_hash, error = %e, "transition rejected");
                Err(e)
            }
        }
    }

    pub fn add_valid_institution<V: ProofVerifier + ?Sized>(
        &mut self,
        caller: Address,
        address: Address,
        verifier: &V,
    ) -> Result<(), ProtocolError> {
        self.execute(Command::AddInstitution { caller, address }, verifier).map(|_| ())
    }

    /// Record `commitments` for `submitter`, returning the first allocated field slot.
    pub fn post_fields<V: ProofVerifier + ?Sized>(
        &mut self,
        submitter: Address,
        commitments: Vec<Fr>,
        attesters: Vec<Address>,
        verifier: &V,
    ) -> Result<usize, ProtocolError> {
        match self.execute(Command::PostFields { submitter, commitments, attesters }, verifier)? {
            Some(LedgerEvent::FieldsPosted { first_index, .. }) => Ok(first_index),
            // decide only ever answers PostFields with FieldsPosted
            _ => Err(ProtocolError::NotPosted(submitter.to_string())),
        }
    }

    pub fn attest<V: ProofVerifier + ?Sized>(
        &mut self,
        attester: Address,
        field_index: usize,
        verifier: &V,
    ) -> Result<(), ProtocolError> {
        self.execute(Command::Attest { attester, field_index }, verifier).map(|_| ())
    }

    pub fn validate<V: ProofVerifier + ?Sized>(
        &mut self,
        submitter: Address,
        proof: Vec<u8>,
        verifier: &V,
    ) -> Result<Validation, ProtocolError> {
        match self.execute(Command::Validate { submitter, proof }, verifier)? {
            Some(_) => Ok(Validation::Validated),
            None => Ok(Validation::AlreadyValidated),
        }
    }

    fn slot(&self, field_index: usize) -> Result<&FieldCommitment, ProtocolError> {
        self.fields.get(field_index).ok_or(ProtocolError::UnknownFieldIndex(field_index))
    }

    /// Global slot of `submitter`'s field at `position`.
    pub fn field_index_of(&self, submitter: &Address, position: usize) -> Result<usize, ProtocolError> {
        let first = self
            .submissions
            .get(submitter)
            .ok_or_else(|| ProtocolError::NotPosted(submitter.to_string()))?;
        if position >= self.num_fields {
            return Err(ProtocolError::FieldPositionOutOfRange { position, num_fields: self.num_fields });
        }
        Ok(first + position)
    }

    pub fn is_attested(&self, field_index: usize) -> Result<bool, ProtocolError> {
        Ok(self.slot(field_index)?.attested)
    }

    pub fn attester_of(&self, field_index: usize) -> Result<Address, ProtocolError> {
        Ok(self.slot(field_index)?.attester)
    }

    pub fn commitment_of(&self, field_index: usize) -> Result<Fr, ProtocolError> {
        Ok(self.slot(field_index)?.commitment)
    }

    pub fn field_commitment(&self, field_index: usize) -> Result<&FieldCommitment, ProtocolError> {
        self.slot(field_index)
    }

    pub fn list_validated_submitters(&self) -> &[Address] {
        &self.validated_submitters
    }

    pub fn is_validated(&self, submitter: &Address) -> bool {
        self.validated_submitters.contains(submitter)
    }

    pub fn is_valid_institution(&self, address: &Address) -> bool {
        self.valid_institutions.contains(address)
    }

    /// Verifier inputs for `submitter`: its commitments, then the instance constants.
    ///
    /// Fails unless every one of the submitter's fields is attested.
    pub fn public_inputs_for(&self, submitter: &Address) -> Result<Vec<Fr>, ProtocolError> {
        let first = *self
            .submissions
            .get(submitter)
            .ok_or_else(|| ProtocolError::NotPosted(submitter.to_string()))?;
        let slots = &self.fields[first..first + self.num_fields];

        if let Some(pos) = slots.iter().position(|s| !s.attested) {
            return Err(ProtocolError::NotFullyAttested {
                submitter: submitter.to_string(),
                field_index: first + pos,
            });
        }

        let commits: Vec<Fr> = slots.iter().map(|s| s.commitment).collect();
        let consts: Vec<Fr> = self.constants.iter().map(|k| Fr::from(*k)).collect();
        Ok(public_inputs(&commits, &consts))
    }

    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn constants(&self) -> &[u64] {
        &self.constants
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn num_field_slots(&self) -> usize {
        self.fields.len()
    }

    /// Every accepted event, in order.
    pub fn history(&self) -> &[LedgerEvent] {
        &self.history
    }
}
