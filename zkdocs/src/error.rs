//! Error taxonomy for schemas, value encoding, compilation, proving and the attestation
//! protocol.
//!
//! Every variant names the constraint, field or field slot it concerns so a caller can
//! localize the fault. Nothing here is ever downgraded to a default value.

use thiserror::Error;

/// A schema document was malformed or violated a validation rule.
///
/// Validation is all-or-nothing: a schema that produced any of these is never usable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Json(String),

    #[error("duplicate field name `{0}`")]
    DuplicateField(String),

    #[error("constraint {constraint}: unknown op `{op}` (expected ADD or SUB)")]
    InvalidOp { constraint: usize, op: String },

    #[error("constraint {constraint}: unknown comparison `{compare}` (expected LT or GT)")]
    InvalidCompare { constraint: usize, compare: String },

    #[error("constraint {constraint}: both `constant` and `fieldCompare` are set")]
    AmbiguousRhs { constraint: usize },

    #[error("constraint {constraint}: neither `constant` nor `fieldCompare` is set")]
    MissingRhs { constraint: usize },

    #[error("constraint {constraint}: constant `{value}` is not a non-negative integer")]
    InvalidConstant { constraint: usize, value: String },

    #[error("constraint {constraint}: unknown field `{field}`")]
    UnknownField { constraint: usize, field: String },

    #[error("constraint {constraint}: field `{field}` is a string field and cannot be compared")]
    StringFieldInConstraint { constraint: usize, field: String },

    #[error("schema declares no fields")]
    NoFields,

    #[error("schema declares no trusted institutions")]
    NoTrustedInstitutions,

    #[error("trusted institution {index}: invalid address `{address}`")]
    InvalidInstitutionAddress { index: usize, address: String },
}

/// A user-supplied value (or a hex/field encoding of one) could not be encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("expected {expected} values, got {got}")]
    WrongValueCount { expected: usize, got: usize },

    #[error("field {field}: `{value}` is not a non-negative integer")]
    NotNumeric { field: usize, value: String },

    #[error("field {field}: value does not fit in the scalar field")]
    NumericOverflow { field: usize },

    #[error("field {field}: string contains non-ASCII characters")]
    NonAscii { field: usize },

    #[error("field {field}: string is {len} bytes, at most 31 are allowed")]
    StringTooLong { field: usize, len: usize },

    #[error("expected {expected} nonces, got {got}")]
    WrongNonceCount { expected: usize, got: usize },

    #[error("nonce {index} repeats an earlier nonce")]
    NonceReuse { index: usize },

    #[error("invalid field element hex `{0}`")]
    InvalidFieldHex(String),

    #[error("invalid address `{0}`")]
    InvalidAddress(String),
}

/// The compiler and the schema validator disagree.
///
/// A validated [`crate::schema::Schema`] never produces this; seeing one is an internal
/// consistency fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("constraint {constraint}: references field slot {field} but the schema has {num_fields} fields")]
    FieldOutOfRange { constraint: usize, field: usize, num_fields: usize },

    #[error("constraint {constraint}: references string field {field}")]
    StringOperand { constraint: usize, field: usize },
}

/// Errors from the proving backend.
#[derive(Debug, Error)]
pub enum ZkError {
    #[error("expected {expected} fields, got {got}")]
    FieldCountMismatch { expected: usize, got: usize },

    #[error("expected {expected} constants, got {got}")]
    ConstantCountMismatch { expected: usize, got: usize },

    #[error("expected {expected} public inputs, got {got}")]
    PublicInputCountMismatch { expected: usize, got: usize },

    #[error("constraint {constraint}: comparison gate reads unusable signal {signal}")]
    MalformedGate { constraint: usize, signal: String },

    #[error("witness does not satisfy constraint {constraint}")]
    Unsatisfied { constraint: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("proof verification failed")]
    VerificationFailed,

    #[error("arkworks error: {0}")]
    Ark(String),
}

/// A protocol transition was refused. The instance is left untouched.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("schema declares {expected} fields, instance was given {got}")]
    FieldCountMismatch { expected: usize, got: usize },

    #[error("instance constants {got:?} do not match schema constants {expected:?}")]
    ConstantsMismatch { expected: Vec<u64>, got: Vec<u64> },

    #[error("{0} is not the instance admin")]
    NotAdmin(String),

    #[error("{0} is already a valid institution")]
    InstitutionAlreadyValid(String),

    #[error("{0} has already posted fields")]
    AlreadyPosted(String),

    #[error("{0} has not posted fields")]
    NotPosted(String),

    #[error("expected {expected} {what}, got {got}")]
    WrongArity { what: &'static str, expected: usize, got: usize },

    #[error("field {field}: designated attester {attester} is not a valid institution")]
    UnknownInstitution { field: usize, attester: String },

    #[error("field slot {0} does not exist")]
    UnknownFieldIndex(usize),

    #[error("field position {position} out of range for {num_fields} fields")]
    FieldPositionOutOfRange { position: usize, num_fields: usize },

    #[error("field slot {field_index}: {caller} is not the designated attester")]
    WrongAttester { field_index: usize, caller: String },

    #[error("field slot {0} is already attested")]
    AlreadyAttested(usize),

    #[error("{submitter}: field slot {field_index} is not attested")]
    NotFullyAttested { submitter: String, field_index: usize },

    #[error("proof rejected: {0}")]
    Proof(#[from] ZkError),
}
