//! Zero-knowledge document attestation.
//!
//! A schema declares named fields and numeric relations between them. A holder commits to
//! private values field by field, trusted institutions attest the individual commitments,
//! and a Groth16 proof shows the hidden values satisfy every relation.
//!
//! - [`schema`]: parsing and validation of schema documents.
//! - [`codec`]: value encoding, Poseidon commitments and holder witnesses.
//! - [`compiler`]: schema to constraint-program IR ([`circom`] renders it as text).
//! - [`circuit`], [`groth16`]: the in-process proving backend.
//! - [`protocol`]: the post / attest / validate state machine.

pub mod circom;
pub mod circuit;
pub mod codec;
pub mod compiler;
pub mod constants;
pub mod error;
pub mod groth16;
pub mod protocol;
pub mod schema;
pub mod types;

pub use compiler::{compile, ConstraintProgram};
pub use error::{CompileError, EncodingError, ProtocolError, SchemaError, ZkError};
pub use protocol::{Command, DocumentInstance, LedgerEvent, Validation};
pub use schema::Schema;
pub use types::Address;
