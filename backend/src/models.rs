use ark_bn254::Fr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zkdocs::protocol::{FieldCommitment, Validation};
use zkdocs::types::fr_hex_vec;
use zkdocs::Address;

#[derive(Debug, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Display name of the schema.
    pub name: String,

    /// The schema document as JSON text. Its hash is computed over this text.
    pub schema: String,

    /// Account allowed to add institutions to the instance.
    pub admin: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeployResponse {
    pub instance_id: Uuid,
    pub schema_hash: String,
    pub num_fields: usize,
    pub constants: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_name: String,
    pub human_name: String,
    pub description: Option<String>,
    pub is_string: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub instance_id: Uuid,
    pub name: String,
    pub deployed_at: DateTime<Utc>,
    pub schema_hash: String,
    pub admin: Address,
    pub num_fields: usize,
    pub constants: Vec<u64>,
    pub fields: Vec<FieldInfo>,
    pub trusted_institutions: Vec<Address>,
    /// Number of field slots allocated across all submitters.
    pub num_field_slots: usize,
    pub validated_submitters: Vec<Address>,
}

#[derive(Debug, Deserialize)]
pub struct CircomParams {
    /// Prefix for the circomlib include paths.
    pub include_prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeysResponse {
    pub curve: String,
    pub proof_system: String,
    pub pk_b64: String,
    pub vk_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddInstitutionRequest {
    pub caller: Address,
    pub address: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostFieldsRequest {
    pub submitter: Address,

    /// One commitment per schema field, `0x`-prefixed big-endian hex.
    #[serde(with = "fr_hex_vec")]
    pub commitments: Vec<Fr>,

    /// Designated attester per field.
    pub attesters: Vec<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostFieldsResponse {
    pub submitter: Address,
    pub first_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttestRequest {
    pub attester: Address,
    pub field_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub submitter: Address,
    /// Compressed Groth16 proof, base64.
    pub proof_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub submitter: Address,
    pub outcome: Validation,
}

#[derive(Debug, Serialize)]
pub struct FieldResponse {
    pub field_index: usize,
    #[serde(flatten)]
    pub field: FieldCommitment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldIndexResponse {
    pub submitter: Address,
    pub position: usize,
    pub field_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidatedResponse {
    pub validated_submitters: Vec<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
