//! Document schemas: named fields, numeric constraints between them, and the
//! institutions trusted to attest field values.
//!
//! A [`Schema`] can only be obtained through [`Schema::parse`], which either accepts the
//! whole document or rejects it. Field references are resolved to indices during parsing,
//! so every downstream consumer works with positions, never names.

use crate::codec;
use crate::constants::MAX_STRING_BYTES;
use crate::error::{EncodingError, SchemaError};
use crate::types::{keccak256, Address};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

// Wire shape of a schema file.

#[derive(Debug, Deserialize)]
struct RawSchema {
    fields: Vec<RawField>,
    #[serde(default)]
    constraints: Vec<RawConstraint>,
    #[serde(default)]
    trusted_institutions: Vec<RawInstitution>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    field_name: String,
    human_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    string: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawConstraint {
    #[serde(rename = "fieldA")]
    field_a: String,
    #[serde(rename = "fieldB")]
    field_b: String,
    op: String,
    constraint: String,
    #[serde(default)]
    constant: Option<Value>,
    #[serde(default, rename = "fieldCompare")]
    field_compare: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInstitution {
    address: String,
    #[serde(default)]
    human_name: Option<String>,
}

/// One named document field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
    pub field_name: String,
    pub human_name: String,
    pub description: Option<String>,
    /// ASCII string (at most 31 bytes) packed into one field element.
    pub is_string: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Add,
    Sub,
}

/// Comparison between a constraint's left-hand side and its right-hand side.
///
/// Both comparisons are non-strict: `Lt` holds when `lhs <= rhs` and `Gt` holds when
/// `lhs >= rhs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compare {
    Lt,
    Gt,
}

/// Right-hand side of a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rhs {
    Constant(u64),
    /// Index of a numeric field.
    Field(usize),
}

/// `fields[field_a] (op) fields[field_b]  (compare)  rhs`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub field_a: usize,
    pub field_b: usize,
    pub op: Op,
    pub compare: Compare,
    pub rhs: Rhs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrustedInstitution {
    pub address: Address,
    pub human_name: Option<String>,
}

/// A validated, immutable schema.
#[derive(Clone, Debug, Serialize)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    constraints: Vec<Constraint>,
    trusted_institutions: Vec<TrustedInstitution>,
    schema_hash: String,
}

impl Schema {
    /// Parse and validate a schema file.
    pub fn parse(raw_json: &str, name: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(raw_json).map_err(|e| SchemaError::Json(e.to_string()))?;
        let schema_hash = schema_hash_of(&value);

        let raw: RawSchema = serde_json::from_value(value).map_err(|e| SchemaError::Json(e.to_string()))?;

        if raw.fields.is_empty() {
            return Err(SchemaError::NoFields);
        }
        let mut seen = HashSet::new();
        for f in &raw.fields {
            if !seen.insert(f.field_name.as_str()) {
                return Err(SchemaError::DuplicateField(f.field_name.clone()));
            }
        }

        let fields: Vec<Field> = raw
            .fields
            .into_iter()
            .map(|f| Field {
                field_name: f.field_name,
                human_name: f.human_name,
                description: f.description,
                is_string: f.string.unwrap_or(false),
            })
            .collect();

        let constraints = raw
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| resolve_constraint(&fields, i, c))
            .collect::<Result<Vec<_>, _>>()?;

        if raw.trusted_institutions.is_empty() {
            return Err(SchemaError::NoTrustedInstitutions);
        }
        let trusted_institutions = raw
            .trusted_institutions
            .into_iter()
            .enumerate()
            .map(|(index, inst)| {
                let address = inst
                    .address
                    .parse::<Address>()
                    .map_err(|_| SchemaError::InvalidInstitutionAddress { index, address: inst.address.clone() })?;
                Ok(TrustedInstitution { address, human_name: inst.human_name })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        tracing::debug!(
            name,
            fields = fields.len(),
            constraints = constraints.len(),
            %schema_hash,
            "schema validated"
        );

        Ok(Self {
            name: name.to_string(),
            fields,
            constraints,
            trusted_institutions,
            schema_hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn trusted_institutions(&self) -> &[TrustedInstitution] {
        &self.trusted_institutions
    }

    /// `0x`-prefixed keccak-256 of the canonical schema JSON.
    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    pub fn get_field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.field_name == name)
    }

    /// Constants of constant-rhs constraints, in declaration order.
    ///
    /// This is the order of the `consts[]` public inputs.
    pub fn constants(&self) -> Vec<u64> {
        self.constraints
            .iter()
            .filter_map(|c| match c.rhs {
                Rhs::Constant(k) => Some(k),
                Rhs::Field(_) => None,
            })
            .collect()
    }

    /// Check a list of raw values (one per field, in field order).
    pub fn check_values(&self, values: &[String]) -> Result<(), EncodingError> {
        if values.len() != self.fields.len() {
            return Err(EncodingError::WrongValueCount { expected: self.fields.len(), got: values.len() });
        }

        for (i, (value, field)) in values.iter().zip(&self.fields).enumerate() {
            if field.is_string {
                if !value.is_ascii() {
                    return Err(EncodingError::NonAscii { field: i });
                }
                if value.len() > MAX_STRING_BYTES {
                    return Err(EncodingError::StringTooLong { field: i, len: value.len() });
                }
            } else if !is_decimal(value) {
                return Err(EncodingError::NotNumeric { field: i, value: value.clone() });
            }
        }
        Ok(())
    }

    pub fn validate_values(&self, values: &[String]) -> bool {
        self.check_values(values).is_ok()
    }

    /// Encode raw values into field elements according to each field's type.
    pub fn convert_values(&self, values: &[String]) -> Result<Vec<Fr>, EncodingError> {
        self.check_values(values)?;

        values
            .iter()
            .zip(&self.fields)
            .enumerate()
            .map(|(i, (value, field))| {
                if field.is_string {
                    Ok(codec::encode_string_to_field(value))
                } else {
                    codec::parse_numeric(i, value)
                }
            })
            .collect()
    }
}

fn resolve_constraint(fields: &[Field], index: usize, raw: &RawConstraint) -> Result<Constraint, SchemaError> {
    let op = match raw.op.as_str() {
        "ADD" => Op::Add,
        "SUB" => Op::Sub,
        other => return Err(SchemaError::InvalidOp { constraint: index, op: other.to_string() }),
    };
    let compare = match raw.constraint.as_str() {
        "LT" => Compare::Lt,
        "GT" => Compare::Gt,
        other => return Err(SchemaError::InvalidCompare { constraint: index, compare: other.to_string() }),
    };

    let lookup = |name: &str| -> Result<usize, SchemaError> {
        let i = fields
            .iter()
            .position(|f| f.field_name == name)
            .ok_or_else(|| SchemaError::UnknownField { constraint: index, field: name.to_string() })?;
        if fields[i].is_string {
            return Err(SchemaError::StringFieldInConstraint { constraint: index, field: name.to_string() });
        }
        Ok(i)
    };

    let rhs = match (&raw.constant, &raw.field_compare) {
        (Some(_), Some(_)) => return Err(SchemaError::AmbiguousRhs { constraint: index }),
        (None, None) => return Err(SchemaError::MissingRhs { constraint: index }),
        (Some(k), None) => Rhs::Constant(constant_value(index, k)?),
        (None, Some(name)) => Rhs::Field(lookup(name)?),
    };

    Ok(Constraint {
        field_a: lookup(&raw.field_a)?,
        field_b: lookup(&raw.field_b)?,
        op,
        compare,
        rhs,
    })
}

/// Constants are JSON integers or decimal digit strings; fractions and negatives are rejected.
fn constant_value(index: usize, v: &Value) -> Result<u64, SchemaError> {
    let invalid = || SchemaError::InvalidConstant { constraint: index, value: v.to_string() };
    match v {
        Value::Number(n) => n.as_u64().ok_or_else(invalid),
        Value::String(s) if is_decimal(s) => s.parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Objects re-emitted with sorted keys so key order never affects the hash.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hash of the re-parsed, compactly re-serialized schema document.
fn schema_hash_of(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    format!("0x{}", hex::encode(keccak256(canonical.as_bytes())))
}

/// Schema hash of a raw schema file, without validating it.
pub fn schema_hash(raw_json: &str) -> Result<String, SchemaError> {
    let value: Value = serde_json::from_str(raw_json).map_err(|e| SchemaError::Json(e.to_string()))?;
    Ok(schema_hash_of(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const INSTITUTION: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    fn schema_with(constraints: Value) -> String {
        json!({
            "fields": [
                { "field_name": "balance_a", "human_name": "Balance A" },
                { "field_name": "balance_b", "human_name": "Balance B" },
                { "field_name": "income", "human_name": "Income", "description": "yearly" },
                { "field_name": "account_id", "human_name": "Account", "string": true }
            ],
            "constraints": constraints,
            "trusted_institutions": [{ "address": INSTITUTION, "human_name": "Bank" }]
        })
        .to_string()
    }

    #[test]
    fn parses_valid_schema() {
        let raw = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "GT", "constant": 1000 },
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "SUB", "constraint": "LT", "fieldCompare": "income" }
        ]));
        let schema = Schema::parse(&raw, "bank").unwrap();

        assert_eq!(schema.name(), "bank");
        assert_eq!(schema.num_fields(), 4);
        assert!(schema.fields()[3].is_string);
        assert_eq!(schema.fields()[2].description.as_deref(), Some("yearly"));
        assert_eq!(schema.get_field_index("income"), Some(2));
        assert_eq!(schema.get_field_index("missing"), None);
        assert_eq!(
            schema.constraints()[1],
            Constraint { field_a: 0, field_b: 1, op: Op::Sub, compare: Compare::Lt, rhs: Rhs::Field(2) }
        );
        assert_eq!(schema.constants(), vec![1000]);
        assert!(schema.schema_hash().starts_with("0x"));
        assert_eq!(schema.schema_hash().len(), 66);
    }

    #[test]
    fn rejects_both_or_neither_rhs() {
        let both = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "constant": 5, "fieldCompare": "income" }
        ]));
        assert_eq!(Schema::parse(&both, "s").unwrap_err(), SchemaError::AmbiguousRhs { constraint: 0 });

        let neither = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT" }
        ]));
        assert_eq!(Schema::parse(&neither, "s").unwrap_err(), SchemaError::MissingRhs { constraint: 0 });
    }

    #[test]
    fn rejects_bad_op_and_compare() {
        let raw = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "MUL", "constraint": "LT", "constant": 5 }
        ]));
        assert!(matches!(Schema::parse(&raw, "s"), Err(SchemaError::InvalidOp { constraint: 0, .. })));

        let raw = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "EQ", "constant": 5 }
        ]));
        assert!(matches!(Schema::parse(&raw, "s"), Err(SchemaError::InvalidCompare { constraint: 0, .. })));
    }

    #[test]
    fn rejects_fractional_and_negative_constants() {
        for bad in [json!(1.5), json!(-3), json!("12a"), json!(true)] {
            let raw = schema_with(json!([
                { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "constant": bad }
            ]));
            assert!(matches!(Schema::parse(&raw, "s"), Err(SchemaError::InvalidConstant { constraint: 0, .. })));
        }

        let zero = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "constant": 0 }
        ]));
        assert_eq!(Schema::parse(&zero, "s").unwrap().constants(), vec![0]);

        let digits = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "constant": "250" }
        ]));
        assert_eq!(Schema::parse(&digits, "s").unwrap().constants(), vec![250]);
    }

    #[test]
    fn rejects_string_fields_anywhere_in_constraint() {
        let cases = [
            json!({ "fieldA": "account_id", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "constant": 5 }),
            json!({ "fieldA": "balance_a", "fieldB": "account_id", "op": "ADD", "constraint": "LT", "constant": 5 }),
            json!({ "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "fieldCompare": "account_id" }),
        ];
        for case in cases {
            let raw = schema_with(json!([case]));
            assert!(matches!(
                Schema::parse(&raw, "s"),
                Err(SchemaError::StringFieldInConstraint { constraint: 0, .. })
            ));
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let raw = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "nope", "op": "ADD", "constraint": "LT", "constant": 5 }
        ]));
        assert!(matches!(Schema::parse(&raw, "s"), Err(SchemaError::UnknownField { constraint: 0, .. })));

        let raw = schema_with(json!([
            { "fieldA": "balance_a", "fieldB": "balance_b", "op": "ADD", "constraint": "LT", "fieldCompare": "nope" }
        ]));
        assert!(matches!(Schema::parse(&raw, "s"), Err(SchemaError::UnknownField { constraint: 0, .. })));
    }

    #[test]
    fn rejects_schema_without_fields() {
        let empty = json!({
            "fields": [],
            "constraints": [],
            "trusted_institutions": [{ "address": INSTITUTION }]
        })
        .to_string();
        assert_eq!(Schema::parse(&empty, "s").unwrap_err(), SchemaError::NoFields);

        let missing = json!({ "trusted_institutions": [{ "address": INSTITUTION }] }).to_string();
        assert!(matches!(Schema::parse(&missing, "s"), Err(SchemaError::Json(_))));
    }

    #[test]
    fn rejects_bad_institutions_and_duplicates() {
        let field = json!([{ "field_name": "a", "human_name": "A" }]);
        let none = json!({ "fields": field, "constraints": [], "trusted_institutions": [] }).to_string();
        assert_eq!(Schema::parse(&none, "s").unwrap_err(), SchemaError::NoTrustedInstitutions);

        let bad = json!({
            "fields": field, "constraints": [],
            "trusted_institutions": [{ "address": INSTITUTION }, { "address": "0x1234" }]
        })
        .to_string();
        assert!(matches!(
            Schema::parse(&bad, "s"),
            Err(SchemaError::InvalidInstitutionAddress { index: 1, .. })
        ));

        let dup = json!({
            "fields": [
                { "field_name": "a", "human_name": "A" },
                { "field_name": "a", "human_name": "A again" }
            ],
            "trusted_institutions": [{ "address": INSTITUTION }]
        })
        .to_string();
        assert_eq!(Schema::parse(&dup, "s").unwrap_err(), SchemaError::DuplicateField("a".to_string()));

        assert!(matches!(Schema::parse("{ not json", "s"), Err(SchemaError::Json(_))));
    }

    #[test]
    fn schema_hash_ignores_formatting_and_key_order() {
        let compact = r#"{"fields":[{"field_name":"a","human_name":"A"}],"constraints":[],"trusted_institutions":[{"address":"0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"}]}"#;
        let spaced = r#"{
            "trusted_institutions": [ { "address": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed" } ],
            "constraints": [],
            "fields": [ { "human_name": "A", "field_name": "a" } ]
        }"#;
        let a = Schema::parse(compact, "a").unwrap();
        let b = Schema::parse(spaced, "b").unwrap();
        assert_eq!(a.schema_hash(), b.schema_hash());
        assert_eq!(schema_hash(spaced).unwrap(), a.schema_hash());

        let changed = compact.replace("\"A\"", "\"B\"");
        assert_ne!(schema_hash(&changed).unwrap(), a.schema_hash());
    }

    #[test]
    fn validates_and_converts_values() {
        let raw = schema_with(json!([]));
        let schema = Schema::parse(&raw, "s").unwrap();
        let values = |v: [&str; 4]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(schema.validate_values(&values(["100", "200", "300", "the"])));
        assert!(!schema.validate_values(&values(["100", "-200", "300", "the"])));
        assert!(!schema.validate_values(&values(["100", "2.5", "300", "the"])));
        assert!(!schema.validate_values(&values(["100", "", "300", "the"])));
        assert!(!schema.validate_values(&values(["100", "200", "300", "thé"])));
        assert!(!schema.validate_values(&values(["100", "200", "300", &"x".repeat(32)])));
        assert!(schema.validate_values(&values(["100", "200", "300", &"x".repeat(31)])));
        assert!(!schema.validate_values(&values(["100", "200", "300", "the"])[..3].to_vec()));

        let converted = schema.convert_values(&values(["100", "200", "007", "12"])).unwrap();
        assert_eq!(converted, vec![Fr::from(100u64), Fr::from(200u64), Fr::from(7u64), Fr::from(0x3132u64)]);

        assert_eq!(
            schema.convert_values(&values(["1", "x", "3", "a"])).unwrap_err(),
            EncodingError::NotNumeric { field: 1, value: "x".to_string() }
        );
    }
}
