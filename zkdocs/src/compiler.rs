//! Schema -> constraint program.
//!
//! The program is a structured IR: an ordered gate list over typed signal references.
//! Its public interface is always
//!
//! - public:  `commits[num_fields]`, `consts[num_constants]`
//! - private: `values[num_fields]`, `nonces[2 * num_fields]`
//!
//! and its gates are `num_fields` commitment checks followed by one comparison per schema
//! constraint, in declaration order. Backends interpret the IR ([`crate::circuit`]) or
//! render it to text ([`crate::circom`]).

use crate::constants::COMPARATOR_BITS;
use crate::error::{CompileError, ZkError};
use crate::schema::{Compare, Op, Rhs, Schema};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Serialize};

/// A reference to one program input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Signal {
    Commit(usize),
    Const(usize),
    Value(usize),
    Nonce(usize),
}

/// Comparison orientation. Both are non-strict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// `lhs <= rhs` (schema `LT`).
    LessEq,
    /// `lhs >= rhs` (schema `GT`).
    GreaterEq,
}

impl From<Compare> for Relation {
    fn from(c: Compare) -> Self {
        match c {
            Compare::Lt => Relation::LessEq,
            Compare::Gt => Relation::GreaterEq,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum Gate {
    /// `Poseidon(value, nonce_a, nonce_b) == commit`
    Commitment {
        field: usize,
        value: Signal,
        nonce_a: Signal,
        nonce_b: Signal,
        commit: Signal,
    },
    /// `(a op b) relation rhs`, asserted true.
    Comparison {
        constraint: usize,
        a: Signal,
        op: Op,
        b: Signal,
        relation: Relation,
        rhs: Signal,
    },
}

/// Compiled, backend-independent description of a document circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintProgram {
    pub num_fields: usize,
    /// `consts[]` public inputs, slot `i` holding `constants[i]`.
    pub constants: Vec<u64>,
    pub comparator_bits: usize,
    pub gates: Vec<Gate>,
}

/// Compile a validated schema.
///
/// Constant slots are handed out in declaration order and only to constant-rhs
/// constraints, so `program.constants == schema.constants()`.
pub fn compile(schema: &Schema) -> Result<ConstraintProgram, CompileError> {
    let num_fields = schema.num_fields();
    let mut gates = Vec::with_capacity(num_fields + schema.constraints().len());

    for i in 0..num_fields {
        gates.push(Gate::Commitment {
            field: i,
            value: Signal::Value(i),
            nonce_a: Signal::Nonce(2 * i),
            nonce_b: Signal::Nonce(2 * i + 1),
            commit: Signal::Commit(i),
        });
    }

    let numeric = |constraint: usize, field: usize| -> Result<Signal, CompileError> {
        let f = schema
            .fields()
            .get(field)
            .ok_or(CompileError::FieldOutOfRange { constraint, field, num_fields })?;
        if f.is_string {
            return Err(CompileError::StringOperand { constraint, field });
        }
        Ok(Signal::Value(field))
    };

    let mut constants = Vec::new();
    for (index, c) in schema.constraints().iter().enumerate() {
        let rhs = match c.rhs {
            Rhs::Constant(k) => {
                constants.push(k);
                Signal::Const(constants.len() - 1)
            }
            Rhs::Field(f) => numeric(index, f)?,
        };

        gates.push(Gate::Comparison {
            constraint: index,
            a: numeric(index, c.field_a)?,
            op: c.op,
            b: numeric(index, c.field_b)?,
            relation: c.compare.into(),
            rhs,
        });
    }

    tracing::debug!(
        schema = schema.name(),
        num_fields,
        num_constants = constants.len(),
        gates = gates.len(),
        "compiled constraint program"
    );

    Ok(ConstraintProgram {
        num_fields,
        constants,
        comparator_bits: COMPARATOR_BITS,
        gates,
    })
}

impl ConstraintProgram {
    pub fn num_constants(&self) -> usize {
        self.constants.len()
    }

    /// Number of public inputs (`commits` then `consts`).
    pub fn num_public_inputs(&self) -> usize {
        self.num_fields + self.constants.len()
    }

    pub fn constants_as_field(&self) -> Vec<Fr> {
        self.constants.iter().map(|k| Fr::from(*k)).collect()
    }

    pub fn comparisons(&self) -> impl Iterator<Item = &Gate> {
        self.gates.iter().filter(|g| matches!(g, Gate::Comparison { .. }))
    }

    /// Evaluate every comparison gate natively with the in-circuit semantics.
    ///
    /// Commitment gates are not checked here; commitments are derived from the same
    /// witness by the prover.
    pub fn check_witness(&self, values: &[Fr], consts: &[Fr]) -> Result<(), ZkError> {
        if values.len() != self.num_fields {
            return Err(ZkError::FieldCountMismatch { expected: self.num_fields, got: values.len() });
        }
        if consts.len() != self.constants.len() {
            return Err(ZkError::ConstantCountMismatch { expected: self.constants.len(), got: consts.len() });
        }

        // Comparisons only read values and constants.
        let read = |constraint: usize, s: Signal| -> Result<Fr, ZkError> {
            let v = match s {
                Signal::Value(i) => values.get(i),
                Signal::Const(i) => consts.get(i),
                Signal::Commit(_) | Signal::Nonce(_) => None,
            };
            v.copied().ok_or_else(|| ZkError::MalformedGate { constraint, signal: format!("{s:?}") })
        };

        for gate in &self.gates {
            let Gate::Comparison { constraint, a, op, b, relation, rhs } = *gate else {
                continue;
            };
            let (a, b) = (read(constraint, a)?, read(constraint, b)?);
            let lhs = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
            };
            if !compare_native(lhs, read(constraint, rhs)?, relation, self.comparator_bits) {
                return Err(ZkError::Unsatisfied { constraint });
            }
        }
        Ok(())
    }
}

/// Both operands must fit in `bits` bits; a wrapped negative difference never does.
fn compare_native(lhs: Fr, rhs: Fr, relation: Relation, bits: usize) -> bool {
    let (l, r) = (lhs.into_bigint(), rhs.into_bigint());
    if l.num_bits() as usize > bits || r.num_bits() as usize > bits {
        return false;
    }
    match relation {
        Relation::LessEq => l <= r,
        Relation::GreaterEq => l >= r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn schema(constraints: serde_json::Value) -> Schema {
        let raw = json!({
            "fields": [
                { "field_name": "f0", "human_name": "F0" },
                { "field_name": "f1", "human_name": "F1" },
                { "field_name": "f2", "human_name": "F2" },
                { "field_name": "name", "human_name": "Name", "string": true }
            ],
            "constraints": constraints,
            "trusted_institutions": [{ "address": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed" }]
        });
        Schema::parse(&raw.to_string(), "test").unwrap()
    }

    fn fr(xs: &[u64]) -> Vec<Fr> {
        xs.iter().map(|x| Fr::from(*x)).collect()
    }

    #[test]
    fn emits_commitment_gates_first() {
        let program = compile(&schema(json!([]))).unwrap();
        assert_eq!(program.num_fields, 4);
        assert_eq!(program.gates.len(), 4);
        assert_eq!(
            program.gates[2],
            Gate::Commitment {
                field: 2,
                value: Signal::Value(2),
                nonce_a: Signal::Nonce(4),
                nonce_b: Signal::Nonce(5),
                commit: Signal::Commit(2),
            }
        );
    }

    #[test]
    fn constant_slots_follow_declaration_order() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "ADD", "constraint": "LT", "constant": 500 },
            { "fieldA": "f0", "fieldB": "f2", "op": "SUB", "constraint": "GT", "fieldCompare": "f1" },
            { "fieldA": "f1", "fieldB": "f2", "op": "ADD", "constraint": "GT", "constant": 7 }
        ]));
        let program = compile(&s).unwrap();

        assert_eq!(program.constants, vec![500, 7]);
        assert_eq!(program.constants, s.constants());
        assert_eq!(program.num_public_inputs(), 6);

        let rhs: Vec<Signal> = program
            .comparisons()
            .map(|g| match g {
                Gate::Comparison { rhs, .. } => *rhs,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(rhs, vec![Signal::Const(0), Signal::Value(1), Signal::Const(1)]);

        assert_eq!(
            program.gates[5],
            Gate::Comparison {
                constraint: 1,
                a: Signal::Value(0),
                op: Op::Sub,
                b: Signal::Value(2),
                relation: Relation::GreaterEq,
                rhs: Signal::Value(1),
            }
        );
    }

    #[test]
    fn native_check_uses_non_strict_comparisons() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "ADD", "constraint": "LT", "constant": 300 }
        ]));
        let program = compile(&s).unwrap();
        let consts = program.constants_as_field();

        assert!(program.check_witness(&fr(&[100, 200, 0, 0]), &consts).is_ok());
        assert!(program.check_witness(&fr(&[100, 199, 0, 0]), &consts).is_ok());
        assert!(matches!(
            program.check_witness(&fr(&[100, 201, 0, 0]), &consts),
            Err(ZkError::Unsatisfied { constraint: 0 })
        ));
    }

    #[test]
    fn negative_difference_is_unsatisfiable() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "SUB", "constraint": "LT", "constant": 1000 }
        ]));
        let program = compile(&s).unwrap();
        let consts = program.constants_as_field();

        assert!(program.check_witness(&fr(&[500, 100, 0, 0]), &consts).is_ok());
        assert!(program.check_witness(&fr(&[100, 500, 0, 0]), &consts).is_err());
    }

    #[test]
    fn operands_wider_than_comparator_are_unsatisfiable() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "ADD", "constraint": "GT", "constant": 1 }
        ]));
        let program = compile(&s).unwrap();
        let consts = program.constants_as_field();

        assert!(program.check_witness(&fr(&[u64::MAX, 0, 0, 0]), &consts).is_ok());
        assert!(program.check_witness(&fr(&[u64::MAX, 1, 0, 0]), &consts).is_err());
    }

    #[test]
    fn check_witness_validates_arity() {
        let program = compile(&schema(json!([]))).unwrap();
        assert!(matches!(
            program.check_witness(&fr(&[1, 2]), &[]),
            Err(ZkError::FieldCountMismatch { expected: 4, got: 2 })
        ));
        assert!(matches!(
            program.check_witness(&fr(&[1, 2, 3, 4]), &fr(&[1])),
            Err(ZkError::ConstantCountMismatch { expected: 0, got: 1 })
        ));
    }

    #[test]
    fn check_witness_rejects_gates_reading_private_or_missing_signals() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "ADD", "constraint": "LT", "constant": 300 }
        ]));
        let values = fr(&[1, 2, 0, 0]);

        for bad in [Signal::Nonce(0), Signal::Commit(1), Signal::Const(5), Signal::Value(9)] {
            let mut program = compile(&s).unwrap();
            let consts = program.constants_as_field();
            if let Some(Gate::Comparison { rhs, .. }) = program.gates.last_mut() {
                *rhs = bad;
            }
            assert!(matches!(
                program.check_witness(&values, &consts),
                Err(ZkError::MalformedGate { constraint: 0, .. })
            ));
        }
    }

    #[test]
    fn ir_serializes_to_json() {
        let s = schema(json!([
            { "fieldA": "f0", "fieldB": "f1", "op": "ADD", "constraint": "LT", "constant": 300 }
        ]));
        let program = compile(&s).unwrap();
        let v = serde_json::to_value(&program).unwrap();

        assert_eq!(v["constants"], json!([300]));
        assert_eq!(v["gates"][4]["gate"], "comparison");
        assert_eq!(v["gates"][4]["relation"], "less_eq");
        assert_eq!(v["gates"][4]["rhs"], json!({ "kind": "const", "index": 0 }));

        let back: ConstraintProgram = serde_json::from_value(v).unwrap();
        assert_eq!(back, program);
    }

    #[derive(Clone, Debug)]
    enum RhsPick {
        Constant(u64),
        Field(usize),
    }

    fn arb_constraint() -> impl Strategy<Value = (bool, bool, usize, usize, RhsPick)> {
        let rhs = prop_oneof![
            any::<u64>().prop_map(RhsPick::Constant),
            (0usize..7).prop_map(RhsPick::Field),
        ];
        (any::<bool>(), any::<bool>(), 0usize..7, 0usize..7, rhs)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn every_valid_schema_compiles(
            string_flags in prop::collection::vec(any::<bool>(), 1..6),
            picks in prop::collection::vec(arb_constraint(), 0..6),
        ) {
            let fields: Vec<_> = string_flags
                .iter()
                .enumerate()
                .map(|(i, s)| json!({ "field_name": format!("f{i}"), "human_name": format!("F{i}"), "string": s }))
                .collect();
            let constraints: Vec<_> = picks
                .iter()
                .map(|(add, lt, a, b, rhs)| {
                    let mut c = json!({
                        "fieldA": format!("f{a}"),
                        "fieldB": format!("f{b}"),
                        "op": if *add { "ADD" } else { "SUB" },
                        "constraint": if *lt { "LT" } else { "GT" },
                    });
                    match rhs {
                        RhsPick::Constant(k) => c["constant"] = json!(k),
                        RhsPick::Field(f) => c["fieldCompare"] = json!(format!("f{f}")),
                    }
                    c
                })
                .collect();
            let raw = json!({
                "fields": fields,
                "constraints": constraints,
                "trusted_institutions": [{ "address": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed" }]
            });

            let numeric = |i: usize| i < string_flags.len() && !string_flags[i];
            let valid = picks.iter().all(|(_, _, a, b, rhs)| {
                numeric(*a) && numeric(*b) && match rhs {
                    RhsPick::Constant(_) => true,
                    RhsPick::Field(f) => numeric(*f),
                }
            });

            let parsed = Schema::parse(&raw.to_string(), "generated");
            prop_assert_eq!(parsed.is_ok(), valid);

            if let Ok(schema) = parsed {
                let program = compile(&schema).unwrap();
                let expected: Vec<u64> = picks
                    .iter()
                    .filter_map(|(.., rhs)| match rhs {
                        RhsPick::Constant(k) => Some(*k),
                        RhsPick::Field(_) => None,
                    })
                    .collect();
                prop_assert_eq!(&program.constants, &schema.constants());
                prop_assert_eq!(&program.constants, &expected);
                prop_assert_eq!(program.gates.len(), string_flags.len() + picks.len());
                prop_assert_eq!(program.comparisons().count(), picks.len());
            }
        }
    }
}
