//! Render a [`ConstraintProgram`] as circom 2 source for an external circom/snarkjs
//! toolchain.
//!
//! The rendered circuit uses circomlib's `Poseidon(3)`, so commitments checked by it must
//! be produced with circomlib's Poseidon parameters rather than [`crate::codec::commit`].
//!
//! circomlib comparators assume their inputs already fit in the comparator width, so both
//! sides of every comparison are range-checked with `Num2Bits` (from `bitify.circom`, which
//! `comparators.circom` includes). A `SUB` that goes negative is unsatisfiable, as in
//! [`crate::circuit`].

use crate::compiler::{ConstraintProgram, Gate, Relation, Signal};
use crate::schema::Op;
use std::fmt::Write;

fn signal(s: Signal) -> String {
    match s {
        Signal::Commit(i) => format!("commits[{i}]"),
        Signal::Const(i) => format!("consts[{i}]"),
        Signal::Value(i) => format!("values[{i}]"),
        Signal::Nonce(i) => format!("nonces[{i}]"),
    }
}

impl ConstraintProgram {
    /// `include_prefix` is prepended to the `node_modules/circomlib` include paths.
    pub fn to_circom(&self, include_prefix: &str) -> String {
        let mut body = String::new();

        for gate in &self.gates {
            match *gate {
                Gate::Commitment { field, value, nonce_a, nonce_b, commit } => {
                    let _ = writeln!(body, "    hashers[{field}] = Poseidon(3);");
                    let _ = writeln!(body, "    hashers[{field}].inputs[0] <== {};", signal(value));
                    let _ = writeln!(body, "    hashers[{field}].inputs[1] <== {};", signal(nonce_a));
                    let _ = writeln!(body, "    hashers[{field}].inputs[2] <== {};", signal(nonce_b));
                    let _ = writeln!(body, "    hashers[{field}].out === {};", signal(commit));
                    body.push('\n');
                }
                Gate::Comparison { constraint, a, op, b, relation, rhs } => {
                    let sign = match op {
                        Op::Add => '+',
                        Op::Sub => '-',
                    };
                    let comparator = match relation {
                        Relation::LessEq => "LessEqThan",
                        Relation::GreaterEq => "GreaterEqThan",
                    };
                    let bits = self.comparator_bits;
                    let _ = writeln!(body, "    signal lhs{constraint};");
                    let _ = writeln!(body, "    lhs{constraint} <== {} {sign} {};", signal(a), signal(b));
                    let _ = writeln!(body, "    component lhsBits{constraint} = Num2Bits({bits});");
                    let _ = writeln!(body, "    lhsBits{constraint}.in <== lhs{constraint};");
                    let _ = writeln!(body, "    component rhsBits{constraint} = Num2Bits({bits});");
                    let _ = writeln!(body, "    rhsBits{constraint}.in <== {};", signal(rhs));
                    let _ = writeln!(body, "    component comp{constraint} = {comparator}({bits});");
                    let _ = writeln!(body, "    comp{constraint}.in[0] <== lhs{constraint};");
                    let _ = writeln!(body, "    comp{constraint}.in[1] <== {};", signal(rhs));
                    let _ = writeln!(body, "    comp{constraint}.out === 1;");
                    body.push('\n');
                }
            }
        }

        let n = self.num_fields;
        let c = self.num_constants();
        let public = if c == 0 { "commits" } else { "commits, consts" };
        let consts_decl = if c == 0 { String::new() } else { format!("    signal input consts[{c}];\n") };

        format!(
            r#"pragma circom 2.0.2;

include "{include_prefix}node_modules/circomlib/circuits/comparators.circom";
include "{include_prefix}node_modules/circomlib/circuits/poseidon.circom";

template VerifyDocument(numFields) {{
    // Public inputs
    signal input commits[numFields];
{consts_decl}
    // Private inputs
    signal input values[numFields];
    signal input nonces[2*numFields];

    component hashers[numFields];

{body}}}

component main {{public [{public}]}} = VerifyDocument({n});
"#
        )
    }
}
