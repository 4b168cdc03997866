//! Types shared between the schema, the codec, the circuit and the protocol.

use crate::error::EncodingError;
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Keccak-256 digest of `bytes`.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(bytes));
    out
}

/// A 20-byte chain account identifier (`0x` followed by 40 hex digits).
///
/// Parsing accepts all-lowercase or all-uppercase digits; mixed case must carry a valid
/// EIP-55 checksum. Display always renders the checksummed form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 mixed-case rendering.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EncodingError::InvalidAddress(s.to_string());

        let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid())?;
        let addr = Address(bytes);

        let all_lower = !digits.chars().any(|c| c.is_ascii_uppercase());
        let all_upper = !digits.chars().any(|c| c.is_ascii_lowercase());
        if !all_lower && !all_upper && addr.to_checksum()[2..] != *digits {
            return Err(invalid());
        }

        Ok(addr)
    }
}

impl TryFrom<String> for Address {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_checksum()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

/// Render a field element as `0x` + 64 big-endian hex digits.
pub fn fr_to_hex(x: &Fr) -> String {
    format!("0x{}", hex::encode(x.into_bigint().to_bytes_be()))
}

/// Parse a `0x`-prefixed (or bare) big-endian hex string into a field element.
///
/// Values at or above the scalar modulus are rejected rather than reduced.
pub fn fr_from_hex(s: &str) -> Result<Fr, EncodingError> {
    let invalid = || EncodingError::InvalidFieldHex(s.to_string());

    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() || digits.len() > 64 {
        return Err(invalid());
    }
    let padded = if digits.len() % 2 == 1 { format!("0{digits}") } else { digits.to_string() };
    let bytes = hex::decode(padded).map_err(|_| invalid())?;

    let n = BigUint::from_bytes_be(&bytes);
    if n >= BigUint::from(Fr::MODULUS) {
        return Err(invalid());
    }
    Ok(Fr::from(n))
}

/// Serde adapter: a single [`Fr`] as a hex string.
pub mod fr_hex {
    use super::{fr_from_hex, fr_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &Fr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&fr_to_hex(x))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(d)?;
        fr_from_hex(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter: a list of [`Fr`] as hex strings.
pub mod fr_hex_vec {
    use super::{fr_from_hex, fr_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(xs: &[Fr], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(xs.iter().map(fr_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Fr>, D::Error> {
        let v = Vec::<String>::deserialize(d)?;
        v.iter()
            .map(|s| fr_from_hex(s).map_err(D::Error::custom))
            .collect()
    }
}
