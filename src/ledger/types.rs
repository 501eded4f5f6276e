//! Ledger primitive types
//!
//! Addresses, amounts and the on-chain record shapes. Everything here is
//! plain data; the rules live in `contract.rs`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// On-chain post identifier (issued by the ledger, starting at 1)
pub type PostId = u64;

/// On-chain comment identifier (issued by the ledger, starting at 1)
pub type CommentId = u64;

/// 20-byte account address, always held in lowercase `0x` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The zero address (recorded as commenter for anonymous comments)
    pub const ZERO_STR: &'static str = "0x0000000000000000000000000000000000000000";

    pub fn zero() -> Self {
        Self(Self::ZERO_STR.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO_STR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse and normalise an address. Accepts mixed case, requires the
    /// `0x` prefix and exactly 40 hex digits.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError(format!("missing 0x prefix: {}", raw)))?;

        if hex_part.len() != 40 {
            return Err(AddressError(format!(
                "expected 40 hex digits, got {}",
                hex_part.len()
            )));
        }
        if hex::decode(hex_part).is_err() {
            return Err(AddressError(format!("invalid hex: {}", raw)));
        }

        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }
}

/// Address parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address: {0}")]
pub struct AddressError(String);

impl Default for Address {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount in wei. Serialised as a decimal string (BSON has no u128 and
/// JSON numbers lose precision above 2^53).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }

    pub fn checked_sub(self, other: Wei) -> Option<Wei> {
        self.0.checked_sub(other.0).map(Wei)
    }

    /// Whole ether expressed in wei
    pub fn ether(amount: u64) -> Wei {
        Wei(u128::from(amount) * 1_000_000_000_000_000_000)
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wei {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Wei)
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WeiVisitor;

        impl<'de> Visitor<'de> for WeiVisitor {
            type Value = Wei;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal string or non-negative integer amount")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Wei, E> {
                v.parse::<Wei>().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Wei, E> {
                Ok(Wei(u128::from(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Wei, E> {
                u128::try_from(v)
                    .map(Wei)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Wei, E> {
                Ok(Wei(v))
            }
        }

        deserializer.deserialize_any(WeiVisitor)
    }
}

/// Content kind for posts and comments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[default]
    Text,
    Voice,
}

impl ContentType {
    /// ABI enum discriminant
    pub fn as_u8(self) -> u8 {
        match self {
            ContentType::Text => 0,
            ContentType::Voice => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "TEXT",
            ContentType::Voice => "VOICE",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" | "0" => Ok(ContentType::Text),
            "VOICE" | "1" => Ok(ContentType::Voice),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

/// Post as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: PostId,
    pub creator: Address,
    pub content_hash: String,
    pub post_type: ContentType,
    pub bounty_amount: Wei,
    pub is_active: bool,
}

/// Comment as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    /// Zero address when the comment is anonymous
    pub commenter: Address,
    pub content_hash: String,
    pub comment_type: ContentType,
    pub is_anonymous: bool,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalises_case() {
        let addr = Address::parse("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!(Address::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::zero().is_zero());
        assert_eq!(Address::parse(Address::ZERO_STR).unwrap(), Address::zero());
    }

    #[test]
    fn test_wei_serde_accepts_string_and_number() {
        let from_str: Wei = serde_json::from_str("\"1000000000000000000\"").unwrap();
        let from_num: Wei = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, Wei::ether(1));
        assert_eq!(from_num, Wei(42));
        assert_eq!(serde_json::to_string(&Wei(7)).unwrap(), "\"7\"");
        assert!(serde_json::from_str::<Wei>("-1").is_err());
    }

    #[test]
    fn test_content_type_wire_names() {
        assert_eq!(serde_json::to_string(&ContentType::Voice).unwrap(), "\"VOICE\"");
        assert_eq!("0".parse::<ContentType>().unwrap(), ContentType::Text);
        assert!("AUDIO".parse::<ContentType>().is_err());
    }
}
