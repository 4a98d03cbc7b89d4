/// Solana account addresses as handed out by wallet providers.
///
/// An address is the base58 encoding of a 32-byte ed25519 public key. The
/// string form is what providers, RPC nodes and the UI exchange, so it is kept
/// verbatim alongside the decoded length check.
use crate::errors::{WalletError, WalletResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Decoded length of a Solana public key.
pub const PUBLIC_KEY_BYTES: usize = 32;

const MIN_ENCODED_LEN: usize = 32;
const MAX_ENCODED_LEN: usize = 44;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Parse and validate a base58 address string.
    pub fn parse(address: &str) -> WalletResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        if trimmed.len() < MIN_ENCODED_LEN || trimmed.len() > MAX_ENCODED_LEN {
            return Err(WalletError::InvalidAddress(format!(
                "Unexpected address length {}",
                trimmed.len()
            )));
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(format!("Invalid base58: {}", e)))?;

        if bytes.len() != PUBLIC_KEY_BYTES {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid key length: expected {} bytes, got {}",
                PUBLIC_KEY_BYTES,
                bytes.len()
            )));
        }

        Ok(Address(trimmed.to_string()))
    }

    /// Build an address from raw public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.len() != PUBLIC_KEY_BYTES {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid key length: expected {} bytes, got {}",
                PUBLIC_KEY_BYTES,
                bytes.len()
            )));
        }
        Ok(Address(bs58::encode(bytes).into_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated `AbCd…WxYz` form for logs and compact labels.
    pub fn short(&self) -> String {
        let s = self.0.as_str();
        format!("{}…{}", &s[..4], &s[s.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAKE_POOL: &str = "Stake11111111111111111111111111111111111111";

    #[test]
    fn parses_known_program_address() {
        let address = Address::parse(STAKE_POOL).unwrap();
        assert_eq!(address.as_str(), STAKE_POOL);
        assert_eq!(address.to_string(), STAKE_POOL);
    }

    #[test]
    fn round_trips_raw_bytes() {
        let address = Address::from_bytes(&[7u8; 32]).unwrap();
        let reparsed: Address = address.as_str().parse().unwrap();
        assert_eq!(address, reparsed);
    }

    #[test]
    fn rejects_non_base58_and_wrong_length() {
        assert!(matches!(
            Address::parse("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl"),
            Err(WalletError::InvalidAddress(_))
        ));
        assert!(Address::parse("Addr123").is_err());
        assert!(Address::parse("").is_err());
        assert!(Address::from_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn short_form_keeps_both_ends() {
        let address = Address::parse(STAKE_POOL).unwrap();
        assert_eq!(address.short(), "Stak…1111");
    }

    #[test]
    fn deserialize_validates() {
        let ok: Address = serde_json::from_str(&format!("\"{}\"", STAKE_POOL)).unwrap();
        assert_eq!(ok.as_str(), STAKE_POOL);
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
