//! Account addresses and their normalization.
//!
//! The chain reports owners as a tagged union over address kinds. Substrate
//! accounts are 32-byte public keys rendered as SS58 strings, whose network
//! prefix varies; Ethereum accounts are 20-byte hex strings. Exported data
//! always carries addresses in a canonical form so that ownership compares
//! uniformly regardless of how the chain or a caller spelled it.

use std::fmt;

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

/// Network prefix of the generic Substrate address format.
pub const GENERIC_SS58_PREFIX: u16 = 42;

const SS58_CHECKSUM_CONTEXT: &[u8] = b"SS58PRE";
const ACCOUNT_ID_LEN: usize = 32;
const CHECKSUM_LEN: usize = 2;
const ETHEREUM_ADDRESS_LEN: usize = 20;
const MAX_SS58_PREFIX: u16 = 0b0011_1111_1111_1111;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("unexpected decoded length {0}")]
    Length(usize),
    #[error("checksum mismatch")]
    Checksum,
    #[error("reserved prefix byte {0:#04x}")]
    ReservedPrefix(u8),
    #[error("network prefix {0} is out of range")]
    PrefixOutOfRange(u16),
}

/// 32-byte Substrate account public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub const fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    /// Parse an SS58 address of any network prefix, or a `0x`-prefixed hex
    /// public key.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        if let Some(hex_key) = address.strip_prefix("0x") {
            let bytes = hex::decode(hex_key).map_err(|e| AddressError::Hex(e.to_string()))?;
            return Self::try_from(bytes.as_slice());
        }
        ss58_decode(address).map(|(_, account)| account)
    }

    pub fn to_ss58(&self, prefix: u16) -> Result<String, AddressError> {
        let mut payload = ss58_prefix_bytes(prefix)?;
        payload.extend_from_slice(&self.0);
        let checksum = ss58_checksum(&payload);
        payload.extend_from_slice(&checksum);
        Ok(bs58::encode(payload).into_string())
    }
}

impl TryFrom<&[u8]> for AccountId {
    type Error = AddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key: [u8; ACCOUNT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        Ok(Self(key))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId(0x{})", hex::encode(self.0))
    }
}

fn ss58_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_CONTEXT);
    hasher.update(payload);
    let digest = hasher.finalize();

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

fn ss58_prefix_bytes(prefix: u16) -> Result<Vec<u8>, AddressError> {
    if prefix > MAX_SS58_PREFIX {
        return Err(AddressError::PrefixOutOfRange(prefix));
    }
    if prefix < 64 {
        return Ok(vec![prefix as u8]);
    }
    // Two-byte form: low six bits of the first byte and the top of the second
    // carry the prefix, first byte tagged with 0b01.
    let first = ((prefix & 0b0000_0000_1111_1100) as u8) >> 2;
    let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
    Ok(vec![first | 0b0100_0000, second])
}

/// Decode an SS58 address into its network prefix and account id.
pub fn ss58_decode(address: &str) -> Result<(u16, AccountId), AddressError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;
    if data.len() < 2 {
        return Err(AddressError::Length(data.len()));
    }

    let (prefix_len, prefix) = match data[0] {
        0..=63 => (1, u16::from(data[0])),
        64..=127 => {
            let lower = (data[0] << 2) | (data[1] >> 6);
            let upper = data[1] & 0b0011_1111;
            (2, u16::from(lower) | (u16::from(upper) << 8))
        }
        reserved => return Err(AddressError::ReservedPrefix(reserved)),
    };

    if data.len() != prefix_len + ACCOUNT_ID_LEN + CHECKSUM_LEN {
        return Err(AddressError::Length(data.len()));
    }

    let body_len = prefix_len + ACCOUNT_ID_LEN;
    let checksum = ss58_checksum(&data[..body_len]);
    if data[body_len..] != checksum {
        return Err(AddressError::Checksum);
    }

    let account = AccountId::try_from(&data[prefix_len..body_len])?;
    Ok((prefix, account))
}

fn normalize_ethereum(address: &str) -> Result<String, AddressError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Empty);
    }
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex_part).map_err(|e| AddressError::Hex(e.to_string()))?;
    if bytes.len() != ETHEREUM_ADDRESS_LEN {
        return Err(AddressError::Length(bytes.len()));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Account reference as reported by the chain and as exported under `owner`.
///
/// Serializes with lowercase keys (`{"substrate": ...}`) and accepts the
/// capitalized spelling on input, so both shapes produced by chain tooling
/// parse into the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossAccountId {
    #[serde(rename = "substrate", alias = "Substrate")]
    Substrate(String),
    #[serde(rename = "ethereum", alias = "Ethereum")]
    Ethereum(String),
}

impl CrossAccountId {
    pub fn address(&self) -> &str {
        match self {
            Self::Substrate(address) | Self::Ethereum(address) => address,
        }
    }
}

/// The same account in the chain's native shape, exported under `chainOwner`
/// (`{"Substrate": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainAccountId {
    #[serde(alias = "substrate")]
    Substrate(String),
    #[serde(alias = "ethereum")]
    Ethereum(String),
}

/// Converts addresses into the canonical forms used by exported data.
///
/// Both conversions are pure and idempotent, and never guess: malformed input
/// is rejected with an [`AddressError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressNormalizer {
    chain_prefix: u16,
}

impl AddressNormalizer {
    pub fn new(chain_prefix: u16) -> Result<Self, AddressError> {
        if chain_prefix > MAX_SS58_PREFIX {
            return Err(AddressError::PrefixOutOfRange(chain_prefix));
        }
        Ok(Self { chain_prefix })
    }

    pub fn chain_prefix(&self) -> u16 {
        self.chain_prefix
    }

    /// Render a Substrate address in the generic network format.
    pub fn normalize(&self, address: &str) -> Result<String, AddressError> {
        AccountId::parse(address)?.to_ss58(GENERIC_SS58_PREFIX)
    }

    /// Render a Substrate address with the chain's own network prefix.
    pub fn to_chain_format(&self, address: &str) -> Result<String, AddressError> {
        AccountId::parse(address)?.to_ss58(self.chain_prefix)
    }

    pub fn normalize_account(
        &self,
        account: &CrossAccountId,
    ) -> Result<CrossAccountId, AddressError> {
        match account {
            CrossAccountId::Substrate(address) => {
                self.normalize(address).map(CrossAccountId::Substrate)
            }
            CrossAccountId::Ethereum(address) => {
                normalize_ethereum(address).map(CrossAccountId::Ethereum)
            }
        }
    }

    pub fn to_chain_account(
        &self,
        account: &CrossAccountId,
    ) -> Result<ChainAccountId, AddressError> {
        match account {
            CrossAccountId::Substrate(address) => {
                self.to_chain_format(address).map(ChainAccountId::Substrate)
            }
            CrossAccountId::Ethereum(address) => {
                normalize_ethereum(address).map(ChainAccountId::Ethereum)
            }
        }
    }
}
