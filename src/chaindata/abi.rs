//! Minimal ABI encode/decode for the ERC-4626/ERC-20 read surface.
//!
//! Only what the direct-RPC provider needs: zero-argument view calls,
//! `balanceOf(address)`, and word decoding for uint256/address/uint8
//! plus the string/bytes32 variance of `symbol()`.

use crate::chaindata::ProviderError;
use crate::domain::Address;
use alloy_primitives::U256;

/// `totalAssets()`
pub const SEL_TOTAL_ASSETS: &str = "0x01e1d114";
/// `totalSupply()`
pub const SEL_TOTAL_SUPPLY: &str = "0x18160ddd";
/// `asset()`
pub const SEL_ASSET: &str = "0x38d52e0f";
/// `balanceOf(address)`
pub const SEL_BALANCE_OF: &str = "0x70a08231";
/// `symbol()`
pub const SEL_SYMBOL: &str = "0x95d89b41";
/// `decimals()`
pub const SEL_DECIMALS: &str = "0x313ce567";

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Calldata for a single-address-argument call (left-padded to a word).
/// Zero-argument view calls pass their selector as the calldata directly.
pub fn encode_call_address(selector: &str, addr: &Address) -> Result<String, ProviderError> {
    let raw = addr.as_str().trim_start_matches("0x");
    let bytes = hex::decode(raw)
        .map_err(|_| ProviderError::Malformed(format!("invalid address: {}", addr)))?;
    if bytes.len() != 20 {
        return Err(ProviderError::Malformed(format!(
            "address must be 20 bytes: {}",
            addr
        )));
    }
    Ok(format!("{}{:0>64}", selector, hex::encode(bytes)))
}

/// Hex return data ("0x...") into raw bytes.
pub fn decode_hex(data: &str) -> Result<Vec<u8>, ProviderError> {
    hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| ProviderError::Malformed(format!("invalid hex return data: {}", e)))
}

/// First return word as a U256.
pub fn decode_u256(bytes: &[u8]) -> Result<U256, ProviderError> {
    if bytes.len() < 32 {
        return Err(ProviderError::Malformed(format!(
            "return data too short for uint256: {} bytes",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes[..32]))
}

/// First return word as an address (last 20 bytes of the word).
pub fn decode_address(bytes: &[u8]) -> Result<Address, ProviderError> {
    if bytes.len() < 32 {
        return Err(ProviderError::Malformed(format!(
            "return data too short for address: {} bytes",
            bytes.len()
        )));
    }
    Ok(Address::new(format!("0x{}", hex::encode(&bytes[12..32]))))
}

/// First return word as a u8.
pub fn decode_u8(bytes: &[u8]) -> Result<u8, ProviderError> {
    let word = decode_u256(bytes)?;
    u8::try_from(word)
        .map_err(|_| ProviderError::Malformed("uint8 return out of range".to_string()))
}

/// `symbol()` return as a string.
///
/// Handles both the standard dynamic-string encoding and the bytes32
/// variant some older tokens use.
pub fn decode_symbol(bytes: &[u8]) -> Result<String, ProviderError> {
    if bytes.len() >= 64 {
        let offset = decode_u256(bytes)?;
        let offset = usize::try_from(offset)
            .map_err(|_| ProviderError::Malformed("string offset out of range".to_string()))?;
        if bytes.len() >= offset + 32 {
            let len = U256::from_be_slice(&bytes[offset..offset + 32]);
            let len = usize::try_from(len)
                .map_err(|_| ProviderError::Malformed("string length out of range".to_string()))?;
            let start = offset + 32;
            if bytes.len() >= start + len {
                return Ok(String::from_utf8_lossy(&bytes[start..start + len]).to_string());
            }
        }
    }
    if bytes.len() >= 32 {
        // bytes32 symbol, null-padded
        let trimmed: Vec<u8> = bytes[..32].iter().copied().take_while(|&b| b != 0).collect();
        return Ok(String::from_utf8_lossy(&trimmed).to_string());
    }
    Err(ProviderError::Malformed(
        "return data too short for symbol".to_string(),
    ))
}
