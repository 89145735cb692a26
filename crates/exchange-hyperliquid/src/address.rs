use crate::error::{HyperliquidError, Result};
use ethers::types::Address;
use ethers::utils::to_checksum;
use std::str::FromStr;

/// Normalizes an account address to its EIP-55 checksummed form.
///
/// All-lowercase and all-uppercase input is accepted as-is. Mixed-case input
/// carries a checksum and must match it.
///
/// # Errors
/// Returns error if the address is not 20 hex bytes or its checksum is wrong.
pub fn checksum_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HyperliquidError::InvalidAddress(format!(
            "{address}: expected 40 hex characters"
        )));
    }

    let parsed = Address::from_str(hex)
        .map_err(|e| HyperliquidError::InvalidAddress(format!("{address}: {e}")))?;
    let checksummed = to_checksum(&parsed, None);

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksummed[2..] != *hex {
        return Err(HyperliquidError::InvalidAddress(format!(
            "{address}: bad checksum"
        )));
    }

    Ok(checksummed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn test_lowercase_is_checksummed() {
        let address = checksum_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(address, CHECKSUMMED);
    }

    #[test]
    fn test_valid_checksum_passes_through() {
        assert_eq!(checksum_address(CHECKSUMMED).unwrap(), CHECKSUMMED);
        assert_eq!(checksum_address(&format!(" {CHECKSUMMED} ")).unwrap(), CHECKSUMMED);
    }

    #[test]
    fn test_missing_prefix_is_accepted() {
        assert_eq!(checksum_address(&CHECKSUMMED[2..]).unwrap(), CHECKSUMMED);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let err = checksum_address("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(err.to_string().contains("bad checksum"));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(checksum_address("").is_err());
        assert!(checksum_address("0x1234").is_err());
        assert!(checksum_address("0xZZaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
    }
}
