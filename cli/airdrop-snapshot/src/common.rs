use std::fs;
use std::io::Write;
use std::path::Path;

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::error::ParseError;

/// Parses an Ethereum address from a hex string.
///
/// All-lowercase and all-uppercase inputs are accepted as plain hex. Mixed-case
/// inputs must carry a valid EIP-55 checksum.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix
///
/// # Errors
/// Returns an error if the address is not 40 hex characters, contains invalid
/// hex, or fails checksum validation
pub fn parse_address(addr_str: &str) -> Result<Address, ParseError> {
    let trimmed = addr_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 40 {
        return Err(ParseError::address(
            addr_str,
            format!("expected 40 hex chars, got {}", cleaned.len()),
        ));
    }

    let has_lower = cleaned.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = cleaned.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(format!("0x{cleaned}"), None)
            .map_err(|e| ParseError::address(addr_str, e.to_string()));
    }

    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| ParseError::address(addr_str, format!("invalid hex encoding: {e}")))?;
    Ok(Address::from(address))
}

/// Parses a non-negative 256-bit amount, either `0x`-prefixed hex or decimal.
pub fn parse_amount(amount_str: &str) -> Result<U256, ParseError> {
    let trimmed = amount_str.trim();
    if trimmed.starts_with('-') {
        return Err(ParseError::amount(amount_str, "negative amount"));
    }
    let (digits, radix) = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(digits) => (digits, 16),
        None => (trimmed, 10),
    };
    if digits.is_empty() {
        return Err(ParseError::amount(amount_str, "empty amount"));
    }
    if digits.contains('_') {
        return Err(ParseError::amount(amount_str, "digit separators are not allowed"));
    }
    let parsed = U256::from_str_radix(digits, radix);
    parsed.map_err(|e| ParseError::amount(amount_str, e.to_string()))
}

/// Formats an amount as a minimal, even-length `0x` hex string (`100` -> `0x64`,
/// `5` -> `0x05`).
pub fn to_hex_quantity(value: U256) -> String {
    let digits = format!("{value:x}");
    if digits.len() % 2 == 1 {
        format!("0x0{digits}")
    } else {
        format!("0x{digits}")
    }
}

/// Formats a fixed-point amount with `decimals` fractional digits, trimming
/// trailing zeros but always keeping one (`1.0`, `2.5`).
pub fn format_units(value: U256, decimals: u8) -> String {
    let unit = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / unit;
    let fraction = value % unit;

    let mut fraction = format!(
        "{:0>width$}",
        fraction.to_string(),
        width = usize::from(decimals)
    );
    while fraction.len() > 1 && fraction.ends_with('0') {
        fraction.pop();
    }
    if fraction.is_empty() {
        fraction.push('0');
    }
    format!("{whole}.{fraction}")
}

/// Computes the Keccak256 hash of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let hash: [u8; 32] = Keccak256::digest(data).into();
    B256::from(hash)
}

/// Serializes `value` as JSON indented with four spaces.
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Writes `contents` to `path` through a temp file in the same directory and
/// a rename, so a reader never observes a partially written file. Parent
/// directories are created as needed. The temp file is removed if any step
/// fails.
pub fn write_file_atomic(path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(contents.as_ref())?;
    file.flush()?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_prefix() {
        let addr = "0x1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(
            result.to_checksum(None).to_lowercase(),
            "0x1234567890abcdef1234567890abcdef12345678"
        );
    }

    #[test]
    fn test_parse_address_without_prefix() {
        let addr = "1234567890abcdef1234567890abcdef12345678";
        assert!(parse_address(addr).is_ok());
    }

    #[test]
    fn test_parse_address_invalid_length() {
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        assert!(parse_address("0xghijklmnopqrstuvwxyz1234567890abcdef1234").is_err());
    }

    #[test]
    fn test_parse_address_checksum() {
        let checksummed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(parse_address(checksummed).is_ok());

        let broken = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD";
        assert!(parse_address(broken).is_err());

        let upper = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED";
        assert_eq!(parse_address(upper).unwrap(), parse_address(checksummed).unwrap());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0x64").unwrap(), U256::from(100u64));
        assert_eq!(parse_amount("100").unwrap(), U256::from(100u64));
        assert_eq!(parse_amount(" 0x00 ").unwrap(), U256::ZERO);
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("-0x01").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_digit_separators() {
        assert!(parse_amount("1_000").is_err());
        assert!(parse_amount("0x10_00").is_err());
        assert!(parse_amount("_1").is_err());
    }

    #[test]
    fn test_to_hex_quantity() {
        assert_eq!(to_hex_quantity(U256::from(100u64)), "0x64");
        assert_eq!(to_hex_quantity(U256::from(5u64)), "0x05");
        assert_eq!(to_hex_quantity(U256::from(0x100u64)), "0x0100");
        assert_eq!(to_hex_quantity(U256::ZERO), "0x00");
    }

    #[test]
    fn test_format_units() {
        let ether = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(format_units(ether, 18), "1.0");
        assert_eq!(format_units(ether * U256::from(5u64) / U256::from(2u64), 18), "2.5");
        assert_eq!(format_units(U256::from(1u64), 18), "0.000000000000000001");
        assert_eq!(format_units(U256::ZERO, 18), "0.0");
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_file_atomic(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["out.json"]);
    }

    #[test]
    fn test_write_file_atomic_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(write_file_atomic(&path, "{}").is_err());

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["out.json"]);
        assert!(path.is_dir());
    }

    #[test]
    fn test_to_pretty_json_indent() {
        let json = to_pretty_json(&serde_json::json!({ "a": 1 })).unwrap();
        assert_eq!(String::from_utf8(json).unwrap(), "{\n    \"a\": 1\n}");
    }
}
