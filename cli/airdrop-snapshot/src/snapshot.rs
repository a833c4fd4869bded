//! Point-in-time balance tables.
//!
//! On disk a snapshot is a JSON object mapping checksummed addresses to
//! even-length `0x` hex amounts, in canonical order: balance descending, then
//! address descending.

use std::fmt;
use std::fs;
use std::path::Path;

use alloy_primitives::{Address, U256};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::common::{
    parse_address, parse_amount, to_hex_quantity, to_pretty_json, write_file_atomic,
};
use crate::error::SnapshotError;
use crate::ledger::BalanceLedger;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(Address, U256)>,
}

impl Snapshot {
    /// Keeps strictly positive balances only.
    pub fn from_ledger(ledger: &BalanceLedger) -> Result<Self, SnapshotError> {
        let mut entries = Vec::new();
        for (address, balance) in ledger.iter() {
            if !balance.is_positive() {
                continue;
            }
            let raw = balance.into_raw();
            let amount = U256::checked_from_limbs_slice(raw.as_limbs())
                .ok_or(SnapshotError::Overflow(*address))?;
            entries.push((*address, amount));
        }
        Ok(Self::from_entries(entries))
    }

    /// Builds a snapshot from arbitrary entries. Zero amounts are dropped and
    /// the rest put in canonical order. Duplicate addresses are summed.
    pub fn from_entries(entries: impl IntoIterator<Item = (Address, U256)>) -> Self {
        let mut entries: Vec<(Address, U256)> = entries
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = earlier.1.saturating_add(later.1);
                true
            } else {
                false
            }
        });

        entries.sort_by(|(a_addr, a_amt), (b_addr, b_amt)| {
            b_amt.cmp(a_amt).then_with(|| b_addr.cmp(a_addr))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[(Address, U256)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<U256> {
        self.entries
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, amount)| *amount)
    }

    /// Sum of all amounts.
    pub fn total(&self) -> U256 {
        self.entries
            .iter()
            .fold(U256::ZERO, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    /// `{network}-{contract}-{start}-{end}.json`
    pub fn file_name(network: &str, contract: &str, start_block: u64, end_block: u64) -> String {
        format!("{network}-{contract}-{start_block}-{end_block}.json")
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(to_pretty_json(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        raw.parse()
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        write_file_atomic(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (address, amount) in &self.entries {
            map.serialize_entry(&address.to_checksum(None), &to_hex_quantity(*amount))?;
        }
        map.end()
    }
}

/// Snapshot entries exactly as written in a file: unvalidated text, file
/// order. Non-string amounts are kept as their JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSnapshot(pub Vec<(String, String)>);

impl RawSnapshot {
    pub fn read(path: &Path) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn parse(&self) -> Result<Snapshot, SnapshotError> {
        let entries = self
            .0
            .iter()
            .map(|(address, amount)| -> Result<_, SnapshotError> {
                Ok((parse_address(address)?, parse_amount(amount)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Snapshot::from_entries(entries))
    }
}

impl<'de> Deserialize<'de> for RawSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object mapping addresses to amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((address, amount)) = map.next_entry::<String, JsonValue>()? {
                    let amount = match amount {
                        JsonValue::String(s) => s,
                        other => other.to_string(),
                    };
                    entries.push((address, amount));
                }
                Ok(RawSnapshot(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LedgerEvent;
    use crate::ledger::ExclusionSet;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn amount(value: u64) -> U256 {
        U256::from(value)
    }

    #[test]
    fn test_from_ledger_drops_non_positive() {
        let mut ledger = BalanceLedger::new(ExclusionSet::default());
        ledger.apply(&LedgerEvent::Transfer {
            from: addr(1),
            to: addr(2),
            value: amount(10),
        });
        ledger.apply(&LedgerEvent::Transfer {
            from: addr(2),
            to: addr(3),
            value: amount(10),
        });

        let snapshot = Snapshot::from_ledger(&ledger).unwrap();
        assert_eq!(snapshot.entries(), &[(addr(3), amount(10))]);
    }

    #[test]
    fn test_canonical_order() {
        let snapshot = Snapshot::from_entries([
            (addr(0x11), amount(5)),
            (addr(0x22), amount(7)),
            (addr(0x33), amount(5)),
            (addr(0x44), amount(0)),
        ]);
        assert_eq!(
            snapshot.entries(),
            &[
                (addr(0x22), amount(7)),
                (addr(0x33), amount(5)),
                (addr(0x11), amount(5)),
            ]
        );
        assert_eq!(snapshot.total(), amount(17));
    }

    #[test]
    fn test_duplicate_entries_merge() {
        let snapshot = Snapshot::from_entries([(addr(1), amount(2)), (addr(1), amount(3))]);
        assert_eq!(snapshot.get(&addr(1)), Some(amount(5)));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_json_format() {
        let snapshot = Snapshot::from_entries([(addr(0x11), amount(100)), (addr(0x22), amount(5))]);
        let json = String::from_utf8(snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            json,
            "{\n    \"0x1111111111111111111111111111111111111111\": \"0x64\",\n    \"0x2222222222222222222222222222222222222222\": \"0x05\"\n}"
        );
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_raw_snapshot_keeps_file_order() {
        let raw: RawSnapshot =
            serde_json::from_str(r#"{"0xbb": "0x01", "0xaa": 2, "0xcc": "-3"}"#).unwrap();
        assert_eq!(
            raw.0,
            vec![
                ("0xbb".to_string(), "0x01".to_string()),
                ("0xaa".to_string(), "2".to_string()),
                ("0xcc".to_string(), "-3".to_string()),
            ]
        );
        assert!(raw.parse().is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            Snapshot::file_name("bsc", "0xe552Fb52a4F19e44ef5A967632DBc320B0820639", 1, 2),
            "bsc-0xe552Fb52a4F19e44ef5A967632DBc320B0820639-1-2.json"
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = Snapshot::from_entries([(addr(0xab), amount(1))]);
        snapshot.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
    }
}
