use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Signed, U256, U512};

use crate::common::parse_address;
use crate::error::ParseError;
use crate::events::LedgerEvent;

/// Signed accumulator. Wide enough that no realistic sequence of 256-bit
/// deltas can overflow it.
pub type Balance = Signed<512, 8>;

pub(crate) fn widen(value: U256) -> Balance {
    Balance::from_raw(U512::from_limbs_slice(value.as_limbs()))
}

/// Addresses whose deltas are always zeroed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet(HashSet<Address>);

impl ExclusionSet {
    /// Parses a comma and/or whitespace separated address list, as found in
    /// `EXCLUDE_ADDRESSES`.
    pub fn parse(list: &str) -> Result<Self, ParseError> {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(parse_address)
            .collect()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Address> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Address> for ExclusionSet {
    fn extend<I: IntoIterator<Item = Address>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// Running per-address balances of one harvest run.
///
/// Balances may go negative while events are replayed; only the snapshot
/// filters them out.
#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    balances: HashMap<Address, Balance>,
    exclusions: ExclusionSet,
}

impl BalanceLedger {
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self {
            balances: HashMap::new(),
            exclusions,
        }
    }

    pub fn apply(&mut self, event: &LedgerEvent) {
        match *event {
            LedgerEvent::Transfer { from, to, value } => {
                self.debit(from, value);
                self.credit(to, value);
            }
            LedgerEvent::Deposit { subject, value } => self.credit(subject, value),
            LedgerEvent::Withdraw { subject, value } => self.debit(subject, value),
        }
    }

    pub fn credit(&mut self, address: Address, value: U256) {
        let delta = self.delta(&address, value);
        let balance = self.balances.entry(address).or_insert(Balance::ZERO);
        *balance = balance.saturating_add(delta);
    }

    pub fn debit(&mut self, address: Address, value: U256) {
        let delta = self.delta(&address, value);
        let balance = self.balances.entry(address).or_insert(Balance::ZERO);
        *balance = balance.saturating_sub(delta);
    }

    fn delta(&self, address: &Address, value: U256) -> Balance {
        if self.exclusions.contains(address) {
            Balance::ZERO
        } else {
            widen(value)
        }
    }

    pub fn balance_of(&self, address: &Address) -> Balance {
        self.balances.get(address).copied().unwrap_or(Balance::ZERO)
    }

    /// Whether `address` has appeared in any applied event.
    pub fn is_tracked(&self, address: &Address) -> bool {
        self.balances.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Balance)> {
        self.balances.iter()
    }
}
