//! Event kinds the harvester understands and decoding of API logs into
//! ledger deltas.

use alloy_primitives::{b256, Address, B256, U256};

use crate::common::{parse_address, parse_amount};
use crate::error::DecodeError;
use crate::log_api::RawLog;

/// `Transfer(address,address,uint256)`
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Staking pool `Deposit(address,uint256,uint256)`
pub const STAKE_DEPOSIT_TOPIC: B256 =
    b256!("90890809c654f11d6e72a28fa60149770a0d11ec6c92319d6ceb2bb0a4ea1a15");

/// Staking pool `Withdraw(address,uint256,uint256)`
pub const STAKE_WITHDRAW_TOPIC: B256 =
    b256!("f279e6a1f5e320cca91135676d9cb6e44ca8a08c0b88342bcdb1144f6511b568");

pub const DEFAULT_POOL_ID: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Transfer,
    StakeDeposit,
    StakeWithdraw,
}

/// A decoded log reduced to what the ledger needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Deposit {
        subject: Address,
        value: U256,
    },
    Withdraw {
        subject: Address,
        value: U256,
    },
}

impl EventKind {
    pub const fn topic(self) -> B256 {
        match self {
            Self::Transfer => TRANSFER_TOPIC,
            Self::StakeDeposit => STAKE_DEPOSIT_TOPIC,
            Self::StakeWithdraw => STAKE_WITHDRAW_TOPIC,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::StakeDeposit => "deposit",
            Self::StakeWithdraw => "withdraw",
        }
    }

    /// Topic filter for this kind. Stake events are restricted to `pool_id`
    /// in the second indexed position.
    pub fn topic_filter(self, pool_id: u64) -> Vec<Vec<B256>> {
        match self {
            Self::Transfer => vec![vec![self.topic()]],
            Self::StakeDeposit | Self::StakeWithdraw => {
                let pool = B256::from(U256::from(pool_id).to_be_bytes::<32>());
                vec![vec![self.topic()], vec![], vec![pool]]
            }
        }
    }

    /// Decodes `log`, preferring the API's decoded inputs and falling back to
    /// the raw topics and data word.
    pub fn decode(self, log: &RawLog) -> Result<LedgerEvent, DecodeError> {
        let (first, second, value) = match &log.event {
            Some(event) => {
                if event.inputs.len() != 3 {
                    return Err(DecodeError::Arity {
                        expected: 3,
                        found: event.inputs.len(),
                    });
                }
                let inputs = &event.inputs;
                (
                    inputs[0].value_decoded.as_str(),
                    inputs[1].value_decoded.as_str(),
                    inputs[2].value_decoded.as_str(),
                )
            }
            None => return self.decode_raw(log),
        };

        let first = field_address("first input", first)?;
        let value = field_amount(value)?;
        Ok(match self {
            Self::Transfer => LedgerEvent::Transfer {
                from: first,
                to: field_address("second input", second)?,
                value,
            },
            Self::StakeDeposit => LedgerEvent::Deposit {
                subject: first,
                value,
            },
            Self::StakeWithdraw => LedgerEvent::Withdraw {
                subject: first,
                value,
            },
        })
    }

    fn decode_raw(self, log: &RawLog) -> Result<LedgerEvent, DecodeError> {
        if log.topics.is_empty() && log.data.is_empty() {
            return Err(DecodeError::Missing);
        }
        if log.topics.len() != 3 {
            return Err(DecodeError::Arity {
                expected: 3,
                found: log.topics.len(),
            });
        }

        let topic0 = word("topic0", &log.topics[0])?;
        if topic0 != self.topic() {
            return Err(DecodeError::UnexpectedTopic(log.topics[0].clone()));
        }
        let first = Address::from_word(word("topic1", &log.topics[1])?);
        let value = U256::from_be_bytes(word("data", &log.data)?.0);

        Ok(match self {
            Self::Transfer => LedgerEvent::Transfer {
                from: first,
                to: Address::from_word(word("topic2", &log.topics[2])?),
                value,
            },
            Self::StakeDeposit => LedgerEvent::Deposit {
                subject: first,
                value,
            },
            Self::StakeWithdraw => LedgerEvent::Withdraw {
                subject: first,
                value,
            },
        })
    }
}

fn field_address(field: &'static str, text: &str) -> Result<Address, DecodeError> {
    parse_address(text).map_err(|e| DecodeError::Field {
        field,
        reason: e.to_string(),
    })
}

fn field_amount(text: &str) -> Result<U256, DecodeError> {
    parse_amount(text).map_err(|e| DecodeError::Field {
        field: "value",
        reason: e.to_string(),
    })
}

fn word(field: &'static str, text: &str) -> Result<B256, DecodeError> {
    let cleaned = text.strip_prefix("0x").unwrap_or(text);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut bytes).map_err(|e| DecodeError::Field {
        field,
        reason: e.to_string(),
    })?;
    Ok(B256::from(bytes))
}
