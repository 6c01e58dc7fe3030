//! Journal aggregate: the append-only list of recorded transactions.
//!
//! The journal never holds stock. It numbers transactions and keeps reversal
//! links consistent (one reversal per transaction, no reversal of a reversal).

use std::collections::HashMap;

use uuid::Uuid;

use backoffice_core::{Aggregate, AggregateId, AggregateRoot};

use crate::aggregates::LedgerAggregates;
use crate::error::LedgerError;
use crate::transaction::{LedgerEvent, Transaction, TransactionId, TransactionRecorded};

/// Stream id of the single journal aggregate.
pub const JOURNAL_STREAM_ID: AggregateId =
    AggregateId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0010_6e41_0001));

/// Aggregate root: Journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    id: AggregateId,
    transactions: Vec<Transaction>,
    reversed_by: HashMap<TransactionId, TransactionId>,
    version: u64,
}

impl Journal {
    /// Empty aggregate for rehydration.
    pub fn empty() -> Self {
        Self {
            id: JOURNAL_STREAM_ID,
            transactions: Vec::new(),
            reversed_by: HashMap::new(),
            version: 0,
        }
    }

    /// All transactions, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        let idx = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.transactions.get(idx)
    }

    /// The transaction that reversed `id`, if any.
    pub fn reversed_by(&self, id: TransactionId) -> Option<TransactionId> {
        self.reversed_by.get(&id).copied()
    }

    pub fn aggregates(&self) -> LedgerAggregates {
        LedgerAggregates::from_transactions(&self.transactions)
    }

    /// Id the next recorded transaction will receive.
    pub fn next_id(&self) -> TransactionId {
        TransactionId(self.version + 1)
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::empty()
    }
}

impl AggregateRoot for Journal {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalCommand {
    Record(TransactionRecorded),
}

impl Aggregate for Journal {
    type Command = JournalCommand;
    type Event = LedgerEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::TransactionRecorded(e) => {
                let id = self.next_id();
                if let Some(target) = e.reverses {
                    self.reversed_by.insert(target, id);
                }
                self.transactions.push(e.clone().into_transaction(id));
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::Record(record) => self.handle_record(record),
        }
    }
}

impl Journal {
    fn handle_record(&self, record: &TransactionRecorded) -> Result<Vec<LedgerEvent>, LedgerError> {
        if record.quantity == 0 {
            return Err(LedgerError::InvalidQuantity(0));
        }
        if record.unit_price.checked_mul(record.quantity) != Some(record.total) {
            return Err(LedgerError::InvalidPrice(format!(
                "total {} does not equal {} x {}",
                record.total, record.quantity, record.unit_price
            )));
        }

        if let Some(target_id) = record.reverses {
            let target = self
                .get(target_id)
                .ok_or(LedgerError::TransactionNotFound(target_id))?;
            if target.reverses().is_some() {
                return Err(LedgerError::NotReversible(target_id));
            }
            if self.reversed_by.contains_key(&target_id) {
                return Err(LedgerError::AlreadyReversed(target_id));
            }
            let mirrors = record.kind == target.kind().opposite()
                && record.item_id == target.item_id()
                && record.quantity == target.quantity()
                && record.unit_price == target.unit_price();
            if !mirrors {
                return Err(LedgerError::NotReversible(target_id));
            }
        }

        Ok(vec![LedgerEvent::TransactionRecorded(record.clone())])
    }
}
