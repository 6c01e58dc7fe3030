//! Ledger service: the only writer of stock after registration.
//!
//! A sale or purchase commits two streams together: `StockAdjusted` on the
//! item stream (exact version, so concurrent writers on one item serialize)
//! and `TransactionRecorded` on the journal stream. Either both land or
//! neither does. A stale item version is retried against fresh state.

use backoffice_core::{Aggregate, AggregateRoot, ExpectedVersion};
use backoffice_inventory::{InventoryCommand, InventoryItem, InventoryItemId};
use backoffice_ledger::{
    JOURNAL_STREAM_ID, Journal, JournalCommand, LedgerAggregates, LedgerError, LedgerEvent, PaymentStatus,
    ProposeTransaction, Transaction, TransactionFilter, TransactionId, TransactionRecorded,
};

use crate::clock::{Clock, SystemClock};
use crate::command_dispatcher::{CommandDispatcher, DispatchError, encode_events};
use crate::config::LedgerConfig;
use crate::event_store::{EventStore, StoredEvent, StreamAppend};
use crate::query::{Page, Pagination};
use crate::retry::{Attempt, PersistenceError, commit_with_retry};
use crate::streams;

type StepError = Attempt<LedgerError>;

impl PersistenceError for LedgerError {
    fn persistence(message: String) -> Self {
        LedgerError::PersistenceFailure(message)
    }
}

impl From<LedgerError> for Attempt<LedgerError> {
    fn from(value: LedgerError) -> Self {
        Attempt::Failed(value)
    }
}

fn persistence_failure(err: DispatchError) -> LedgerError {
    LedgerError::PersistenceFailure(err.to_string())
}

#[derive(Debug)]
pub struct LedgerService<S, C = SystemClock> {
    dispatcher: CommandDispatcher<S>,
    clock: C,
    config: LedgerConfig,
}

impl<S> LedgerService<S, SystemClock>
where
    S: EventStore,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::with_clock(store, SystemClock, config)
    }
}

impl<S, C> LedgerService<S, C>
where
    S: EventStore,
    C: Clock,
{
    pub fn with_clock(store: S, clock: C, config: LedgerConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate a sale or purchase and record it together with its stock change.
    ///
    /// Validation order: `ItemNotFound`, `InvalidQuantity`, `InvalidPrice`,
    /// `InsufficientStock`. Any error leaves stock and journal unchanged.
    pub fn propose_transaction(&self, request: ProposeTransaction) -> Result<Transaction, LedgerError> {
        let tx = commit_with_retry(
            "propose_transaction",
            self.config.max_commit_attempts,
            || self.try_propose(&request),
            |attempts| LedgerError::Contention { attempts },
        )?;

        tracing::info!(
            transaction_id = %tx.id_typed(),
            kind = ?tx.kind(),
            item_id = %tx.item_id(),
            quantity = tx.quantity(),
            total = tx.total().amount(),
            "transaction recorded"
        );
        Ok(tx)
    }

    /// Record the transaction that undoes `id`: opposite kind, same item,
    /// quantity and captured unit price.
    pub fn reverse_transaction(
        &self,
        id: TransactionId,
        payment_status: PaymentStatus,
    ) -> Result<Transaction, LedgerError> {
        let tx = commit_with_retry(
            "reverse_transaction",
            self.config.max_commit_attempts,
            || self.try_reverse(id, payment_status),
            |attempts| LedgerError::Contention { attempts },
        )?;

        tracing::info!(
            transaction_id = %tx.id_typed(),
            reverses = %id,
            kind = ?tx.kind(),
            item_id = %tx.item_id(),
            "transaction reversed"
        );
        Ok(tx)
    }

    pub fn get_aggregates(&self) -> Result<LedgerAggregates, LedgerError> {
        Ok(self.journal()?.aggregates())
    }

    /// Matching transactions, newest first.
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, LedgerError> {
        let journal = self.journal()?;
        Ok(journal
            .transactions()
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    /// One page of [`LedgerService::list_transactions`].
    pub fn list_transactions_page(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<Transaction>, LedgerError> {
        let pagination = pagination.resolve(self.config.default_page_size, self.config.max_page_size);
        Ok(Page::from_matching(self.list_transactions(filter)?, pagination))
    }

    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.journal()?
            .get(id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Current stock of a registered item (retired items included).
    pub fn current_stock(&self, item_id: InventoryItemId) -> Result<u64, LedgerError> {
        let item = self.load_item(item_id).map_err(|e| match e {
            Attempt::Failed(err) => err,
            Attempt::Conflict(msg) => LedgerError::PersistenceFailure(msg),
        })?;
        if !item.is_registered() {
            return Err(LedgerError::ItemNotFound(item_id));
        }
        Ok(item.stock())
    }

    fn journal(&self) -> Result<Journal, LedgerError> {
        self.dispatcher
            .load(JOURNAL_STREAM_ID, streams::LEDGER_JOURNAL, Journal::empty)
            .map_err(persistence_failure)
    }

    fn load_item(&self, item_id: InventoryItemId) -> Result<InventoryItem, StepError> {
        match self
            .dispatcher
            .load(item_id.0, streams::INVENTORY_ITEM, || InventoryItem::empty(item_id))
        {
            Ok(item) => Ok(item),
            Err(DispatchError::NotFound) => Err(LedgerError::ItemNotFound(item_id).into()),
            Err(other) => Err(other.into()),
        }
    }

    fn try_propose(&self, request: &ProposeTransaction) -> Result<Transaction, StepError> {
        let item = self.load_item(request.item_id)?;
        let record = request.evaluate(&item, self.clock.now())?;

        self.commit(&item, record, ExpectedVersion::Any)
    }

    fn try_reverse(&self, id: TransactionId, payment_status: PaymentStatus) -> Result<Transaction, StepError> {
        let journal = self.journal()?;
        let original = journal.get(id).ok_or(LedgerError::TransactionNotFound(id))?;
        let record = original.reversal(payment_status, self.clock.now());
        journal.handle(&JournalCommand::Record(record.clone()))?;

        let item = self.load_item(record.item_id)?;
        if !item.is_active() {
            return Err(LedgerError::ItemNotFound(record.item_id).into());
        }

        self.commit(&item, record, ExpectedVersion::Exact(journal.version()))
    }

    /// Append the stock change and the journal record in one commit.
    fn commit(
        &self,
        item: &InventoryItem,
        record: TransactionRecorded,
        journal_expected: ExpectedVersion,
    ) -> Result<Transaction, StepError> {
        let item_id = record.item_id;
        let adjustment = record.stock_adjustment()?;
        let item_events = item
            .handle(&InventoryCommand::AdjustStock(adjustment))
            .map_err(|_| stock_rejection(item, &record))?;
        let journal_events = vec![LedgerEvent::TransactionRecorded(record.clone())];

        let committed = self.dispatcher.store().append_streams(vec![
            StreamAppend::new(
                item_id.0,
                ExpectedVersion::Exact(item.version()),
                encode_events(item_id.0, streams::INVENTORY_ITEM, &item_events)?,
            ),
            StreamAppend::new(
                JOURNAL_STREAM_ID,
                journal_expected,
                encode_events(JOURNAL_STREAM_ID, streams::LEDGER_JOURNAL, &journal_events)?,
            ),
        ])?;

        let id = journal_position(&committed)?;
        Ok(record.into_transaction(id))
    }
}

/// Map an `AdjustStock` rejection back to the ledger taxonomy.
fn stock_rejection(item: &InventoryItem, record: &TransactionRecorded) -> LedgerError {
    if !item.is_active() {
        return LedgerError::ItemNotFound(record.item_id);
    }
    if record.quantity > item.stock() {
        return LedgerError::InsufficientStock {
            item_id: record.item_id,
            requested: record.quantity,
            available: item.stock(),
        };
    }
    LedgerError::InvalidQuantity(i64::try_from(record.quantity).unwrap_or(i64::MAX))
}

fn journal_position(committed: &[StoredEvent]) -> Result<TransactionId, LedgerError> {
    committed
        .iter()
        .find(|e| e.aggregate_id == JOURNAL_STREAM_ID)
        .map(|e| TransactionId(e.sequence_number))
        .ok_or_else(|| LedgerError::PersistenceFailure("journal event missing from commit".to_string()))
}
