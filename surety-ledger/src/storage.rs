//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `events` - Hash-chained audit log (key: sequence, big-endian)
//! - `state` - One row per ledger entity (see [`crate::journal`] for keys)
//! - `indices` - Registration order of airlines and flights
//!
//! Every committed call writes its events and the rows it touched in one
//! `WriteBatch`, so the two never disagree after a crash.

use crate::{
    error::{Error, Result},
    events::LedgerEvent,
    journal::Row,
    Config,
};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_STATE: &str = "state";
const CF_INDICES: &str = "indices";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.storage.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.storage.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.storage.max_background_jobs);

        if config.storage.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_STATE, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Point writes on every commit, full scan on open
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Persist one committed call: its events plus the rows it touched (atomic)
    pub fn commit(&self, rows: &[Row], events: &[LedgerEvent]) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_events = self.cf_handle(CF_EVENTS)?;
        for event in events {
            let value = bincode::serialize(event)?;
            batch.put_cf(&cf_events, event.sequence.to_be_bytes(), &value);
        }

        let cf_state = self.cf_handle(CF_STATE)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for row in rows {
            let cf = if row.is_index() { &cf_indices } else { &cf_state };
            batch.put_cf(cf, row.key(), bincode::serialize(row)?);
        }

        self.db.write(batch)?;

        tracing::debug!(events = events.len(), rows = rows.len(), "Commit persisted");
        Ok(())
    }

    /// Every stored row; empty for a fresh database
    pub fn load_rows(&self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for name in [CF_STATE, CF_INDICES] {
            let cf = self.cf_handle(name)?;
            for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
                let (_, value) = item?;
                rows.push(bincode::deserialize(&value)?);
            }
        }
        Ok(rows)
    }

    /// Get event by sequence number
    pub fn get_event(&self, sequence: u64) -> Result<LedgerEvent> {
        let cf = self.cf_handle(CF_EVENTS)?;

        let value = self
            .db
            .get_cf(&cf, sequence.to_be_bytes())?
            .ok_or(Error::EventNotFound(sequence))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Events with `from <= sequence < to`, in order
    pub fn get_events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = from.to_be_bytes();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start, rocksdb::Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (_, value) = item?;
            let event: LedgerEvent = bincode::deserialize(&value)?;
            if event.sequence >= to {
                break;
            }
            events.push(event);
        }

        Ok(events)
    }

    /// Most recent event
    pub fn latest_event(&self) -> Result<Option<LedgerEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;

        match self.db.iterator_cf(&cf, IteratorMode::End).next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(bincode::deserialize(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}
