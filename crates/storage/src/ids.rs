//! Block identifier generator
//!
//! Identifiers are reserved from the `{prefix}Identifiers` table in blocks
//! of `block_size`. Each reservation advances `NextVal` with a
//! compare-and-set update inside an immediate transaction; a lost race
//! (another store advanced the row first) re-reads and tries again. Ids
//! handed out by one generator are strictly increasing, and blocks of
//! different generators never overlap.

use parking_lot::Mutex;
use quire_core::{QuireError, QuireResult};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use tracing::debug;

use crate::connection::SharedConnection;
use crate::dialect::{quote_ident, TableNames};
use crate::sql_error::map_sql_error;

/// Dimension used for document identifiers
pub const DOCUMENT_DIMENSION: &str = "Document";

const MAX_RESERVE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct IdBlock {
    next: i64,
    end: i64,
}

impl IdBlock {
    fn take(&mut self) -> Option<i64> {
        (self.next < self.end).then(|| {
            let id = self.next;
            self.next += 1;
            id
        })
    }
}

/// Block-reserving identifier generator
pub struct LinearBlockIdGenerator {
    conn: SharedConnection,
    table: String,
    block_size: u64,
    blocks: Mutex<HashMap<String, IdBlock>>,
}

impl LinearBlockIdGenerator {
    /// Create a generator reserving `block_size` ids at a time through `conn`
    pub fn new(conn: SharedConnection, names: &TableNames, block_size: u64) -> QuireResult<Self> {
        if block_size == 0 {
            return Err(QuireError::configuration("id block size must be at least 1"));
        }
        Ok(Self {
            conn,
            table: quote_ident(&names.identifiers())?,
            block_size,
            blocks: Mutex::new(HashMap::new()),
        })
    }

    /// Ids reserved per round-trip
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Next identifier in `dimension` if the local block still has one
    ///
    /// Never touches the database and never waits: returns `None` when the
    /// block is used up or another thread is reserving the next one.
    pub fn try_next_id(&self, dimension: &str) -> Option<i64> {
        let mut blocks = self.blocks.try_lock()?;
        blocks.get_mut(dimension)?.take()
    }

    /// Next identifier in `dimension`, reserving a new block when needed
    ///
    /// Blocking: a reservation is a write transaction and waits for the
    /// database write lock up to the connection's busy timeout.
    pub fn next_id(&self, dimension: &str) -> QuireResult<i64> {
        let mut blocks = self.blocks.lock();
        if let Some(id) = blocks.get_mut(dimension).and_then(IdBlock::take) {
            return Ok(id);
        }

        let mut block = self.reserve(dimension)?;
        let id = block.take();
        blocks.insert(dimension.to_string(), block);
        id.ok_or_else(|| QuireError::storage(format!("empty identifier block for {}", dimension)))
    }

    fn reserve(&self, dimension: &str) -> QuireResult<IdBlock> {
        let size = self.block_size as i64;
        let mut conn = self.conn.lock();

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| map_sql_error("begin id reservation", e))?;

            let select = format!("SELECT \"NextVal\" FROM {} WHERE \"Dimension\" = ?1", self.table);
            let current: Option<i64> = tx
                .query_row(&select, params![dimension], |row| row.get(0))
                .optional()
                .map_err(|e| map_sql_error("read identifier block", e))?;

            let reserved = match current {
                None => {
                    let insert = format!(
                        "INSERT INTO {} (\"Dimension\", \"NextVal\") VALUES (?1, ?2)",
                        self.table
                    );
                    tx.execute(&insert, params![dimension, 1 + size])
                        .map_err(|e| map_sql_error("seed identifier block", e))?;
                    Some(IdBlock { next: 1, end: 1 + size })
                }
                Some(start) => {
                    let update = format!(
                        "UPDATE {} SET \"NextVal\" = ?1 WHERE \"Dimension\" = ?2 AND \"NextVal\" = ?3",
                        self.table
                    );
                    let affected = tx
                        .execute(&update, params![start + size, dimension, start])
                        .map_err(|e| map_sql_error("advance identifier block", e))?;
                    (affected == 1).then_some(IdBlock {
                        next: start,
                        end: start + size,
                    })
                }
            };

            tx.commit()
                .map_err(|e| map_sql_error("commit id reservation", e))?;
            if let Some(block) = reserved {
                debug!(
                    target: "quire::ids",
                    dimension,
                    start = block.next,
                    end = block.end,
                    "Reserved identifier block"
                );
                return Ok(block);
            }
        }

        Err(QuireError::lock_contention(format!(
            "could not reserve an identifier block for {} after {} attempts",
            dimension, MAX_RESERVE_ATTEMPTS
        )))
    }
}

impl std::fmt::Debug for LinearBlockIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearBlockIdGenerator")
            .field("table", &self.table)
            .field("block_size", &self.block_size)
            .finish()
    }
}
