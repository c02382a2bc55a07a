//! Durable Persistence - Trade Journal and Book Snapshots
//!
//! Two crash-safety mechanisms, one file format each:
//! - `TradeJournal`: append-only JSONL of trade records. Each line is
//!   a self-contained JSON object, easy to parse, stream, and recover
//!   from partial writes.
//! - `BookSnapshotStore`: atomic JSON snapshot of every order (write
//!   to tmp file, then rename), so the file on disk is always either
//!   the old or the new book, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::domain::order::{Order, Trade};

/// Append-only JSONL trade journal.
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    /// Create a journal at `<data_dir>/trades.jsonl`, creating the
    /// directory if needed.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        Ok(Self {
            path: dir.join("trades.jsonl"),
        })
    }

    /// Append one trade record as a single JSON line.
    #[instrument(skip(self, trade), fields(trade_id = %trade.id))]
    pub async fn append(&self, trade: &Trade) -> Result<()> {
        let mut json =
            serde_json::to_string(trade).context("Failed to serialize trade")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open trade journal")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write trade record")?;
        file.flush().await.context("Failed to flush trade journal")?;

        Ok(())
    }

    /// Load every journaled trade (audit/recovery).
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<Trade>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .context("Failed to read trade journal")?;

        let mut trades = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let trade: Trade =
                serde_json::from_str(line).context("Failed to parse trade line")?;
            trades.push(trade);
        }
        Ok(trades)
    }

    /// Whether the journal directory is present and writable.
    pub async fn is_healthy(&self) -> bool {
        match self.path.parent() {
            Some(dir) => fs::metadata(dir).await.is_ok(),
            None => false,
        }
    }
}

/// Serialized book snapshot format.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Snapshot format version.
    pub version: String,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Every order in the book, terminal ones included.
    pub orders: Vec<Order>,
}

/// Atomic JSON book snapshot store (tmp write -> rename).
pub struct BookSnapshotStore {
    snapshot_path: PathBuf,
    tmp_path: PathBuf,
}

impl BookSnapshotStore {
    /// Create a snapshot store in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        Ok(Self {
            snapshot_path: dir.join("book.json"),
            tmp_path: dir.join("book.json.tmp"),
        })
    }

    /// Save the book atomically.
    #[instrument(skip(self, orders), fields(order_count = orders.len()))]
    pub async fn save(&self, orders: Vec<Order>) -> Result<()> {
        let snapshot = BookSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: Utc::now(),
            orders,
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize book snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;
        fs::rename(&self.tmp_path, &self.snapshot_path)
            .await
            .context("Failed to rename snapshot file")?;

        info!(path = %self.snapshot_path.display(), "Book snapshot saved");
        Ok(())
    }

    /// Load the latest snapshot; `None` on first startup.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<BookSnapshot>> {
        if !self.snapshot_path.exists() {
            info!("No book snapshot found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.snapshot_path)
            .await
            .context("Failed to read book snapshot")?;
        let snapshot: BookSnapshot =
            serde_json::from_str(&json).context("Failed to parse book snapshot")?;

        info!(
            orders = snapshot.orders.len(),
            version = %snapshot.version,
            "Book snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderIdentity, OrderStatus, Side, TradeProvenance};
    use alloy::primitives::{Address, Bytes, U256};

    fn sample_trade() -> Trade {
        Trade {
            id: uuid::Uuid::new_v4(),
            chain_id: 137,
            verifying_contract: Address::repeat_byte(0xee),
            market_key: None,
            maker: Address::repeat_byte(0x01),
            taker: Some(Address::repeat_byte(0x02)),
            outcome_index: 0,
            side: Side::Buy,
            price: U256::from(400_000u64),
            amount: U256::from(25u64),
            provenance: TradeProvenance::OffChain,
            executed_at: Utc::now(),
        }
    }

    fn sample_order() -> Order {
        Order {
            identity: OrderIdentity {
                chain_id: 137,
                verifying_contract: Address::repeat_byte(0xee),
                maker: Address::repeat_byte(0x01),
                salt: U256::from(7u64),
            },
            market_key: None,
            outcome_index: 0,
            side: Side::Sell,
            price: U256::from(600_000u64),
            amount: U256::from(30u64),
            remaining: U256::from(30u64),
            expiry: None,
            signature: Bytes::from(vec![2u8; 65]),
            status: OrderStatus::Open,
            sequence: 9,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_journal_append_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().to_str().unwrap()).await.unwrap();

        journal.append(&sample_trade()).await.unwrap();
        journal.append(&sample_trade()).await.unwrap();

        let trades = journal.load_all().await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].amount, U256::from(25u64));
    }

    #[tokio::test]
    async fn test_journal_load_empty_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().to_str().unwrap()).await.unwrap();
        assert!(journal.load_all().await.unwrap().is_empty());
        assert!(journal.is_healthy().await);
    }

    #[tokio::test]
    async fn test_snapshot_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookSnapshotStore::new(dir.path().to_str().unwrap()).await.unwrap();

        assert!(store.load().await.unwrap().is_none());

        store.save(vec![sample_order()]).await.unwrap();
        let snapshot = store.load().await.unwrap().unwrap();
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.orders[0].sequence, 9);
    }
}
