//! CsvSubscriber - appends deliveries as CSV rows to a file

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use contracts::{FanoutError, PairId, PriceSubscriber};

/// Subscriber that records every delivery as a `timestamp,pair,rate` row.
pub struct CsvSubscriber {
    name: String,
    file: Mutex<File>,
}

impl CsvSubscriber {
    /// Create the output file (truncating an existing one) and write the header.
    pub async fn create(name: impl Into<String>, path: &Path) -> Result<Self, FanoutError> {
        let name = name.into();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| FanoutError::delivery(&name, format!("open {}: {e}", path.display())))?;

        file.write_all(b"timestamp,pair,rate\n")
            .await
            .map_err(|e| FanoutError::delivery(&name, format!("write header: {e}")))?;

        debug!(subscriber = %name, path = %path.display(), "csv output created");

        Ok(Self {
            name,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl PriceSubscriber for CsvSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        let row = format!("{},{},{}\n", Utc::now().to_rfc3339(), pair, rate);

        let mut file = self.file.lock().await;
        file.write_all(row.as_bytes())
            .await
            .map_err(|e| FanoutError::delivery(&self.name, format!("write row: {e}")))?;
        file.flush()
            .await
            .map_err(|e| FanoutError::delivery(&self.name, format!("flush: {e}")))?;
        Ok(())
    }
}
