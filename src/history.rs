use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::info;

/// Qué le pasó a la pista
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Queued,
    Played,
}

/// Registro de historial, una línea JSON por evento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub guild_id: u64,
    pub user_id: u64,
    pub title: String,
    pub stream_locator: String,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

/// Destino de historial de solo escritura. Los errores se registran en el
/// log y nunca frenan la reproducción.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<()>;
}

/// Historial en `<data_dir>/history.jsonl`
pub struct JsonHistorySink {
    path: PathBuf,
    // Serializa las escrituras para que las líneas no se mezclen
    write_lock: Mutex<()>,
}

impl JsonHistorySink {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).await?;
        let path = data_dir.join("history.jsonl");

        info!("📁 Historial en: {}", path.display());

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for JsonHistorySink {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
