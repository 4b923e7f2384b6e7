use super::traits::Publisher;
use crate::error::PublishError;
use crate::table::SampleTable;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes the table to a CSV file, replacing any previous content.
#[derive(Debug, Clone)]
pub struct CsvPublisher {
    path: PathBuf,
}

impl CsvPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Publisher for CsvPublisher {
    fn name(&self) -> &str {
        "csv"
    }

    async fn publish(&self, session: Uuid, table: &SampleTable) -> Result<usize, PublishError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, table.to_csv_string()).await?;
        tracing::info!(%session, path = %self.path.display(), rows = table.len(), "metrics saved");
        Ok(table.len())
    }
}
