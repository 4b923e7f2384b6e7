use crate::error::PublishError;
use crate::table::SampleTable;
use async_trait::async_trait;
use uuid::Uuid;

/// A destination for a finished session's table.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// Publish every row of `table`. Returns the number of rows written.
    async fn publish(&self, session: Uuid, table: &SampleTable) -> Result<usize, PublishError>;
}
