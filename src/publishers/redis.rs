use super::traits::Publisher;
use crate::error::PublishError;
use crate::table::{Cell, SampleTable};
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Appends one JSON object per row to a Redis list.
///
/// Absent cells become `null` so a consumer can tell them from zero. JSON
/// has no NaN or infinity, so those readings are sent as the strings `"NaN"`,
/// `"inf"` and `"-inf"`.
pub struct RedisPublisher {
    client: ::redis::Client,
    key: String,
}

impl RedisPublisher {
    pub fn new(url: &str, key: impl Into<String>) -> Result<Self, PublishError> {
        Ok(Self {
            client: ::redis::Client::open(url)?,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The JSON payload pushed for one table row.
pub fn row_payload(session: Uuid, columns: &[String], row: &[Cell]) -> Value {
    let mut object = Map::with_capacity(columns.len() + 1);
    object.insert("session".into(), Value::String(session.to_string()));
    for (column, cell) in columns.iter().zip(row) {
        let value = match cell {
            Cell::Absent => Value::Null,
            Cell::Number(v) => serde_json::Number::from_f64(*v)
                .map_or_else(|| Value::String(v.to_string()), Value::Number),
            Cell::Text(s) => Value::String(s.clone()),
        };
        object.insert(column.clone(), value);
    }
    Value::Object(object)
}

#[async_trait]
impl Publisher for RedisPublisher {
    fn name(&self) -> &str {
        "redis"
    }

    async fn publish(&self, session: Uuid, table: &SampleTable) -> Result<usize, PublishError> {
        if table.is_empty() {
            return Ok(0);
        }

        let mut pipe = ::redis::pipe();
        for row in table.rows() {
            let payload = serde_json::to_string(&row_payload(session, table.columns(), row))?;
            pipe.rpush(&self.key, payload).ignore();
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::info!(%session, key = %self.key, rows = table.len(), "metrics pushed to redis");
        Ok(table.len())
    }
}
