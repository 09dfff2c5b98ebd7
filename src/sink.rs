//! Record sink and output messages
//!
//! The orchestrator hands finished records, schemas and state checkpoints to
//! a [`RecordSink`]. Delivery (stdout, files, queues) belongs to the sink.

use crate::error::Result;
use crate::state::State;
use crate::types::JsonObject;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use tokio::sync::Mutex;

/// Messages emitted during a sync
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Stream schema, sent before the stream's first record
    Schema {
        /// Stream name
        stream: String,
        /// JSON Schema of emitted records
        schema: Value,
        /// Primary key fields
        key_properties: Vec<String>,
        /// Replication key, if incremental
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },

    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Record data
        record: JsonObject,
        /// When the record was extracted
        time_extracted: DateTime<Utc>,
    },

    /// State checkpoint
    State {
        /// Full state document
        value: Value,
    },
}

impl Message {
    /// Create a record message stamped now
    pub fn record(stream: impl Into<String>, record: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: Utc::now(),
        }
    }

    /// Create a state message
    pub fn state(state: &State) -> Result<Self> {
        Ok(Self::State {
            value: serde_json::to_value(state)?,
        })
    }
}

/// Destination for sync output
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one message
    async fn write(&self, message: Message) -> Result<()>;

    /// Announce a stream's schema
    async fn write_schema(
        &self,
        stream: &str,
        schema: Value,
        key_properties: &[&str],
        replication_key: Option<&str>,
    ) -> Result<()> {
        self.write(Message::Schema {
            stream: stream.to_string(),
            schema,
            key_properties: key_properties.iter().map(ToString::to_string).collect(),
            bookmark_properties: replication_key.map(ToString::to_string).into_iter().collect(),
        })
        .await
    }

    /// Emit one record
    async fn write_record(&self, stream: &str, record: JsonObject) -> Result<()> {
        self.write(Message::record(stream, record)).await
    }

    /// Emit a state checkpoint
    async fn write_state(&self, state: &State) -> Result<()> {
        self.write(Message::state(state)?).await
    }
}

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages so far
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Records emitted for one stream, in order
    pub async fn records(&self, stream: &str) -> Vec<JsonObject> {
        self.messages
            .lock()
            .await
            .iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, record, ..
                } if s == stream => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// State documents emitted, in order
    pub async fn states(&self) -> Vec<Value> {
        self.messages
            .lock()
            .await
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names of streams whose schema was announced
    pub async fn schema_streams(&self) -> Vec<String> {
        self.messages
            .lock()
            .await
            .iter()
            .filter_map(|m| match m {
                Message::Schema { stream, .. } => Some(stream.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&self, message: Message) -> Result<()> {
        self.messages.lock().await.push(message);
        Ok(())
    }
}

/// Writes one JSON document per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    async fn write(&self, message: Message) -> Result<()> {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}
