//! Streamable values: an ordered, append-only channel of partial results.
//!
//! The producer half (`StreamWriter`) is consumed by `done` or `error`, so no
//! update can follow a terminal marker.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use navigator_core::Error;

/// One event delivered to the consumer of a streamable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamUpdate {
    Update { value: Value },
    Error { kind: String, error: String },
    Done,
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamUpdate::Update { .. })
    }
}

/// Consumer half.
pub struct StreamableValue {
    rx: mpsc::Receiver<StreamUpdate>,
}

/// Producer half.
pub struct StreamWriter {
    tx: mpsc::Sender<StreamUpdate>,
}

impl StreamableValue {
    pub fn channel(buffer: usize) -> (StreamWriter, StreamableValue) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (StreamWriter { tx }, StreamableValue { rx })
    }

    pub async fn next(&mut self) -> Option<StreamUpdate> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<StreamUpdate> {
        ReceiverStream::new(self.rx)
    }

    /// Drain every update until the producer finishes.
    pub async fn collect(mut self) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next().await {
            updates.push(update);
        }
        updates
    }
}

impl StreamWriter {
    /// Append a partial result. Returns `false` once the consumer has gone away.
    pub async fn update(&self, value: Value) -> bool {
        self.tx.send(StreamUpdate::Update { value }).await.is_ok()
    }

    pub async fn done(self) {
        let _ = self.tx.send(StreamUpdate::Done).await;
    }

    pub async fn error(self, err: &Error) {
        let _ = self
            .tx
            .send(StreamUpdate::Error {
                kind: err.kind().to_string(),
                error: err.to_string(),
            })
            .await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_updates_arrive_in_order_then_done() {
        let (writer, value) = StreamableValue::channel(8);
        tokio::spawn(async move {
            for i in 0..3 {
                assert!(writer.update(json!(i)).await);
            }
            writer.done().await;
        });

        let updates = value.collect().await;
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Update { value: json!(0) },
                StreamUpdate::Update { value: json!(1) },
                StreamUpdate::Update { value: json!(2) },
                StreamUpdate::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_error_marker_is_terminal() {
        let (writer, value) = StreamableValue::channel(1);
        writer.error(&Error::Parse("bad args".into())).await;

        let updates = value.collect().await;
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_terminal());
        assert_eq!(
            serde_json::to_value(&updates[0]).unwrap(),
            json!({"type": "error", "kind": "parse_error", "error": "Parse error: bad args"})
        );
    }

    #[tokio::test]
    async fn test_update_reports_dropped_consumer() {
        let (writer, value) = StreamableValue::channel(1);
        drop(value);
        assert!(writer.is_closed());
        assert!(!writer.update(json!({})).await);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_value(StreamUpdate::Update { value: json!({"city": "Austin"}) })
                .unwrap(),
            json!({"type": "update", "value": {"city": "Austin"}})
        );
        assert_eq!(
            serde_json::to_value(StreamUpdate::Done).unwrap(),
            json!({"type": "done"})
        );
    }
}
