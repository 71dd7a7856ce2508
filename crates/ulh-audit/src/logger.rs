//! Delivery of [`CallLogRecord`]s. Delivery is fire-and-forget (spec
//! §4.10): a logger implementation must not make the caller wait on a
//! slow sink, and must swallow its own delivery failures rather than
//! propagate them back into the call path.

use async_trait::async_trait;

use crate::record::CallLogRecord;

#[async_trait]
pub trait CallLogger: Send + Sync {
    async fn log(&self, record: CallLogRecord);
}

/// In-memory [`CallLogger`] used by tests and local development.
#[derive(Default)]
pub struct InMemoryCallLogger {
    records: std::sync::Mutex<Vec<CallLogRecord>>,
}

impl InMemoryCallLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<CallLogRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallLogger for InMemoryCallLogger {
    async fn log(&self, record: CallLogRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallLogBuilder;

    #[tokio::test]
    async fn in_memory_logger_retains_records_in_order() {
        let logger = InMemoryCallLogger::new();
        logger
            .log(CallLogBuilder::new("u1", "app1", "fn1", "tools/call").build())
            .await;
        logger
            .log(CallLogBuilder::new("u1", "app1", "fn2", "tools/call").build())
            .await;

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].function_name, "fn1");
        assert_eq!(records[1].function_name, "fn2");
    }
}
