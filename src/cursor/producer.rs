//! The single-flight iteration protocol
//!
//! A producer yields one document per `advance`. Stages are decorators that
//! each own exactly one inner producer, so at most one storage request is
//! ever in flight for a cursor.

use futures_util::future::BoxFuture;

use crate::errors::{QueryError, QueryResult};
use crate::lang::Document;

/// Future returned by producer operations
pub type ProducerFuture<'a, T> = BoxFuture<'a, QueryResult<T>>;

/// A lazily driven document source
pub trait Producer: Send {
    /// Yields the next document, or `None` once the stream is exhausted
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>>;

    /// Deletes the stored entry behind the last yielded document.
    ///
    /// Only producers whose output maps one-to-one onto stored entries
    /// support this.
    fn delete_current(&mut self) -> ProducerFuture<'_, ()> {
        Box::pin(async { Err(not_mutable()) })
    }

    /// Replaces the stored entry behind the last yielded document
    fn replace_current(&mut self, document: Document) -> ProducerFuture<'_, ()> {
        drop(document);
        Box::pin(async { Err(not_mutable()) })
    }
}

fn not_mutable() -> QueryError {
    QueryError::cursor_state("pipeline output is not backed by a stored entry")
}

/// A producer that never yields
pub struct EmptyProducer;

impl Producer for EmptyProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async { Ok(None) })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory producer for stage tests

    use std::collections::VecDeque;

    use serde_json::Value;

    use super::*;

    /// Yields a fixed list of documents
    pub struct VecProducer {
        docs: VecDeque<Document>,
    }

    impl VecProducer {
        pub fn new(values: Vec<Value>) -> Self {
            let docs = values
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect();
            Self { docs }
        }
    }

    impl Producer for VecProducer {
        fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
            let next = self.docs.pop_front();
            Box::pin(async move { Ok(next) })
        }
    }

    /// Drains a producer into values
    pub async fn collect(producer: &mut dyn Producer) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(doc) = producer.advance().await.unwrap() {
            out.push(Value::Object(doc));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_producer() {
        let mut producer = EmptyProducer;
        assert!(producer.advance().await.unwrap().is_none());
        let err = producer.delete_current().await.unwrap_err();
        assert_eq!(err.code(), "QUERY_CURSOR_STATE");
    }
}
