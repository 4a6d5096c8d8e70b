//! Limit stage

use crate::cursor::{Producer, ProducerFuture};
use crate::lang::Document;

/// Stops after `n` documents without pulling further from its source
pub struct LimitProducer {
    inner: Box<dyn Producer>,
    remaining: u64,
}

impl LimitProducer {
    pub fn new(inner: Box<dyn Producer>, count: u64) -> Self {
        Self {
            inner,
            remaining: count,
        }
    }
}

impl Producer for LimitProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            if self.remaining == 0 {
                return Ok(None);
            }
            let next = self.inner.advance().await?;
            if next.is_some() {
                self.remaining -= 1;
            }
            Ok(next)
        })
    }

    fn delete_current(&mut self) -> ProducerFuture<'_, ()> {
        self.inner.delete_current()
    }

    fn replace_current(&mut self, document: Document) -> ProducerFuture<'_, ()> {
        self.inner.replace_current(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::testing::{collect, VecProducer};
    use serde_json::json;

    #[tokio::test]
    async fn test_limit() {
        let source = VecProducer::new(vec![json!({"i": 0}), json!({"i": 1}), json!({"i": 2})]);
        let mut limit = LimitProducer::new(Box::new(source), 2);
        assert_eq!(collect(&mut limit).await, vec![json!({"i": 0}), json!({"i": 1})]);
    }

    #[tokio::test]
    async fn test_limit_zero_is_empty() {
        let mut limit = LimitProducer::new(Box::new(VecProducer::new(vec![json!({"i": 0})])), 0);
        assert!(limit.advance().await.unwrap().is_none());
    }
}
