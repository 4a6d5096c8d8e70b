//! Skip stage
//!
//! A source shorter than the skip count ends the stream silently.

use crate::cursor::{Producer, ProducerFuture};
use crate::lang::Document;

/// Drops the first `n` documents
pub struct SkipProducer {
    inner: Box<dyn Producer>,
    remaining: u64,
}

impl SkipProducer {
    pub fn new(inner: Box<dyn Producer>, count: u64) -> Self {
        Self {
            inner,
            remaining: count,
        }
    }
}

impl Producer for SkipProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            while self.remaining > 0 {
                match self.inner.advance().await? {
                    Some(_) => self.remaining -= 1,
                    None => {
                        self.remaining = 0;
                        return Ok(None);
                    }
                }
            }
            self.inner.advance().await
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
    async fn test_skip() {
        let source = VecProducer::new(vec![json!({"i": 0}), json!({"i": 1}), json!({"i": 2})]);
        let mut skip = SkipProducer::new(Box::new(source), 2);
        assert_eq!(collect(&mut skip).await, vec![json!({"i": 2})]);
    }

    #[tokio::test]
    async fn test_skip_past_end_is_empty() {
        let source = VecProducer::new(vec![json!({"i": 0})]);
        let mut skip = SkipProducer::new(Box::new(source), 5);
        assert!(skip.advance().await.unwrap().is_none());
        assert!(skip.advance().await.unwrap().is_none());
    }
}
