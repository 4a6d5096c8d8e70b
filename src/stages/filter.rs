//! Filter stage: keeps documents the predicate accepts

use crate::cursor::{Producer, ProducerFuture};
use crate::lang::{Document, Fields, Predicate};

/// Re-validates every document against a compiled predicate
pub struct FilterProducer {
    inner: Box<dyn Producer>,
    predicate: Predicate,
}

impl FilterProducer {
    pub fn new(inner: Box<dyn Producer>, predicate: Predicate) -> Self {
        Self { inner, predicate }
    }

    fn accepts(&self, document: &Document) -> bool {
        self.predicate.run(&Fields::new(document))
    }
}

impl Producer for FilterProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            while let Some(document) = self.inner.advance().await? {
                if self.accepts(&document) {
                    return Ok(Some(document));
                }
            }
            Ok(None)
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
    use crate::lang::Compiled;
    use serde_json::json;

    fn predicate(query: serde_json::Value) -> Predicate {
        match Predicate::compile(&query).unwrap() {
            Compiled::Tree(p) => p,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filter_keeps_matching() {
        let source = VecProducer::new(vec![
            json!({"x": 1}),
            json!({"x": 5}),
            json!({"y": 9}),
            json!({"x": 7}),
        ]);
        let mut filter = FilterProducer::new(Box::new(source), predicate(json!({"x": {"$gt": 2}})));
        assert_eq!(collect(&mut filter).await, vec![json!({"x": 5}), json!({"x": 7})]);
    }

    #[tokio::test]
    async fn test_filter_exists_false_keeps_absent() {
        let source = VecProducer::new(vec![json!({"x": 1}), json!({"y": 2})]);
        let mut filter = FilterProducer::new(Box::new(source), predicate(json!({"x": {"$exists": false}})));
        assert_eq!(collect(&mut filter).await, vec![json!({"y": 2})]);
    }
}
