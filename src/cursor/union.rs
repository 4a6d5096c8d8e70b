//! Disjunction merge
//!
//! Branches are drained one at a time, last declared first. A document is
//! yielded only if no earlier-drained branch yielded the same identity.
//! The identity set lives as long as the producer and grows with every
//! distinct document yielded.

use std::collections::HashSet;

use serde_json::Value;

use super::producer::{Producer, ProducerFuture};
use crate::errors::QueryError;
use crate::lang::{structural_hash, Document, ValueHash, ID_FIELD};

/// Merges branch producers with identity deduplication
pub struct UnionProducer {
    pending: Vec<Box<dyn Producer>>,
    current: Option<Box<dyn Producer>>,
    seen: HashSet<ValueHash>,
}

impl UnionProducer {
    /// Creates a union over branches in declaration order
    pub fn new(branches: Vec<Box<dyn Producer>>) -> Self {
        Self {
            pending: branches,
            current: None,
            seen: HashSet::new(),
        }
    }

    fn current(&mut self) -> Result<&mut Box<dyn Producer>, QueryError> {
        self.current
            .as_mut()
            .ok_or_else(|| QueryError::cursor_state("no branch is active"))
    }
}

impl Producer for UnionProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            loop {
                if self.current.is_none() {
                    match self.pending.pop() {
                        Some(branch) => self.current = Some(branch),
                        None => return Ok(None),
                    }
                }
                let Some(branch) = self.current.as_mut() else {
                    return Ok(None);
                };

                let next = branch.advance().await?;
                match next {
                    Some(document) => {
                        let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);
                        if self.seen.insert(structural_hash(&id)) {
                            return Ok(Some(document));
                        }
                    }
                    None => self.current = None,
                }
            }
        })
    }

    fn delete_current(&mut self) -> ProducerFuture<'_, ()> {
        Box::pin(async move { self.current()?.delete_current().await })
    }

    fn replace_current(&mut self, document: Document) -> ProducerFuture<'_, ()> {
        Box::pin(async move { self.current()?.replace_current(document).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::testing::{collect, VecProducer};
    use serde_json::json;

    #[tokio::test]
    async fn test_last_branch_first_and_dedup() {
        let first = VecProducer::new(vec![json!({"_id": 1}), json!({"_id": 2})]);
        let second = VecProducer::new(vec![json!({"_id": 2.0, "b": true}), json!({"_id": 3})]);
        let mut union = UnionProducer::new(vec![Box::new(first), Box::new(second)]);
        assert_eq!(
            collect(&mut union).await,
            vec![json!({"_id": 2.0, "b": true}), json!({"_id": 3}), json!({"_id": 1})]
        );
    }

    #[tokio::test]
    async fn test_empty_union() {
        let mut union = UnionProducer::new(Vec::new());
        assert!(union.advance().await.unwrap().is_none());
        assert!(union.delete_current().await.is_err());
    }
}
