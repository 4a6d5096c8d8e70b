//! Innermost producer: drives one storage cursor
//!
//! The storage cursor is opened on the first `advance`, not at build time,
//! so a plan that is never consumed never touches storage.

use std::sync::Arc;

use super::producer::{Producer, ProducerFuture};
use crate::errors::QueryError;
use crate::lang::Document;
use crate::storage::{AccessMode, ScanRequest, Storage, StoreCursor};

/// Yields the entries of one scan request
pub struct StorageProducer {
    storage: Arc<dyn Storage>,
    collection: String,
    mode: AccessMode,
    request: ScanRequest,
    cursor: Option<Box<dyn StoreCursor>>,
    exhausted: bool,
}

impl StorageProducer {
    pub fn new(
        storage: Arc<dyn Storage>,
        collection: impl Into<String>,
        mode: AccessMode,
        request: ScanRequest,
    ) -> Self {
        Self {
            storage,
            collection: collection.into(),
            mode,
            request,
            cursor: None,
            exhausted: false,
        }
    }

    fn positioned(&mut self) -> Result<&mut Box<dyn StoreCursor>, QueryError> {
        self.cursor
            .as_mut()
            .ok_or_else(|| QueryError::cursor_state("no entry under the cursor"))
    }
}

impl Producer for StorageProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            if self.exhausted {
                return Ok(None);
            }
            if self.cursor.is_none() {
                let cursor = self
                    .storage
                    .open_cursor(&self.collection, self.mode, self.request.clone())
                    .await?;
                self.cursor = Some(cursor);
            }

            let next = match self.cursor.as_mut() {
                Some(cursor) => cursor.advance().await?,
                None => None,
            };
            if next.is_none() {
                self.exhausted = true;
                self.cursor = None;
            }
            Ok(next)
        })
    }

    fn delete_current(&mut self) -> ProducerFuture<'_, ()> {
        Box::pin(async move {
            self.positioned()?.delete().await?;
            Ok(())
        })
    }

    fn replace_current(&mut self, document: Document) -> ProducerFuture<'_, ()> {
        Box::pin(async move {
            self.positioned()?.replace(document).await?;
            Ok(())
        })
    }
}
