//! Cursor: append-only pipeline builder and lazy runtime
//!
//! A cursor moves through these states:
//! - Unopened: builder calls append stages
//! - Open: the first consumption call planned the pipeline and built the
//!   producer chain; every later call drives that same chain
//! - Exhausted: the chain reported its end
//! - Failed: planning or iteration failed; the error is returned again by
//!   every later consumption call
//!
//! Builder calls on a cursor that is no longer unopened fail with
//! `QUERY_CURSOR_STATE`.

use serde_json::{json, Value};
use uuid::Uuid;

use super::build::build;
use super::producer::Producer;
use crate::collection::Collection;
use crate::errors::{QueryError, QueryResult};
use crate::lang::{Document, Path};
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{AccessMethod, ExecutionPlan, PlanSource, QueryPlanner, Stage};
use crate::storage::AccessMode;

enum State {
    Unopened,
    Open(Box<dyn Producer>),
    Exhausted,
    Failed(QueryError),
}

/// A lazily planned query over one collection
pub struct Cursor {
    id: Uuid,
    collection: Collection,
    mode: AccessMode,
    pipeline: Vec<Stage>,
    hint: Option<Path>,
    state: State,
    returned: u64,
}

impl Cursor {
    pub(crate) fn new(collection: Collection, mode: AccessMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection,
            mode,
            pipeline: Vec::new(),
            hint: None,
            state: State::Unopened,
            returned: 0,
        }
    }

    /// Unique cursor id, used in log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The access mode the cursor was created with
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns true once the first consumption call has happened
    pub fn is_opened(&self) -> bool {
        !matches!(self.state, State::Unopened)
    }

    /// The stages appended so far
    pub fn stages(&self) -> &[Stage] {
        &self.pipeline
    }

    // ==================
    // Builder
    // ==================

    /// Appends a stage
    pub fn stage(&mut self, stage: Stage) -> QueryResult<&mut Self> {
        self.ensure_unopened()?;
        self.pipeline.push(stage);
        Ok(self)
    }

    pub fn filter(&mut self, query: Value) -> QueryResult<&mut Self> {
        self.stage(Stage::Filter(query))
    }

    pub fn project(&mut self, spec: Value) -> QueryResult<&mut Self> {
        self.stage(Stage::Project(spec))
    }

    pub fn group(&mut self, spec: Value) -> QueryResult<&mut Self> {
        self.stage(Stage::Group(spec))
    }

    /// Appends an unwind over a `$`-prefixed path such as `"$tags"`
    pub fn unwind(&mut self, path: impl Into<String>) -> QueryResult<&mut Self> {
        self.stage(Stage::Unwind(path.into()))
    }

    pub fn sort(&mut self, spec: Value) -> QueryResult<&mut Self> {
        self.stage(Stage::Sort(spec))
    }

    pub fn skip(&mut self, count: u64) -> QueryResult<&mut Self> {
        self.stage(Stage::Skip(count))
    }

    pub fn limit(&mut self, count: u64) -> QueryResult<&mut Self> {
        self.stage(Stage::Limit(count))
    }

    /// Restricts planning to the index on `path`.
    ///
    /// The path must be declared indexed on the collection.
    pub fn hint(&mut self, path: &str) -> QueryResult<&mut Self> {
        self.ensure_unopened()?;
        let path = Path::parse(path)?;
        if !self.collection.is_indexed(path.literal()) {
            return Err(QueryError::cursor_state(format!(
                "hint '{}' does not name an index of collection '{}'",
                path,
                self.collection.name()
            )));
        }
        self.hint = Some(path);
        Ok(self)
    }

    fn ensure_unopened(&self) -> QueryResult<()> {
        match self.state {
            State::Unopened => Ok(()),
            _ => Err(QueryError::cursor_state(
                "cannot change the pipeline of a cursor that has been opened",
            )),
        }
    }

    // ==================
    // Planning
    // ==================

    fn plan(&self) -> QueryResult<ExecutionPlan> {
        QueryPlanner::new(self.collection.indexes(), self.collection.operators())
            .plan(&self.pipeline, self.hint.as_ref())
    }

    /// Plans the pipeline without opening the cursor or touching storage
    pub fn explain(&self) -> QueryResult<Value> {
        let plan = self.plan()?;
        Ok(json!({
            "collection": self.collection.name(),
            "hint": self.hint.as_ref().map(|p| p.literal().to_string()),
            "plan": plan.explain(),
        }))
    }

    fn open(&mut self) -> QueryResult<()> {
        if !matches!(self.state, State::Unopened) {
            return Ok(());
        }

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(err) => {
                self.state = State::Failed(err.clone());
                return Err(err);
            }
        };

        let id = self.id.to_string();
        let stages = self.pipeline.len().to_string();
        log_event_with_fields(
            Event::CursorOpened,
            &[
                ("collection", self.collection.name()),
                ("cursor", &id),
                ("mode", mode_name(self.mode)),
                ("stages", &stages),
            ],
        );
        log_plan(&id, &plan);

        let producer = build(plan, self.collection.storage(), self.collection.name(), self.mode);
        self.state = State::Open(producer);
        Ok(())
    }

    // ==================
    // Consumption
    // ==================

    /// Returns the next document, or `None` at the end of the sequence
    pub async fn advance(&mut self) -> QueryResult<Option<Document>> {
        self.open()?;
        let producer = match &mut self.state {
            State::Open(producer) => producer,
            State::Exhausted => return Ok(None),
            State::Failed(err) => return Err(err.clone()),
            State::Unopened => return Err(QueryError::cursor_state("cursor is not open")),
        };

        let next = producer.advance().await;
        match next {
            Ok(Some(document)) => {
                self.returned += 1;
                Ok(Some(document))
            }
            Ok(None) => {
                let id = self.id.to_string();
                let returned = self.returned.to_string();
                log_event_with_fields(
                    Event::CursorExhausted,
                    &[("cursor", &id), ("returned", &returned)],
                );
                self.state = State::Exhausted;
                Ok(None)
            }
            Err(err) => {
                self.log_failure(&err);
                self.state = State::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Drains the cursor into a vector, stopping at the first error
    pub async fn drain_all(&mut self) -> QueryResult<Vec<Document>> {
        let mut out = Vec::new();
        while let Some(document) = self.advance().await? {
            out.push(document);
        }
        Ok(out)
    }

    /// Drives the cursor to the end, handing each document to `f`
    pub async fn for_each<F>(&mut self, mut f: F) -> QueryResult<()>
    where
        F: FnMut(Document),
    {
        while let Some(document) = self.advance().await? {
            f(document);
        }
        Ok(())
    }

    /// Deletes the stored entry behind the last returned document
    pub async fn delete_current(&mut self) -> QueryResult<()> {
        let result = self.writable()?.delete_current().await;
        if let Err(err) = &result {
            self.log_failure(err);
        }
        result
    }

    /// Replaces the stored entry behind the last returned document
    pub async fn replace_current(&mut self, document: Document) -> QueryResult<()> {
        let result = self.writable()?.replace_current(document).await;
        if let Err(err) = &result {
            self.log_failure(err);
        }
        result
    }

    fn writable(&mut self) -> QueryResult<&mut Box<dyn Producer>> {
        if self.mode != AccessMode::ReadWrite {
            return Err(QueryError::cursor_state("cursor is read-only"));
        }
        match &mut self.state {
            State::Open(producer) => Ok(producer),
            _ => Err(QueryError::cursor_state("no document under the cursor")),
        }
    }

    fn log_failure(&self, err: &QueryError) {
        if let QueryError::Storage(storage) = err {
            let id = self.id.to_string();
            log_event_with_fields(
                Event::StorageFailure,
                &[
                    ("code", storage.code().code()),
                    ("cursor", &id),
                    ("message", storage.message()),
                ],
            );
        }
    }
}

fn mode_name(mode: AccessMode) -> &'static str {
    match mode {
        AccessMode::ReadOnly => "READ_ONLY",
        AccessMode::ReadWrite => "READ_WRITE",
    }
}

fn log_plan(cursor: &str, plan: &ExecutionPlan) {
    let residual = plan.pipeline.len().to_string();
    match &plan.source {
        PlanSource::Empty => log_event_with_fields(Event::PlanContradiction, &[("cursor", cursor)]),
        PlanSource::Access(AccessMethod::FullScan) => log_event_with_fields(
            Event::PlanFullScan,
            &[("cursor", cursor), ("residual_stages", &residual)],
        ),
        PlanSource::Access(AccessMethod::IndexScan { path, .. }) => log_event_with_fields(
            Event::PlanIndexScan,
            &[
                ("cursor", cursor),
                ("index", path.literal()),
                ("residual_stages", &residual),
            ],
        ),
        PlanSource::Union(branches) => {
            let count = branches.len().to_string();
            log_event_with_fields(
                Event::PlanUnion,
                &[
                    ("branches", &count),
                    ("cursor", cursor),
                    ("residual_stages", &residual),
                ],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collection::Db;
    use crate::config::DbConfig;
    use crate::storage::MemoryStorage;

    async fn collection() -> Collection {
        let config = DbConfig::from_json_str(r#"{"name": "t", "collections": {"c": ["x"]}}"#).unwrap();
        let db = Db::open(&config, Arc::new(MemoryStorage::new())).unwrap();
        let c = db.collection("c").unwrap();
        c.insert(vec![
            json!({"x": 1, "k": "a"}).as_object().cloned().unwrap(),
            json!({"x": 2, "k": "b"}).as_object().cloned().unwrap(),
            json!({"x": 3, "k": "c"}).as_object().cloned().unwrap(),
        ])
        .await
        .unwrap();
        c
    }

    #[tokio::test]
    async fn test_builder_rejected_after_open() {
        let c = collection().await;
        let mut cursor = c.cursor();
        cursor.filter(json!({"x": {"$gt": 1}})).unwrap().limit(1).unwrap();
        assert!(!cursor.is_opened());

        assert!(cursor.advance().await.unwrap().is_some());
        assert!(cursor.is_opened());

        let err = cursor.skip(1).err().unwrap();
        assert_eq!(err.code(), "QUERY_CURSOR_STATE");
        assert!(cursor.hint("x").is_err());

        // The already-built chain keeps running.
        assert!(cursor.advance().await.unwrap().is_none());
        assert!(cursor.advance().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hint_requires_index() {
        let c = collection().await;
        let mut cursor = c.cursor();
        assert!(cursor.hint("x").is_ok());
        assert!(cursor.hint("_id").is_ok());
        let err = cursor.hint("k").err().unwrap();
        assert_eq!(err.code(), "QUERY_CURSOR_STATE");
    }

    #[tokio::test]
    async fn test_compile_failure_is_sticky() {
        let c = collection().await;
        let mut cursor = c.cursor();
        cursor.filter(json!({"x": {"$near": 1}})).unwrap();
        let first = cursor.advance().await.unwrap_err();
        assert_eq!(first.code(), "QUERY_PREDICATE_INVALID");
        let second = cursor.drain_all().await.unwrap_err();
        assert_eq!(second.code(), "QUERY_PREDICATE_INVALID");
    }

    #[tokio::test]
    async fn test_for_each_and_explain() {
        let c = collection().await;
        let mut cursor = c.cursor();
        cursor.filter(json!({"x": {"$lte": 2}})).unwrap();

        let explained = cursor.explain().unwrap();
        assert_eq!(explained["plan"]["source"], json!("INDEX_SCAN"));
        assert!(!cursor.is_opened());

        let mut keys = Vec::new();
        cursor
            .for_each(|doc| keys.push(doc["k"].clone()))
            .await
            .unwrap();
        assert_eq!(keys, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_read_only_cursor_cannot_mutate() {
        let c = collection().await;
        let mut cursor = c.cursor();
        assert!(cursor.advance().await.unwrap().is_some());
        let err = cursor.delete_current().await.unwrap_err();
        assert_eq!(err.code(), "QUERY_CURSOR_STATE");
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("collection", &self.collection)
            .field("returned", &self.returned)
            .finish_non_exhaustive()
    }
}
