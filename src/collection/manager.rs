use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::collection::state::CollectionState;
use crate::collection::validate::{check_alter_compatible, coerce_fields, parse_document_json};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CollectionStats, HealthCheck, HealthCheckResult, HealthStatus};
use crate::core::types::{DocId, Document, FieldValue, InsertMode};
use crate::mvcc::{MVCCController, WriterSlot};
use crate::schema::{FieldDefinition, Schema};
use crate::search::executor;
use crate::search::executor::{SearchRequest, SearchResponse};
use crate::storage::layout::StorageLayout;
use crate::storage::wal::{replay, SyncMode, Wal, WalOperation};
use crate::store::kv::KvStore;

fn schema_key(name: &str) -> Vec<u8> {
    format!("coll/{name}/schema").into_bytes()
}

fn snapshot_key(name: &str) -> Vec<u8> {
    format!("coll/{name}/snapshot").into_bytes()
}

fn seq_key(name: &str) -> Vec<u8> {
    format!("seq/{name}").into_bytes()
}

fn doc_key(name: &str, seq: u64) -> Vec<u8> {
    format!("doc/{name}/{seq}").into_bytes()
}

fn doc_prefix(name: &str) -> Vec<u8> {
    format!("doc/{name}/").into_bytes()
}

/// A single `alter` request: fields to add, fields to drop by name
/// (spec.md §3's schema evolution — kind changes on an existing field
/// are always rejected, enforced by `Schema::alter`).
#[derive(Debug, Clone, Default)]
pub struct AlterSpec {
    pub add_fields: Vec<FieldDefinition>,
    pub drop_fields: Vec<String>,
}

/// One collection's live state plus the durability machinery a write
/// needs to reach before it is published (spec.md §6). Cheap to clone
/// (an `Arc`), so `CollectionManager::get` can hand one out to a caller
/// without holding the manager's registry lock.
pub struct CollectionHandle {
    name: String,
    mvcc: MVCCController<CollectionState>,
    writer_slot: WriterSlot,
    wal: Mutex<Wal>,
    next_seq: AtomicU64,
}

impl CollectionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> Arc<CollectionState> {
        self.mvcc.snapshot()
    }
}

/// One query in a `CollectionManager::union` call, paired with the
/// collection it runs against.
pub struct UnionQuery {
    pub collection: String,
    pub request: SearchRequest,
}

/// The outcome of one leg of a `union` call. Each collection searches
/// independently; one collection's error never aborts the others
/// (spec.md §4.1's `union`).
pub struct UnionResult {
    pub collection: String,
    pub outcome: std::result::Result<SearchResponse, Error>,
}

/// Registry and durability coordinator for every collection a node
/// hosts (spec.md §4.1, the engine's top-level entry point). Wraps a
/// shared `KvStore` for schema/document blobs, a per-collection WAL +
/// periodic snapshot pair for crash recovery, and an `MVCCController` +
/// `WriterSlot` per collection enforcing single-writer/many-reader
/// access to its indexed state.
pub struct CollectionManager {
    storage: Arc<StorageLayout>,
    kv: Arc<dyn KvStore>,
    analyzers: Arc<AnalyzerRegistry>,
    collections: RwLock<HashMap<String, Arc<CollectionHandle>>>,
}

impl CollectionManager {
    /// Open a manager over `storage`/`kv`, recovering every collection
    /// whose schema is present in the KV store: its latest snapshot (if
    /// any) repopulates `documents`/`external_ids`, then the WAL tail
    /// recorded since that snapshot is replayed on top (spec.md §7).
    pub fn open(storage: Arc<StorageLayout>, kv: Arc<dyn KvStore>, analyzers: Arc<AnalyzerRegistry>) -> Result<Self> {
        let manager = CollectionManager { storage, kv, analyzers, collections: RwLock::new(HashMap::new()) };

        for (key, value) in manager.kv.scan(b"coll/")? {
            let key = String::from_utf8_lossy(&key);
            let Some(name) = key.strip_prefix("coll/").and_then(|rest| rest.strip_suffix("/schema")) else {
                continue;
            };
            let schema: Schema = bincode::deserialize(&value)?;
            let handle = manager.recover_collection(name, schema)?;
            manager.collections.write().insert(name.to_string(), Arc::new(handle));
            tracing::info!(collection = name, "recovered collection");
        }

        Ok(manager)
    }

    fn recover_collection(&self, name: &str, schema: Schema) -> Result<CollectionHandle> {
        let mut state = CollectionState::empty(schema);

        if let Some(blob) = self.kv.get(&snapshot_key(name))? {
            let documents: Vec<Document> = bincode::deserialize(&blob)?;
            for document in documents {
                state.external_ids.insert(document.external_id.clone(), document.id);
                state.documents.insert(document.id, document);
            }
            state.reindex_all(&self.analyzers)?;
        }

        for entry in replay(&self.storage, name)? {
            match entry.operation {
                WalOperation::AddDocument(document) | WalOperation::UpdateDocument(document) => {
                    if state.documents.contains_key(&document.id) {
                        state.remove_document(document.id);
                    }
                    state.index_document(&document, &self.analyzers, None)?;
                }
                WalOperation::DeleteDocument(doc_id) => state.remove_document(doc_id),
                WalOperation::Commit => {}
            }
        }

        let next_seq = match self.kv.get(&seq_key(name))? {
            Some(bytes) if bytes.len() == 8 => u64::from_le_bytes(bytes.try_into().unwrap()),
            _ => state.documents.keys().map(|id| id.value()).max().map_or(0, |max| max + 1),
        };

        let wal = Wal::open_with_mode(&self.storage, name, SyncMode::Batch)?;
        Ok(CollectionHandle {
            name: name.to_string(),
            mvcc: MVCCController::new(state),
            writer_slot: WriterSlot::new(),
            wal: Mutex::new(wal),
            next_seq: AtomicU64::new(next_seq),
        })
    }

    fn get_handle(&self, name: &str) -> Result<Arc<CollectionHandle>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("collection `{}` not found", name)))
    }

    /// Create a new, empty collection. Conflicts if `name` already
    /// exists.
    pub fn create(&self, name: &str, schema: Schema) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(Error::conflict(format!("collection `{}` already exists", name)));
        }

        self.storage.ensure_collection_dir(name)?;
        self.kv.put(&schema_key(name), &bincode::serialize(&schema)?)?;

        let wal = Wal::open_with_mode(&self.storage, name, SyncMode::Batch)?;
        let handle = CollectionHandle {
            name: name.to_string(),
            mvcc: MVCCController::new(CollectionState::empty(schema)),
            writer_slot: WriterSlot::new(),
            wal: Mutex::new(wal),
            next_seq: AtomicU64::new(0),
        };
        collections.insert(name.to_string(), Arc::new(handle));
        tracing::info!(collection = name, "collection created");
        Ok(())
    }

    /// Destroy a collection and every durable trace of it.
    pub fn drop(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.remove(name).is_none() {
            return Err(Error::not_found(format!("collection `{}` not found", name)));
        }
        drop(collections);

        self.kv.delete(&schema_key(name))?;
        self.kv.delete(&snapshot_key(name))?;
        self.kv.delete(&seq_key(name))?;
        for (key, _) in self.kv.scan(&doc_prefix(name))? {
            self.kv.delete(&key)?;
        }
        let _ = std::fs::remove_file(self.storage.wal_path(name));
        let _ = std::fs::remove_file(self.storage.snapshot_path(name));
        tracing::info!(collection = name, "collection dropped");
        Ok(())
    }

    /// A handle to a live collection, for direct snapshot access.
    pub fn get(&self, name: &str) -> Result<Arc<CollectionHandle>> {
        self.get_handle(name)
    }

    /// Add fields to and/or drop fields from a collection's schema
    /// in-place (spec.md §3). Added fields are back-projected onto every
    /// document that already carries a value under the new name; dropped
    /// fields have their per-field indexes torn down, but the stored
    /// document blobs are left untouched.
    pub fn alter(&self, name: &str, spec: AlterSpec) -> Result<()> {
        let handle = self.get_handle(name)?;
        let _guard = handle.writer_slot.acquire();
        let current = handle.mvcc.snapshot();

        check_alter_compatible(&current.documents, &spec.add_fields)?;

        let mut new_schema = current.schema.clone();
        new_schema.alter(spec.add_fields.clone(), spec.drop_fields.clone())?;

        let mut new_state = (*current).clone();
        for dropped in &spec.drop_fields {
            new_state.inverted.remove(dropped);
            new_state.numeric.remove(dropped);
            new_state.geo_points.remove(dropped);
            new_state.geo_polygons.remove(dropped);
        }
        new_state.schema = new_schema.clone();
        for added in &spec.add_fields {
            new_state.project_added_field(added, &self.analyzers)?;
        }

        self.kv.put(&schema_key(name), &bincode::serialize(&new_schema)?)?;
        handle.mvcc.publish(new_state);
        tracing::info!(collection = name, "collection altered");
        Ok(())
    }

    /// Insert or, when `upsert` is true and `external_id` already names a
    /// document, fully replace it (spec.md §3: "mutated only by full
    /// upsert ... which re-projects all fields"). Returns the assigned
    /// sequence id. A failed `index_document` leaves the published
    /// snapshot untouched — the clone-on-write model makes rollback free,
    /// since nothing beyond the in-progress clone was ever touched.
    pub fn add(
        &self,
        name: &str,
        external_id: Option<String>,
        raw_fields: HashMap<String, FieldValue>,
        mode: InsertMode,
        upsert: bool,
    ) -> Result<DocId> {
        let handle = self.get_handle(name)?;
        let _guard = handle.writer_slot.acquire();
        let current = handle.mvcc.snapshot();

        let fields = coerce_fields(&current.schema, raw_fields, mode)?;
        let external_id = external_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let existing = current.external_ids.get(&external_id).copied();

        if existing.is_some() && !upsert {
            return Err(Error::conflict(format!("document `{}` already exists", external_id)));
        }

        let seq = handle.next_seq.fetch_add(1, Ordering::SeqCst);
        let doc_id = DocId::new(seq);
        let mut document = Document::new(doc_id, external_id.clone());
        for (field, value) in fields {
            document.add_field(field, value);
        }

        let mut new_state = (*current).clone();
        if let Some(old_id) = existing {
            new_state.remove_document(old_id);
        }
        new_state.index_document(&document, &self.analyzers, None)?;

        let operation =
            if existing.is_some() { WalOperation::UpdateDocument(document.clone()) } else { WalOperation::AddDocument(document.clone()) };
        handle.wal.lock().append(operation)?;
        self.kv.put(&doc_key(name, seq), &bincode::serialize(&document)?)?;
        if let Some(old_id) = existing {
            self.kv.delete(&doc_key(name, old_id.value()))?;
        }

        handle.mvcc.publish(new_state);
        tracing::info!(collection = name, seq, "document indexed");
        Ok(doc_id)
    }

    /// Insert a document given as a JSON object (spec.md §6's external
    /// document input format): the `id` field, if present, becomes the
    /// external id, and every other key is coerced against the collection's
    /// schema the same way `add` coerces a typed field map.
    pub fn add_json(
        &self,
        name: &str,
        json: serde_json::Value,
        mode: InsertMode,
        upsert: bool,
    ) -> Result<DocId> {
        let handle = self.get_handle(name)?;
        let schema = handle.mvcc.snapshot().schema.clone();
        let (external_id, raw_fields) = parse_document_json(&schema, json)?;
        self.add(name, external_id, raw_fields, mode, upsert)
    }

    /// Remove a document by external id. Not-found if no such document
    /// exists.
    pub fn remove(&self, name: &str, external_id: &str) -> Result<()> {
        let handle = self.get_handle(name)?;
        let _guard = handle.writer_slot.acquire();
        let current = handle.mvcc.snapshot();

        let doc_id = current
            .external_ids
            .get(external_id)
            .copied()
            .ok_or_else(|| Error::not_found(format!("document `{}` not found", external_id)))?;

        let mut new_state = (*current).clone();
        new_state.remove_document(doc_id);

        handle.wal.lock().append(WalOperation::DeleteDocument(doc_id))?;
        self.kv.delete(&doc_key(name, doc_id.value()))?;

        handle.mvcc.publish(new_state);
        tracing::info!(collection = name, seq = doc_id.value(), "document removed");
        Ok(())
    }

    /// Run one search against a collection's current snapshot. Readers
    /// never acquire the writer slot and never block on a concurrent
    /// write (spec.md §6).
    pub fn search(&self, name: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let handle = self.get_handle(name)?;
        let snapshot = handle.snapshot();
        executor::execute(&snapshot, &self.analyzers, request)
    }

    /// Run several independent searches, one per named collection
    /// (spec.md §4.1's `union`). One collection's failure is reported
    /// alongside the others' successes rather than aborting the batch.
    pub fn union(&self, queries: Vec<UnionQuery>) -> Vec<UnionResult> {
        queries
            .into_iter()
            .map(|q| {
                let outcome = self.search(&q.collection, &q.request);
                UnionResult { collection: q.collection, outcome }
            })
            .collect()
    }

    /// Make the collection's current state durable as a standalone
    /// snapshot and truncate its WAL, so the next recovery can skip
    /// straight to replaying only what happens afterward (spec.md §4.1).
    pub fn flush(&self, name: &str) -> Result<()> {
        let handle = self.get_handle(name)?;
        let _guard = handle.writer_slot.acquire();
        let snapshot = handle.mvcc.snapshot();

        let documents: Vec<&Document> = snapshot.documents.values().collect();
        self.kv.put(&snapshot_key(name), &bincode::serialize(&documents)?)?;
        self.kv.put(&seq_key(name), &handle.next_seq.load(Ordering::SeqCst).to_le_bytes())?;

        let mut wal = handle.wal.lock();
        wal.reset(&self.storage, name)?;
        tracing::info!(collection = name, documents = documents.len() as u64, "collection flushed");
        Ok(())
    }

    /// `flush`, plus an explicit fsync of the (already-empty) WAL file —
    /// the teacher's distinction between "durable" and "durable and
    /// acknowledged" collapses here since every append already syncs per
    /// its `SyncMode` (spec.md §4.1).
    pub fn commit(&self, name: &str) -> Result<()> {
        self.flush(name)?;
        let handle = self.get_handle(name)?;
        handle.wal.lock().sync()
    }

    /// Re-run recovery for every collection currently registered,
    /// discarding in-memory state and rebuilding it from the durable
    /// snapshot + WAL (spec.md §4.1, §7).
    pub fn recover(&self) -> Result<()> {
        let names: Vec<String> = self.collections.read().keys().cloned().collect();
        for name in names {
            let schema_blob = self
                .kv
                .get(&schema_key(&name))?
                .ok_or_else(|| Error::not_found(format!("collection `{}` has no durable schema", name)))?;
            let schema: Schema = bincode::deserialize(&schema_blob)?;
            let handle = self.recover_collection(&name, schema)?;
            self.collections.write().insert(name.clone(), Arc::new(handle));
            tracing::info!(collection = %name, "collection recovered");
        }
        Ok(())
    }

    pub fn stats(&self, name: &str) -> Result<CollectionStats> {
        let handle = self.get_handle(name)?;
        let snapshot = handle.snapshot();
        Ok(CollectionStats {
            uptime_secs: 0,
            start_time: SystemTime::now(),
            total_documents: snapshot.doc_count(),
            deleted_documents: 0,
            index_size_bytes: 0,
            store_size_bytes: 0,
            queries_per_second: 0.0,
            writes_per_second: 0.0,
            last_flush_time: None,
            last_commit_time: None,
        })
    }

    /// A coarse health snapshot of the node: whether the KV store is
    /// reachable, and document counts for every registered collection.
    pub fn health_check(&self) -> HealthCheckResult {
        let started = std::time::Instant::now();
        let kv_check = match self.kv.get(b"__health__") {
            Ok(_) => HealthCheck {
                name: "kv_store".to_string(),
                status: HealthStatus::Healthy,
                message: None,
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Err(err) => HealthCheck {
                name: "kv_store".to_string(),
                status: HealthStatus::Unhealthy(err.to_string()),
                message: Some(err.to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        };

        let mut checks = vec![kv_check];
        for (name, handle) in self.collections.read().iter() {
            let started = std::time::Instant::now();
            let count = handle.snapshot().doc_count();
            checks.push(HealthCheck {
                name: format!("collection:{name}"),
                status: HealthStatus::Healthy,
                message: Some(format!("{count} documents")),
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }

        let status = if checks.iter().all(|c| c.status.is_healthy()) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded("one or more checks failed".to_string())
        };

        HealthCheckResult { status, checks, timestamp: SystemTime::now() }
    }

    /// Flush every collection and consume the manager. Called at
    /// shutdown so no acknowledged write is left only in the WAL
    /// (spec.md §9).
    pub fn dispose(self) -> Result<()> {
        let names: Vec<String> = self.collections.read().keys().cloned().collect();
        for name in &names {
            self.flush(name)?;
        }
        tracing::info!(collections = names.len(), "collection manager disposed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::store::mem_kv::MemKvStore;

    fn manager() -> (tempfile::TempDir, CollectionManager) {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Arc::new(StorageLayout::new(tmp.path().to_path_buf()).unwrap());
        let kv: Arc<dyn KvStore> = Arc::new(MemKvStore::new());
        let analyzers = Arc::new(AnalyzerRegistry::new());
        let manager = CollectionManager::open(storage, kv, analyzers).unwrap();
        (tmp, manager)
    }

    fn books_schema() -> Schema {
        Schema::new()
            .add_field(FieldDefinition::new("title", FieldType::String))
            .unwrap()
            .add_field(FieldDefinition::new("year", FieldType::Int32).sortable())
            .unwrap()
    }

    #[test]
    fn create_then_add_then_search_round_trips() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("red car".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(2020));
        manager.add("books", Some("1".to_string()), fields, InsertMode::Reject, false).unwrap();

        let mut request = SearchRequest::default();
        request.query = "car".to_string();
        request.query_by = vec![crate::search::executor::FieldSpec::new("title")];
        let response = manager.search("books", &request).unwrap();
        assert_eq!(response.found, 1);
    }

    #[test]
    fn add_rejects_duplicate_external_id_without_upsert() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("a".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(2000));
        manager.add("books", Some("1".to_string()), fields.clone(), InsertMode::Reject, false).unwrap();

        let err = manager.add("books", Some("1".to_string()), fields, InsertMode::Reject, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn upsert_replaces_existing_document_in_place() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("old title".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(1999));
        manager.add("books", Some("1".to_string()), fields, InsertMode::Reject, false).unwrap();

        let mut updated = HashMap::new();
        updated.insert("title".to_string(), FieldValue::Text("new title".to_string()));
        updated.insert("year".to_string(), FieldValue::Int32(2024));
        manager.add("books", Some("1".to_string()), updated, InsertMode::Reject, true).unwrap();

        let mut request = SearchRequest::default();
        request.query = "old".to_string();
        request.query_by = vec![crate::search::executor::FieldSpec::new("title")];
        let response = manager.search("books", &request).unwrap();
        assert_eq!(response.found, 0);
    }

    #[test]
    fn remove_then_search_no_longer_finds_document() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("red car".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(2020));
        manager.add("books", Some("1".to_string()), fields, InsertMode::Reject, false).unwrap();
        manager.remove("books", "1").unwrap();

        let stats = manager.stats("books").unwrap();
        assert_eq!(stats.total_documents, 0);
    }

    #[test]
    fn alter_adds_field_and_projects_it_onto_existing_documents() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("red car".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(2020));
        fields.insert("rating".to_string(), FieldValue::Float(4.5));
        manager.add("books", Some("1".to_string()), fields, InsertMode::CoerceOrDrop, false).unwrap();

        manager
            .alter("books", AlterSpec { add_fields: vec![FieldDefinition::new("rating", FieldType::Float).sortable()], drop_fields: vec![] })
            .unwrap();

        let handle = manager.get("books").unwrap();
        assert!(handle.snapshot().numeric.contains_key("rating"));
    }

    #[test]
    fn flush_then_recover_restores_documents_without_wal_replay() {
        let (tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();

        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::Text("red car".to_string()));
        fields.insert("year".to_string(), FieldValue::Int32(2020));
        manager.add("books", Some("1".to_string()), fields, InsertMode::Reject, false).unwrap();
        manager.flush("books").unwrap();

        let storage = Arc::new(StorageLayout::new(tmp.path().to_path_buf()).unwrap());
        let reopened = CollectionManager::open(storage, manager_kv(&manager), Arc::new(AnalyzerRegistry::new())).unwrap();
        let stats = reopened.stats("books").unwrap();
        assert_eq!(stats.total_documents, 1);
    }

    fn manager_kv(manager: &CollectionManager) -> Arc<dyn KvStore> {
        manager.kv.clone()
    }

    #[test]
    fn drop_removes_collection_and_its_durable_state() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();
        manager.drop("books").unwrap();
        assert_eq!(manager.get("books").unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn health_check_reports_healthy_kv_store() {
        let (_tmp, manager) = manager();
        manager.create("books", books_schema()).unwrap();
        let result = manager.health_check();
        assert!(result.status.is_healthy());
    }
}
