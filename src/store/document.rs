use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::backend::{validate_key, Backend, DirBackend};
use super::StoreError;

/// A document that can live in a [`DocumentStore`].
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Label used in error messages ("config", "specific config").
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Checks performed before a document is created.
    fn validate(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A document together with the backend key it is persisted under.
///
/// The key equals the document ID for everything this store writes; files
/// created by hand may use a different name and keep it.
#[derive(Debug, Clone)]
struct Entry<D> {
    key: String,
    doc: D,
}

/// Authoritative ID → document map mirrored to a [`Backend`].
///
/// A single mutex guards the map and every backend call made on its behalf.
pub struct DocumentStore<D, B = DirBackend> {
    backend: B,
    docs: Mutex<HashMap<String, Entry<D>>>,
}

impl<D: Document> DocumentStore<D, DirBackend> {
    /// Opens a store over a directory of YAML files and loads it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::load(DirBackend::new(dir))
    }
}

impl<D: Document, B: Backend> DocumentStore<D, B> {
    /// Creates a store over `backend` and loads everything it holds.
    pub fn load(backend: B) -> Result<Self, StoreError> {
        let store = Self {
            backend,
            docs: Mutex::new(HashMap::new()),
        };
        store.load_all()?;
        Ok(store)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Entry<D>>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the in-memory map with the backend's contents.
    ///
    /// On failure the previous contents are kept. Returns the number of
    /// documents loaded.
    pub fn load_all(&self) -> Result<usize, StoreError> {
        let mut docs = self.guard();
        let loaded = self.read_backend()?;
        let count = loaded.len();
        *docs = loaded;
        Ok(count)
    }

    fn read_backend(&self) -> Result<HashMap<String, Entry<D>>, StoreError> {
        let mut docs: HashMap<String, Entry<D>> = HashMap::new();

        for key in self.backend.list()? {
            let Some(bytes) = self.backend.get(&key)? else {
                continue;
            };
            let location = self.backend.location(&key);

            let doc: D = serde_yaml::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                location: location.clone(),
                message: e.to_string(),
            })?;

            if let Err(e) = validate_key(doc.id()) {
                return Err(StoreError::Corrupt {
                    location,
                    message: e.to_string(),
                });
            }

            if let Some(existing) = docs.get(doc.id()) {
                return Err(StoreError::Corrupt {
                    message: format!(
                        "duplicate ID '{}' already defined in {}",
                        doc.id(),
                        self.backend.location(&existing.key)
                    ),
                    location,
                });
            }

            docs.insert(doc.id().to_string(), Entry { key, doc });
        }

        Ok(docs)
    }

    /// Returns every document, in no particular order.
    pub fn get_all(&self) -> Vec<D> {
        self.guard().values().map(|e| e.doc.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Result<D, StoreError> {
        self.guard()
            .get(id)
            .map(|e| e.doc.clone())
            .ok_or_else(|| not_found::<D>(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guard().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Runs `f` over all documents while holding the store lock.
    pub fn scan<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &D>) -> R) -> R {
        let docs = self.guard();
        let mut iter = docs.values().map(|e| &e.doc);
        f(&mut iter)
    }

    /// Persists a new document, then inserts it.
    ///
    /// Fails with `Conflict` if the ID (or a file of that name) is taken.
    /// Nothing is inserted if the backend write fails.
    pub fn add(&self, doc: D) -> Result<D, StoreError> {
        validate_key(doc.id())?;
        doc.validate()?;

        let mut docs = self.guard();

        if docs.contains_key(doc.id()) || docs.values().any(|e| e.key == doc.id()) {
            return Err(StoreError::Conflict {
                kind: D::KIND,
                id: doc.id().to_string(),
            });
        }

        let yaml = serde_yaml::to_string(&doc)?;
        self.backend.put(doc.id(), yaml.as_bytes())?;

        let id = doc.id().to_string();
        docs.insert(
            id.clone(),
            Entry {
                key: id,
                doc: doc.clone(),
            },
        );
        Ok(doc)
    }

    /// Replaces the document stored under `id`.
    ///
    /// An empty embedded ID is filled in from `id`; a different non-empty
    /// one is rejected so the map key, file and content always agree.
    pub fn update(&self, id: &str, mut doc: D) -> Result<D, StoreError> {
        let mut docs = self.guard();

        let key = match docs.get(id) {
            Some(entry) => entry.key.clone(),
            None => return Err(not_found::<D>(id)),
        };

        if doc.id().is_empty() {
            doc.set_id(id.to_string());
        } else if doc.id() != id {
            return Err(StoreError::Invalid(format!(
                "body ID '{}' does not match path ID '{}'",
                doc.id(),
                id
            )));
        }

        let yaml = serde_yaml::to_string(&doc)?;
        self.backend.put(&key, yaml.as_bytes())?;

        docs.insert(
            id.to_string(),
            Entry {
                key,
                doc: doc.clone(),
            },
        );
        Ok(doc)
    }

    /// Removes the backend entry for `id`, then the in-memory entry.
    ///
    /// If the backend delete fails the document stays in memory.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut docs = self.guard();

        let key = match docs.get(id) {
            Some(entry) => entry.key.clone(),
            None => return Err(not_found::<D>(id)),
        };

        self.backend.delete(&key)?;
        docs.remove(id);
        Ok(())
    }
}

fn not_found<D: Document>(id: &str) -> StoreError {
    StoreError::NotFound {
        kind: D::KIND,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, Config, SpecificConfig};
    use crate::store::MemoryBackend;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (DocumentStore<Config>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn sample(id: &str) -> Config {
        Config::new(id).with_action(Action::new("remove").with_selector(".ad"))
    }

    fn files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Memory backend whose writes and deletes can be made to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_put: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl FlakyBackend {
        fn failure(&self, key: &str) -> StoreError {
            StoreError::io(self.location(key), io::Error::other("disk full"))
        }
    }

    impl Backend for FlakyBackend {
        fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(self.failure(key));
            }
            self.inner.put(key, bytes)
        }

        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(self.failure(key));
            }
            self.inner.delete(key)
        }

        fn list(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list()
        }

        fn location(&self, key: &str) -> String {
            self.inner.location(key)
        }
    }

    #[test]
    fn test_add_and_get_roundtrip() {
        let (store, temp) = setup();

        let stored = store.add(sample("cfg1")).unwrap();

        assert_eq!(stored, sample("cfg1"));
        assert_eq!(store.get("cfg1").unwrap(), sample("cfg1"));
        assert_eq!(files(&temp), vec!["cfg1.yaml"]);
    }

    #[test]
    fn test_roundtrip_survives_reload() {
        let (store, temp) = setup();
        store.add(sample("cfg1")).unwrap();
        drop(store);

        let reopened: DocumentStore<Config> = DocumentStore::open(temp.path()).unwrap();
        assert_eq!(reopened.get("cfg1").unwrap(), sample("cfg1"));
    }

    #[test]
    fn test_specific_roundtrip_survives_reload() {
        let temp = TempDir::new().unwrap();
        let routing = SpecificConfig::new("routing")
            .with_host("example.com", ["cfg1"])
            .with_url("/checkout", ["cfg3", "cfg2"]);

        let store: DocumentStore<SpecificConfig> = DocumentStore::open(temp.path()).unwrap();
        store.add(routing.clone()).unwrap();
        drop(store);

        let reopened: DocumentStore<SpecificConfig> = DocumentStore::open(temp.path()).unwrap();
        assert_eq!(reopened.get("routing").unwrap(), routing);
        assert_eq!(files(&temp), vec!["routing.yaml"]);
    }

    #[test]
    fn test_load_tolerates_null_and_numeric_ids() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("legacy.yaml"),
            "id: legacy\ndatasource:\n  hosts:\n    a.com:\n  pages:\n    home: 7\n",
        )
        .unwrap();

        let store: DocumentStore<SpecificConfig> = DocumentStore::open(temp.path()).unwrap();

        let expected = SpecificConfig::new("legacy")
            .with_host("a.com", Vec::<String>::new())
            .with_page("home", ["7"]);
        assert_eq!(store.get("legacy").unwrap(), expected);
    }

    #[test]
    fn test_load_is_idempotent() {
        let (store, _temp) = setup();
        store.add(sample("a")).unwrap();
        store.add(sample("b")).unwrap();

        let mut first = store.get_all();
        store.load_all().unwrap();
        let mut second = store.get_all();

        first.sort_by(|x, y| x.id.cmp(&y.id));
        second.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_keys_by_embedded_id() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("legacy.yaml"), "id: cfg7\nactions: []\n").unwrap();

        let store: DocumentStore<Config> = DocumentStore::open(temp.path()).unwrap();

        assert!(store.contains("cfg7"));
        assert!(!store.contains("legacy"));
    }

    #[test]
    fn test_legacy_file_updated_and_deleted_in_place() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("legacy.yaml"), "id: cfg7\n").unwrap();
        let store: DocumentStore<Config> = DocumentStore::open(temp.path()).unwrap();

        store.update("cfg7", sample("cfg7")).unwrap();
        assert_eq!(files(&temp), vec!["legacy.yaml"]);

        store.delete("cfg7").unwrap();
        assert!(files(&temp).is_empty());
    }

    #[test]
    fn test_add_over_legacy_file_name_conflicts() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("legacy.yaml"), "id: cfg7\n").unwrap();
        let store: DocumentStore<Config> = DocumentStore::open(temp.path()).unwrap();

        let result = store.add(sample("legacy"));
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_load_malformed_file_names_it() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("good.yaml"), "id: good\n").unwrap();
        std::fs::write(temp.path().join("bad.yaml"), "id: [unclosed\n").unwrap();

        let err = DocumentStore::<Config>::open(temp.path()).err().unwrap();

        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.yaml"), "id: same\n").unwrap();
        std::fs::write(temp.path().join("b.yaml"), "id: same\n").unwrap();

        let err = DocumentStore::<Config>::open(temp.path()).err().unwrap();
        assert!(err.to_string().contains("duplicate ID 'same'"));
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let result = DocumentStore::<Config>::open(temp.path().join("missing"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_failed_reload_keeps_previous_contents() {
        let (store, temp) = setup();
        store.add(sample("cfg1")).unwrap();
        std::fs::write(temp.path().join("broken.yaml"), "actions: {").unwrap();

        assert!(store.load_all().is_err());
        assert!(store.contains("cfg1"));
    }

    #[test]
    fn test_add_conflict_leaves_existing() {
        let (store, _temp) = setup();
        store.add(sample("cfg1")).unwrap();

        let replacement = Config::new("cfg1").with_action(Action::new("insert"));
        let result = store.add(replacement);

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(store.get("cfg1").unwrap(), sample("cfg1"));
    }

    #[test]
    fn test_add_rejects_unsafe_id() {
        let (store, temp) = setup();

        let result = store.add(sample("../escape"));

        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(files(&temp).is_empty());
    }

    #[test]
    fn test_add_runs_document_validation() {
        let temp = TempDir::new().unwrap();
        let store: DocumentStore<SpecificConfig> = DocumentStore::open(temp.path()).unwrap();

        let result = store.add(SpecificConfig::new("empty"));

        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_write_failure_not_inserted() {
        let store: DocumentStore<Config, FlakyBackend> =
            DocumentStore::load(FlakyBackend::default()).unwrap();
        store.backend().fail_put.store(true, Ordering::SeqCst);

        let result = store.add(sample("cfg1"));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(!store.contains("cfg1"));
    }

    #[test]
    fn test_get_missing() {
        let (store, _temp) = setup();
        let err = store.get("nope").unwrap_err();
        assert_eq!(err.to_string(), "config 'nope' not found");
    }

    #[test]
    fn test_update_replaces_document() {
        let (store, temp) = setup();
        store.add(sample("cfg1")).unwrap();

        let replacement = Config::new("cfg1").with_action(Action::new("alter"));
        store.update("cfg1", replacement.clone()).unwrap();

        assert_eq!(store.get("cfg1").unwrap(), replacement);
        let on_disk = std::fs::read_to_string(temp.path().join("cfg1.yaml")).unwrap();
        assert!(on_disk.contains("alter"));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (store, temp) = setup();

        let result = store.update("nope", sample("nope"));

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(files(&temp).is_empty());
    }

    #[test]
    fn test_update_fills_empty_body_id() {
        let (store, _temp) = setup();
        store.add(sample("cfg1")).unwrap();

        let stored = store.update("cfg1", Config::new("")).unwrap();

        assert_eq!(stored.id, "cfg1");
        assert_eq!(store.get("cfg1").unwrap().id, "cfg1");
    }

    #[test]
    fn test_update_rejects_mismatched_body_id() {
        let (store, _temp) = setup();
        store.add(sample("cfg1")).unwrap();

        let result = store.update("cfg1", sample("cfg2"));

        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert_eq!(store.get("cfg1").unwrap(), sample("cfg1"));
    }

    #[test]
    fn test_update_write_failure_keeps_old() {
        let store: DocumentStore<Config, FlakyBackend> =
            DocumentStore::load(FlakyBackend::default()).unwrap();
        store.add(sample("cfg1")).unwrap();
        store.backend().fail_put.store(true, Ordering::SeqCst);

        assert!(store.update("cfg1", Config::new("cfg1")).is_err());
        assert_eq!(store.get("cfg1").unwrap(), sample("cfg1"));
    }

    #[test]
    fn test_delete_removes_file_and_entry() {
        let (store, temp) = setup();
        store.add(sample("cfg1")).unwrap();

        store.delete("cfg1").unwrap();

        assert!(!store.contains("cfg1"));
        assert!(files(&temp).is_empty());
    }

    #[test]
    fn test_delete_missing_leaves_directory_unchanged() {
        let (store, temp) = setup();
        store.add(sample("other")).unwrap();
        let before = files(&temp);

        let result = store.delete("cfg1");

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(files(&temp), before);
    }

    #[test]
    fn test_delete_failure_keeps_entry() {
        let store: DocumentStore<Config, FlakyBackend> =
            DocumentStore::load(FlakyBackend::default()).unwrap();
        store.add(sample("cfg1")).unwrap();
        store.backend().fail_delete.store(true, Ordering::SeqCst);

        assert!(store.delete("cfg1").is_err());
        assert!(store.contains("cfg1"));
    }

    #[test]
    fn test_concurrent_add_same_id() {
        let (store, temp) = setup();
        let store = Arc::new(store);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let doc = Config::new("race").with_action(Action::new(format!("w{}", i)));
                    barrier.wait();
                    store.add(doc)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(StoreError::Conflict { .. })))
                .count(),
            1
        );
        assert_eq!(files(&temp), vec!["race.yaml"]);
    }

    #[test]
    fn test_scan_sees_all_documents() {
        let (store, _temp) = setup();
        store.add(sample("a")).unwrap();
        store.add(sample("b")).unwrap();

        let mut ids = store.scan(|docs| docs.map(|d| d.id.clone()).collect::<Vec<_>>());
        ids.sort();

        assert_eq!(ids, vec!["a", "b"]);
    }
}
