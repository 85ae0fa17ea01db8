//! The metadata store contract over the RocksDB backend

use crate::backend::{cf_names, uniq_key, Backend};
use crate::document::Document;
use crate::filter::{lookup, value_cmp, Filter, FindOptions};
use annotarium_core::{AnnotariumError, AnnotariumResult};
use rocksdb::{IteratorMode, WriteBatch};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Atomic field mutations applied by [`MetadataStore::modify`].
#[derive(Debug, Clone)]
pub enum Modify {
    /// Set a top-level or dotted field to a value
    Set(String, Value),
    /// Insert a value into an array field, skipping if already present
    AddToSet(String, Value),
}

/// Document store with per-collection column families and unique indexes.
///
/// Writers serialize on an internal lock; readers hit RocksDB directly and
/// see only fully committed batches.
pub struct MetadataStore {
    backend: Backend,
    write_lock: Mutex<()>,
}

impl MetadataStore {
    pub fn open(path: &Path) -> AnnotariumResult<Self> {
        Ok(Self {
            backend: Backend::open(path)?,
            write_lock: Mutex::new(()),
        })
    }

    /// Insert a batch all-or-nothing. Any primary-key or unique-field
    /// conflict (with stored documents or within the batch) fails the whole
    /// batch with `AlreadyExists` and writes nothing.
    pub fn insert_many<T: Document>(&self, docs: &[T]) -> AnnotariumResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let _guard = self.lock();
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        let uniq = self.backend.cf_handle(cf_names::UNIQ)?;

        let mut batch = WriteBatch::default();
        let mut batch_ids = std::collections::HashSet::new();
        let mut batch_uniques = std::collections::HashSet::new();

        for doc in docs {
            let id = doc.id();
            if self.backend.db.get_cf(&cf, id.as_bytes())?.is_some() || !batch_ids.insert(id.clone())
            {
                return Err(AnnotariumError::AlreadyExists(format!(
                    "{}: {}",
                    T::COLLECTION,
                    id
                )));
            }
            for (field, value) in doc.unique_keys() {
                let key = uniq_key(T::COLLECTION, field, &value);
                if self.backend.db.get_cf(&uniq, &key)?.is_some()
                    || !batch_uniques.insert(key.clone())
                {
                    return Err(AnnotariumError::AlreadyExists(format!(
                        "{}.{}: {}",
                        T::COLLECTION,
                        field,
                        value
                    )));
                }
                batch.put_cf(&uniq, key, id.as_bytes());
            }
            batch.put_cf(&cf, id.as_bytes(), serde_json::to_vec(doc)?);
        }

        self.backend
            .db
            .write(batch)
            .map_err(|e| AnnotariumError::Store(e.to_string()))?;
        debug!(collection = T::COLLECTION, count = docs.len(), "inserted batch");
        Ok(())
    }

    /// Insert or replace one document, releasing any unique keys held by the
    /// previous version.
    pub fn upsert<T: Document>(&self, doc: &T) -> AnnotariumResult<()> {
        let _guard = self.lock();
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        let uniq = self.backend.cf_handle(cf_names::UNIQ)?;
        let id = doc.id();

        let mut batch = WriteBatch::default();
        if let Some(raw) = self.backend.db.get_cf(&cf, id.as_bytes())? {
            let previous: T = serde_json::from_slice(&raw)?;
            for (field, value) in previous.unique_keys() {
                batch.delete_cf(&uniq, uniq_key(T::COLLECTION, field, &value));
            }
        }
        for (field, value) in doc.unique_keys() {
            let key = uniq_key(T::COLLECTION, field, &value);
            if let Some(owner) = self.backend.db.get_cf(&uniq, &key)? {
                if owner.as_slice() != id.as_bytes() {
                    return Err(AnnotariumError::AlreadyExists(format!(
                        "{}.{}: {}",
                        T::COLLECTION,
                        field,
                        value
                    )));
                }
            }
            batch.put_cf(&uniq, key, id.as_bytes());
        }
        batch.put_cf(&cf, id.as_bytes(), serde_json::to_vec(doc)?);
        self.backend
            .db
            .write(batch)
            .map_err(|e| AnnotariumError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn get<T: Document>(&self, id: &str) -> AnnotariumResult<Option<T>> {
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        match self.backend.db.get_cf(&cf, id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Look up the owner of a unique field value without scanning.
    pub fn find_by_unique<T: Document>(
        &self,
        field: &str,
        value: &str,
    ) -> AnnotariumResult<Option<T>> {
        let uniq = self.backend.cf_handle(cf_names::UNIQ)?;
        let key = uniq_key(T::COLLECTION, field, value);
        match self.backend.db.get_cf(&uniq, &key)? {
            Some(id) => self.get(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn find<T: Document>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> AnnotariumResult<Vec<T>> {
        let values = self.find_values::<T>(filter, options)?;
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }

    /// Filtered documents as raw JSON values, sorted and paginated.
    pub fn find_values<T: Document>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> AnnotariumResult<Vec<Value>> {
        let mut matches: Vec<Value> = Vec::new();
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                matches.push(value);
            }
            Ok(())
        })?;

        if let Some(field) = &options.sort_by {
            matches.sort_by(|a, b| {
                let ordering = value_cmp(
                    lookup(a, field).unwrap_or(&Value::Null),
                    lookup(b, field).unwrap_or(&Value::Null),
                );
                if options.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let skipped = matches.into_iter().skip(options.skip);
        Ok(match options.limit {
            Some(limit) => skipped.take(limit).collect(),
            None => skipped.collect(),
        })
    }

    pub fn count<T: Document>(&self, filter: &Filter) -> AnnotariumResult<u64> {
        let mut count = 0u64;
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                count += 1;
            }
            Ok(())
        })?;
        Ok(count)
    }

    /// Scalar projection of one field across a query.
    pub fn project_field<T: Document>(
        &self,
        filter: &Filter,
        field: &str,
    ) -> AnnotariumResult<Vec<Value>> {
        let mut out = Vec::new();
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                out.push(lookup(&value, field).cloned().unwrap_or(Value::Null));
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Multi-field projection across a query, one row per matching document.
    pub fn project_fields<T: Document>(
        &self,
        filter: &Filter,
        fields: &[&str],
    ) -> AnnotariumResult<Vec<Vec<Value>>> {
        let mut out = Vec::new();
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                out.push(
                    fields
                        .iter()
                        .map(|f| lookup(&value, f).cloned().unwrap_or(Value::Null))
                        .collect(),
                );
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Categorical counting: group matching documents by a field's string
    /// form and count each group.
    pub fn count_by<T: Document>(
        &self,
        filter: &Filter,
        field: &str,
    ) -> AnnotariumResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                if let Some(group) = lookup(&value, field) {
                    *counts.entry(value_to_key(group)).or_insert(0) += 1;
                }
            }
            Ok(())
        })?;
        Ok(counts)
    }

    /// Group-by-max: the maximum of `value_field` per `group_field` group.
    pub fn group_max<T: Document>(
        &self,
        filter: &Filter,
        group_field: &str,
        value_field: &str,
    ) -> AnnotariumResult<BTreeMap<String, Value>> {
        let mut maxima: BTreeMap<String, Value> = BTreeMap::new();
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                if let (Some(group), Some(v)) =
                    (lookup(&value, group_field), lookup(&value, value_field))
                {
                    let key = value_to_key(group);
                    match maxima.get(&key) {
                        Some(current) if value_cmp(v, current).is_le() => {}
                        _ => {
                            maxima.insert(key, v.clone());
                        }
                    }
                }
            }
            Ok(())
        })?;
        Ok(maxima)
    }

    /// Apply set / add-to-set mutations to one document atomically.
    pub fn modify<T: Document>(&self, id: &str, mutations: &[Modify]) -> AnnotariumResult<()> {
        let _guard = self.lock();
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        let raw = self
            .backend
            .db
            .get_cf(&cf, id.as_bytes())?
            .ok_or_else(|| AnnotariumError::NotFound(format!("{}: {}", T::COLLECTION, id)))?;
        let mut value: Value = serde_json::from_slice(&raw)?;

        for mutation in mutations {
            match mutation {
                Modify::Set(path, new_value) => set_path(&mut value, path, new_value.clone()),
                Modify::AddToSet(path, member) => {
                    let slot = lookup_mut(&mut value, path);
                    match slot {
                        Some(Value::Array(items)) => {
                            if !items.contains(member) {
                                items.push(member.clone());
                            }
                        }
                        Some(other) => {
                            *other = Value::Array(vec![member.clone()]);
                        }
                        None => set_path(&mut value, path, Value::Array(vec![member.clone()])),
                    }
                }
            }
        }

        // round-trip through the typed document so schema drift fails loudly
        let doc: T = serde_json::from_value(value)?;
        self.backend
            .db
            .put_cf(&cf, id.as_bytes(), serde_json::to_vec(&doc)?)
            .map_err(|e| AnnotariumError::Store(e.to_string()))?;
        Ok(())
    }

    /// Delete matching documents and their unique-index entries. Returns the
    /// number deleted.
    pub fn delete_where<T: Document>(&self, filter: &Filter) -> AnnotariumResult<u64> {
        let _guard = self.lock();
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        let uniq = self.backend.cf_handle(cf_names::UNIQ)?;

        let mut batch = WriteBatch::default();
        let mut deleted = 0u64;
        self.for_each_value::<T>(|value| {
            if filter.matches(&value) {
                let doc: T = serde_json::from_value(value)?;
                for (field, unique_value) in doc.unique_keys() {
                    batch.delete_cf(&uniq, uniq_key(T::COLLECTION, field, &unique_value));
                }
                batch.delete_cf(&cf, doc.id().as_bytes());
                deleted += 1;
            }
            Ok(())
        })?;
        self.backend
            .db
            .write(batch)
            .map_err(|e| AnnotariumError::Store(e.to_string()))?;
        Ok(deleted)
    }

    pub fn delete<T: Document>(&self, id: &str) -> AnnotariumResult<bool> {
        let _guard = self.lock();
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        let uniq = self.backend.cf_handle(cf_names::UNIQ)?;
        let Some(raw) = self.backend.db.get_cf(&cf, id.as_bytes())? else {
            return Ok(false);
        };
        let doc: T = serde_json::from_slice(&raw)?;
        let mut batch = WriteBatch::default();
        for (field, value) in doc.unique_keys() {
            batch.delete_cf(&uniq, uniq_key(T::COLLECTION, field, &value));
        }
        batch.delete_cf(&cf, id.as_bytes());
        self.backend
            .db
            .write(batch)
            .map_err(|e| AnnotariumError::Store(e.to_string()))?;
        Ok(true)
    }

    fn for_each_value<T: Document>(
        &self,
        mut visit: impl FnMut(Value) -> AnnotariumResult<()>,
    ) -> AnnotariumResult<()> {
        let cf = self.backend.cf_handle(T::COLLECTION)?;
        for entry in self.backend.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, raw) = entry.map_err(|e| AnnotariumError::Store(e.to_string()))?;
            visit(serde_json::from_slice(&raw)?)?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // a poisoned lock only means a writer panicked; the data it wrote
        // is still consistent per-batch
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn set_path(doc: &mut Value, path: &str, new_value: Value) {
    let mut current = doc;
    let parts: Vec<&str> = path.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            if let Value::Object(map) = current {
                map.insert((*part).to_string(), new_value);
            }
            return;
        }
        if !current.get(*part).is_some_and(Value::is_object) {
            if let Value::Object(map) = current {
                map.insert((*part).to_string(), Value::Object(Default::default()));
            }
        }
        current = match current.get_mut(*part) {
            Some(next) => next,
            None => return,
        };
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.get_mut(part)?;
    }
    Some(current)
}
