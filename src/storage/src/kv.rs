// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The concrete transactional key/value store backing the engine. spec.md
//! treats this as an external FoundationDB-like collaborator; this crate
//! fills that role with `sled`, an embedded store that already gives us
//! sorted byte keys, range scans, and atomic batched commits.

use std::ops::Bound;
use std::path::Path;

use relkv_common::{Error, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, IVec, Transactional};

/// A handle to the backing store. Cheaply `Clone`-able (an `Arc` internally,
/// like sled's own `Db`), so one handle is shared across all session tasks.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    catalog: sled::Tree,
    data: sled::Tree,
}

/// One pending key/value mutation, collected before being committed as a
/// single atomic batch.
pub enum Write {
    Set(Vec<u8>, Vec<u8>),
    Clear(Vec<u8>),
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(|e| Error::KvTransaction(e.to_string()))?;
        let catalog = db
            .open_tree("catalog")
            .map_err(|e| Error::KvTransaction(e.to_string()))?;
        let data = db
            .open_tree("data")
            .map_err(|e| Error::KvTransaction(e.to_string()))?;
        Ok(Self { db, catalog, data })
    }

    /// Clears the entire keyspace in one transaction, per the `--reset` flag.
    ///
    /// `TransactionalTree` has no bulk-clear primitive, so the keys are first
    /// collected with an ordinary scan and then removed inside a single
    /// `(catalog, data)` transaction, keeping the two subspaces consistent
    /// with each other even if the process dies partway through.
    pub fn reset(&self) -> Result<()> {
        let catalog_keys: Vec<IVec> = self.catalog.iter().keys().filter_map(|r| r.ok()).collect();
        let data_keys: Vec<IVec> = self.data.iter().keys().filter_map(|r| r.ok()).collect();

        (&self.catalog, &self.data)
            .transaction(|(catalog, data)| {
                for k in &catalog_keys {
                    catalog.remove(k.as_ref())?;
                }
                for k in &data_keys {
                    data.remove(k.as_ref())?;
                }
                Ok::<(), ConflictableTransactionError>(())
            })
            .map_err(|e: TransactionError| Error::KvTransaction(e.to_string()))?;

        self.db
            .flush()
            .map_err(|e| Error::KvTransaction(e.to_string()))?;
        Ok(())
    }

    pub fn catalog_get(&self, key: &[u8]) -> Result<Option<IVec>> {
        self.catalog
            .get(key)
            .map_err(|e| Error::KvTransaction(e.to_string()))
    }

    /// Applies a batch of writes to the catalog subspace atomically.
    pub fn catalog_commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut batch = Batch::default();
        for w in writes {
            match w {
                Write::Set(k, v) => batch.insert(k, v),
                Write::Clear(k) => batch.remove(k),
            }
        }
        self.catalog
            .apply_batch(batch)
            .map_err(|e| Error::CatalogWriteFailed(e.to_string()))
    }

    /// Applies a batch of writes to the data subspace atomically.
    pub fn data_commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut batch = Batch::default();
        for w in writes {
            match w {
                Write::Set(k, v) => batch.insert(k, v),
                Write::Clear(k) => batch.remove(k),
            }
        }
        self.data
            .apply_batch(batch)
            .map_err(|e| Error::KvTransaction(e.to_string()))
    }

    /// Scans the catalog subspace's half-open byte range in key order.
    pub fn catalog_scan(&self, start: &[u8], end: &[u8]) -> impl Iterator<Item = (IVec, IVec)> {
        self.catalog
            .range((Bound::Included(start.to_vec()), Bound::Excluded(end.to_vec())))
            .filter_map(|r| r.ok())
    }

    /// Scans the data subspace's half-open byte range in key order.
    pub fn data_scan(&self, start: &[u8], end: &[u8]) -> impl Iterator<Item = (IVec, IVec)> {
        self.data
            .range((Bound::Included(start.to_vec()), Bound::Excluded(end.to_vec())))
            .filter_map(|r| r.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn commit_is_visible_after_apply() {
        let (_dir, store) = tmp_store();
        store
            .catalog_commit(vec![Write::Set(b"a".to_vec(), b"1".to_vec())])
            .unwrap();
        assert_eq!(store.catalog_get(b"a").unwrap().unwrap().as_ref(), b"1");
    }

    #[test]
    fn scan_respects_half_open_range() {
        let (_dir, store) = tmp_store();
        store
            .data_commit(vec![
                Write::Set(b"a".to_vec(), b"1".to_vec()),
                Write::Set(b"b".to_vec(), b"2".to_vec()),
                Write::Set(b"c".to_vec(), b"3".to_vec()),
            ])
            .unwrap();
        let got: Vec<_> = store.data_scan(b"a", b"c").collect();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn reset_clears_both_subspaces() {
        let (_dir, store) = tmp_store();
        store
            .catalog_commit(vec![Write::Set(b"a".to_vec(), b"1".to_vec())])
            .unwrap();
        store
            .data_commit(vec![Write::Set(b"b".to_vec(), b"2".to_vec())])
            .unwrap();
        store.reset().unwrap();
        assert!(store.catalog_get(b"a").unwrap().is_none());
        assert_eq!(store.data_scan(b"", &[0xFF]).count(), 0);
    }
}
