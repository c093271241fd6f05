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

//! Catalog Manager (C2): create/read table definitions. A table's column
//! set is whatever a range scan of its `catalog/table/<name>/…` subprefix
//! currently returns — there is no separate in-memory cache to keep in
//! sync, matching spec.md's "read by every other operation" contract.

use relkv_common::{Error, Result};
use relkv_storage::{catalog_subspace, Store, TupleElem, Write};

/// A table's schema: its name, and parallel column name / type-token lists
/// in the order a catalog scan returns them (lexicographic by column name,
/// not declaration order — see SPEC_FULL.md §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
}

impl TableDef {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// One column as declared by CREATE TABLE, before it round-trips through
/// the catalog subspace.
pub struct ColumnDef {
    pub name: String,
    pub type_token: String,
}

/// Creates a table. A no-op (logged, not an error) if the table's existence
/// marker is already present, per spec.md §4.2.
pub fn create_table(store: &Store, name: &str, columns: &[ColumnDef]) -> Result<()> {
    let sub = catalog_subspace();
    let marker_key = sub.pack(&[TupleElem::from(name)]);

    if store.catalog_get(&marker_key)?.is_some() {
        tracing::info!(table = name, "create_table: table already exists, no-op");
        return Ok(());
    }

    let mut writes = vec![Write::Set(marker_key, Vec::new())];
    for col in columns {
        let key = sub.pack(&[TupleElem::from(name), TupleElem::from(col.name.as_str())]);
        writes.push(Write::Set(key, col.type_token.as_bytes().to_vec()));
    }
    store.catalog_commit(writes)
}

/// Reads a table's definition via a range scan of its catalog subprefix.
/// Fails with [`Error::TableUnknown`] if the scan yields no column entries.
pub fn get_table(store: &Store, name: &str) -> Result<TableDef> {
    let sub = catalog_subspace();
    let (start, end) = sub.range(&[TupleElem::from(name)]);

    let mut columns = Vec::new();
    let mut column_types = Vec::new();
    for (key, value) in store.catalog_scan(&start, &end) {
        let elems = sub
            .unpack(&key)
            .map_err(|e| Error::KvTransaction(format!("corrupt catalog key: {e}")))?;
        // The existence marker has one tuple element (just the table name);
        // only keys with a trailing column-name element are columns.
        if elems.len() < 2 {
            continue;
        }
        let TupleElem::Str(col_name) = &elems[1] else {
            continue;
        };
        columns.push(col_name.clone());
        column_types.push(String::from_utf8_lossy(&value).into_owned());
    }

    if columns.is_empty() {
        return Err(Error::TableUnknown(name.to_string()));
    }

    Ok(TableDef {
        name: name.to_string(),
        columns,
        column_types,
    })
}
