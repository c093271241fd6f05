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

//! Row Store (C3): insert, range-scan, and delete cells, kept in both a
//! row-major and a column-major layout so either SELECT algorithm (§4.4)
//! can satisfy its scan with a single range read.

use relkv_catalog::TableDef;
use relkv_common::{Error, Result};
use relkv_storage::{catalog_subspace, data_subspace, Store, TupleElem, Write};

use crate::parse::CellValue;

const ROW_LAYOUT_TAG: &str = "r";
const COLUMN_LAYOUT_TAG: &str = "c";

fn encode_value(value: &CellValue) -> Vec<u8> {
    match value {
        CellValue::Text(s) => s.as_bytes().to_vec(),
        CellValue::Int(i) => i.to_string().into_bytes(),
    }
}

fn table_exists(store: &Store, table: &str) -> Result<bool> {
    let marker = catalog_subspace().pack(&[TupleElem::from(table)]);
    Ok(store.catalog_get(&marker)?.is_some())
}

/// Inserts `rows` into `table` in one transaction. A logged no-op if the
/// table doesn't exist, per spec.md §4.3.
pub fn insert(store: &Store, table: &TableDef, rows: &[Vec<CellValue>]) -> Result<()> {
    if !table_exists(store, &table.name)? {
        tracing::info!(table = %table.name, "insert: table does not exist, no-op");
        return Ok(());
    }

    let sub = data_subspace();
    let mut writes = Vec::with_capacity(rows.len() * table.columns.len() * 2);

    for row in rows {
        if row.len() > table.columns.len() {
            return Err(Error::UnsupportedValue(format!(
                "insert has {} values but table {} has {} columns",
                row.len(),
                table.name,
                table.columns.len()
            )));
        }
        let row_id = uuid::Uuid::new_v4().to_string();
        for (idx, value) in row.iter().enumerate() {
            let col = &table.columns[idx];
            let bytes = encode_value(value);

            let row_key = sub.pack(&[
                TupleElem::from(table.name.as_str()),
                TupleElem::from(ROW_LAYOUT_TAG),
                TupleElem::from(row_id.as_str()),
                TupleElem::from(col.as_str()),
            ]);
            let col_key = sub.pack(&[
                TupleElem::from(table.name.as_str()),
                TupleElem::from(COLUMN_LAYOUT_TAG),
                TupleElem::from(col.as_str()),
                TupleElem::from(row_id.as_str()),
            ]);
            writes.push(Write::Set(row_key, bytes.clone()));
            writes.push(Write::Set(col_key, bytes));
        }
    }

    store.data_commit(writes)
}

/// One decoded cell, as yielded by a row- or column-layout scan.
pub struct Cell {
    pub row_id: String,
    pub column: String,
    pub value: Vec<u8>,
}

/// Range-scans the row-layout subspace: cells ordered by row id, then by
/// column name within a row.
pub fn scan_row_layout(store: &Store, table: &str) -> Result<Vec<Cell>> {
    let sub = data_subspace();
    let (start, end) = sub.range(&[TupleElem::from(table), TupleElem::from(ROW_LAYOUT_TAG)]);
    let mut cells = Vec::new();
    for (key, value) in store.data_scan(&start, &end) {
        let elems = sub
            .unpack(&key)
            .map_err(|e| Error::KvTransaction(format!("corrupt row-layout key: {e}")))?;
        let [_, _, TupleElem::Str(row_id), TupleElem::Str(column)] = elems.as_slice() else {
            return Err(Error::KvTransaction("malformed row-layout key".to_string()));
        };
        cells.push(Cell {
            row_id: row_id.clone(),
            column: column.clone(),
            value: value.to_vec(),
        });
    }
    Ok(cells)
}

/// Range-scans the column-layout subspace: cells ordered by column name,
/// then by row id within a column.
pub fn scan_column_layout(store: &Store, table: &str) -> Result<Vec<Cell>> {
    let sub = data_subspace();
    let (start, end) = sub.range(&[TupleElem::from(table), TupleElem::from(COLUMN_LAYOUT_TAG)]);
    let mut cells = Vec::new();
    for (key, value) in store.data_scan(&start, &end) {
        let elems = sub
            .unpack(&key)
            .map_err(|e| Error::KvTransaction(format!("corrupt column-layout key: {e}")))?;
        let [_, _, TupleElem::Str(column), TupleElem::Str(row_id)] = elems.as_slice() else {
            return Err(Error::KvTransaction(
                "malformed column-layout key".to_string(),
            ));
        };
        cells.push(Cell {
            row_id: row_id.clone(),
            column: column.clone(),
            value: value.to_vec(),
        });
    }
    Ok(cells)
}

/// Clears every cell (both layouts) belonging to `table`, in one
/// transaction. A logged no-op if the table doesn't exist. Restricted to
/// the table's own subprefix — the reference implementation this engine is
/// modeled on clears the entire data subspace, which spec.md §9 flags as a
/// bug this implementation must not reproduce.
pub fn truncate(store: &Store, table: &str) -> Result<()> {
    if !table_exists(store, table)? {
        tracing::info!(table, "delete: table does not exist, no-op");
        return Ok(());
    }

    let sub = data_subspace();
    let (start, end) = sub.range(&[TupleElem::from(table)]);
    let writes: Vec<Write> = store
        .data_scan(&start, &end)
        .map(|(key, _)| Write::Clear(key.to_vec()))
        .collect();
    store.data_commit(writes)
}
