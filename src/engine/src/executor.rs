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

//! Query Executor (C4): dispatches a lowered [`Statement`] onto the catalog
//! and row store, and assembles SELECT results into a [`PgResult`].

use relkv_catalog::{create_table as catalog_create_table, get_table, ColumnDef, TableDef};
use relkv_common::{Error, Result};
use relkv_storage::Store;

use crate::parse::{CellValue, Statement};
use crate::rowstore::{self, Cell};

/// An in-memory result set ready for wire encoding: parallel field-name and
/// field-type lists, and a rectangular array of decoded cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct PgResult {
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// What a non-SELECT statement reports back to the wire layer for its
/// CommandComplete tag (row count affected, where meaningful).
#[derive(Debug)]
pub enum Outcome {
    Created,
    Inserted,
    Deleted,
    Selected(PgResult),
}

/// Runs one statement to completion. Every write path is its own KV
/// transaction, per spec.md §5.
pub fn execute(store: &Store, stmt: Statement, columnar: bool) -> Result<Outcome> {
    match stmt {
        Statement::Create { table, columns } => {
            let defs: Vec<ColumnDef> = columns
                .into_iter()
                .map(|c| ColumnDef {
                    name: c.name,
                    type_token: c.type_token,
                })
                .collect();
            catalog_create_table(store, &table, &defs)?;
            Ok(Outcome::Created)
        }
        Statement::Insert { table, rows } => {
            let def = get_table(store, &table)?;
            rowstore::insert(store, &def, &rows)?;
            Ok(Outcome::Inserted)
        }
        Statement::Delete { table } => {
            rowstore::truncate(store, &table)?;
            Ok(Outcome::Deleted)
        }
        Statement::Select { table, columns } => {
            let def = get_table(store, &table)?;
            for target in &columns {
                def.column_index(target)
                    .ok_or_else(|| Error::ColumnUnknown(target.clone()))?;
            }
            let result = if columnar {
                select_column_layout(store, &def)?
            } else {
                select_row_layout(store, &def)?
            };
            Ok(Outcome::Selected(result))
        }
    }
}

fn decode_cell(def: &TableDef, column: &str, bytes: &[u8]) -> Result<CellValue> {
    let idx = def
        .column_index(column)
        .ok_or_else(|| Error::ColumnUnknown(column.to_string()))?;
    if def.column_types[idx] == "text" {
        let s = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::UnsupportedValue(format!("non-utf8 text cell: {e}")))?;
        Ok(CellValue::Text(s))
    } else {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::UnsupportedValue(format!("non-utf8 int cell: {e}")))?;
        let i = s
            .parse::<i64>()
            .map_err(|e| Error::UnsupportedValue(format!("malformed int cell {s:?}: {e}")))?;
        Ok(CellValue::Int(i))
    }
}

/// Row-layout scan (§4.4 default): row boundaries are detected by a change
/// in the scanned row id, not by counting cells against the table's column
/// count (see SPEC_FULL.md §9 on the reference's cell-counting bug).
fn select_row_layout(store: &Store, def: &TableDef) -> Result<PgResult> {
    let cells = rowstore::scan_row_layout(store, &def.name)?;
    let mut rows: Vec<Vec<(String, CellValue)>> = Vec::new();
    let mut current: Vec<(String, CellValue)> = Vec::new();
    let mut last_row_id: Option<String> = None;

    for Cell {
        row_id,
        column,
        value,
    } in cells
    {
        if last_row_id.as_deref() != Some(row_id.as_str()) && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
        }
        current.push((column.clone(), decode_cell(def, &column, &value)?));
        last_row_id = Some(row_id);
    }
    if !current.is_empty() {
        rows.push(current);
    }

    // fieldNames/fieldTypes are overwritten with the first row's scan-order
    // column sequence, per spec.md §4.4 step 5.
    let (field_names, field_types) = match rows.first() {
        Some(first) => {
            let names: Vec<String> = first.iter().map(|(c, _)| c.clone()).collect();
            let types = names
                .iter()
                .map(|c| {
                    let idx = def
                        .column_index(c)
                        .ok_or_else(|| Error::ColumnUnknown(c.clone()))?;
                    Ok(def.column_types[idx].clone())
                })
                .collect::<Result<Vec<_>>>()?;
            (names, types)
        }
        None => (Vec::new(), Vec::new()),
    };

    let rows: Vec<Vec<CellValue>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(|(_, v)| v).collect())
        .collect();

    Ok(PgResult {
        field_names,
        field_types,
        rows,
    })
}

/// Column-layout scan (`--columnar`): transposes the column-major cell
/// stream back into rows by tracking `(columnName, rowIndex)`, per spec.md
/// §4.4's column-layout algorithm.
fn select_column_layout(store: &Store, def: &TableDef) -> Result<PgResult> {
    let cells = rowstore::scan_column_layout(store, &def.name)?;
    let mut field_names: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    let mut last_column: Option<String> = None;
    let mut row_index: usize = 0;

    for Cell { column, value, .. } in cells {
        if last_column.as_deref() != Some(column.as_str()) {
            field_names.push(column.clone());
            row_index = 0;
            last_column = Some(column.clone());
        } else {
            row_index += 1;
        }
        let decoded = decode_cell(def, &column, &value)?;
        if row_index == rows.len() {
            rows.push(Vec::new());
        }
        rows[row_index].push(decoded);
    }

    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }

    let field_types = field_names
        .iter()
        .map(|c| {
            let idx = def
                .column_index(c)
                .ok_or_else(|| Error::ColumnUnknown(c.clone()))?;
            Ok(def.column_types[idx].clone())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PgResult {
        field_names,
        field_types,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_sql;

    fn tmp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn run(store: &Store, sql: &str, columnar: bool) -> Outcome {
        execute(store, parse_sql(sql).unwrap(), columnar).unwrap()
    }

    #[test]
    fn create_insert_select_round_trip_row_layout() {
        let (_dir, store) = tmp_store();
        run(&store, "create table customer (age int, name text)", false);
        run(
            &store,
            "insert into customer values (14, 'garry'), (20, 'ted')",
            false,
        );
        let Outcome::Selected(result) = run(&store, "select name from customer", false) else {
            panic!("expected Selected");
        };
        assert_eq!(result.field_names, vec!["age".to_string(), "name".to_string()]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn select_columnar_round_trip() {
        let (_dir, store) = tmp_store();
        run(&store, "create table customer (age int, name text)", false);
        run(
            &store,
            "insert into customer values (14, 'garry'), (20, 'ted')",
            false,
        );
        let Outcome::Selected(result) = run(&store, "select age from customer", true) else {
            panic!("expected Selected");
        };
        assert_eq!(result.field_names, vec!["age".to_string(), "name".to_string()]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn select_unknown_table_fails() {
        let (_dir, store) = tmp_store();
        let err = execute(&store, parse_sql("select a from nosuch").unwrap(), false).unwrap_err();
        assert!(matches!(err, Error::TableUnknown(_)));
    }

    #[test]
    fn select_unknown_column_fails() {
        let (_dir, store) = tmp_store();
        run(&store, "create table customer (age int)", false);
        let err = execute(
            &store,
            parse_sql("select nosuchcol from customer").unwrap(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ColumnUnknown(_)));
    }

    #[test]
    fn delete_then_select_returns_no_rows() {
        let (_dir, store) = tmp_store();
        run(&store, "create table customer (age int)", false);
        run(&store, "insert into customer values (1)", false);
        run(&store, "delete from customer", false);
        let Outcome::Selected(result) = run(&store, "select age from customer", false) else {
            panic!("expected Selected");
        };
        assert!(result.rows.is_empty());
    }
}
