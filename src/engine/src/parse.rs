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

//! Lowers the parser's tagged union ([`sqlparser::ast::Statement`]) into the
//! restricted sum type this engine consumes, per SPEC_FULL.md §9 "AST
//! walking over a parser's tagged union". Anything this engine doesn't
//! support — joins, WHERE, expressions, unknown types — is rejected here
//! with `ParseError` rather than leaking further into the executor.

use relkv_common::{Error, Result};
use sqlparser::ast::{self, DataType, Expr, FromTable, SetExpr, UnaryOperator, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// One column as declared by `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub type_token: String,
}

/// A value positionally assigned to a column, per spec.md §3's cell model.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
}

/// The restricted statement shapes this engine accepts (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Create {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    Insert {
        table: String,
        rows: Vec<Vec<CellValue>>,
    },
    Delete {
        table: String,
    },
    Select {
        table: String,
        columns: Vec<String>,
    },
}

/// Parses SQL text into exactly one [`Statement`]. Rejects empty input and
/// more than one top-level statement, per spec.md §4.5 step 1.
pub fn parse_sql(sql: &str) -> Result<Statement> {
    let mut stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| Error::Parse(e.to_string()))?;

    if stmts.is_empty() {
        return Err(Error::Parse("empty query".to_string()));
    }
    if stmts.len() > 1 {
        return Err(Error::Parse(
            "only a single statement per query is supported".to_string(),
        ));
    }
    lower(stmts.swap_remove(0))
}

fn lower(stmt: ast::Statement) -> Result<Statement> {
    match stmt {
        ast::Statement::CreateTable(create) => {
            let table = object_name_to_table(&create.name)?;
            let columns = create
                .columns
                .iter()
                .map(|c| {
                    Ok(ColumnSpec {
                        name: c.name.value.clone(),
                        type_token: data_type_to_token(&c.data_type)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Statement::Create { table, columns })
        }
        ast::Statement::Insert(insert) => {
            let table = object_name_to_table(&insert.table_name)?;
            let source = insert
                .source
                .ok_or_else(|| Error::Parse("INSERT without VALUES".to_string()))?;
            let SetExpr::Values(values) = *source.body else {
                return Err(Error::Parse("INSERT source must be VALUES".to_string()));
            };
            let rows = values
                .rows
                .iter()
                .map(|row| row.iter().map(expr_to_value).collect::<Result<Vec<_>>>())
                .collect::<Result<Vec<_>>>()?;
            Ok(Statement::Insert { table, rows })
        }
        ast::Statement::Delete(delete) => {
            let tables = match &delete.from {
                FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
            };
            if delete.selection.is_some() {
                return Err(Error::Parse("DELETE with WHERE is not supported".to_string()));
            }
            let table = table_with_joins_to_name(
                tables
                    .first()
                    .ok_or_else(|| Error::Parse("DELETE without a table".to_string()))?,
            )?;
            Ok(Statement::Delete { table })
        }
        ast::Statement::Query(query) => {
            let SetExpr::Select(select) = *query.body else {
                return Err(Error::Parse("only plain SELECT is supported".to_string()));
            };
            if select.selection.is_some() {
                return Err(Error::Parse("SELECT with WHERE is not supported".to_string()));
            }
            let table = table_with_joins_to_name(select.from.first().ok_or_else(|| {
                Error::Parse("SELECT without a FROM table".to_string())
            })?)?;
            let columns = select
                .projection
                .iter()
                .map(select_item_to_column)
                .collect::<Result<Vec<_>>>()?;
            Ok(Statement::Select { table, columns })
        }
        other => Err(Error::Parse(format!("unsupported statement: {other}"))),
    }
}

fn object_name_to_table(name: &ast::ObjectName) -> Result<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(Error::Parse(format!("unsupported qualified name: {name}"))),
    }
}

fn table_with_joins_to_name(rel: &ast::TableWithJoins) -> Result<String> {
    if !rel.joins.is_empty() {
        return Err(Error::Parse("JOIN is not supported".to_string()));
    }
    match &rel.relation {
        ast::TableFactor::Table { name, .. } => object_name_to_table(name),
        other => Err(Error::Parse(format!("unsupported FROM relation: {other}"))),
    }
}

fn select_item_to_column(item: &ast::SelectItem) -> Result<String> {
    match item {
        ast::SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Ok(ident.value.clone()),
        other => Err(Error::Parse(format!("unsupported select target: {other}"))),
    }
}

fn data_type_to_token(dt: &DataType) -> Result<String> {
    match dt {
        DataType::Int(_) | DataType::Integer(_) => Ok("pg_catalog.int4".to_string()),
        DataType::Text => Ok("text".to_string()),
        other => Err(Error::Parse(format!("unsupported column type: {other}"))),
    }
}

fn expr_to_value(expr: &Expr) -> Result<CellValue> {
    match expr {
        Expr::Value(Value::SingleQuotedString(s)) => Ok(CellValue::Text(s.clone())),
        Expr::Value(Value::Number(n, _)) => n
            .parse::<i64>()
            .map(CellValue::Int)
            .map_err(|_| Error::UnsupportedValue(format!("not an integer: {n}"))),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match expr_to_value(expr)? {
            CellValue::Int(i) => Ok(CellValue::Int(-i)),
            CellValue::Text(s) => Err(Error::UnsupportedValue(format!("-'{s}'"))),
        },
        other => Err(Error::UnsupportedValue(format!("{other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table() {
        let stmt = parse_sql("create table customer (age int, name text)").unwrap();
        assert_eq!(
            stmt,
            Statement::Create {
                table: "customer".to_string(),
                columns: vec![
                    ColumnSpec {
                        name: "age".to_string(),
                        type_token: "pg_catalog.int4".to_string()
                    },
                    ColumnSpec {
                        name: "name".to_string(),
                        type_token: "text".to_string()
                    },
                ]
            }
        );
    }

    #[test]
    fn parses_insert_with_multiple_rows() {
        let stmt =
            parse_sql("insert into customer values(14, 'garry'), (20, 'ted')").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "customer".to_string(),
                rows: vec![
                    vec![CellValue::Int(14), CellValue::Text("garry".to_string())],
                    vec![CellValue::Int(20), CellValue::Text("ted".to_string())],
                ]
            }
        );
    }

    #[test]
    fn parses_delete() {
        let stmt = parse_sql("delete from customer").unwrap();
        assert_eq!(
            stmt,
            Statement::Delete {
                table: "customer".to_string()
            }
        );
    }

    #[test]
    fn parses_select() {
        let stmt = parse_sql("select name, age from customer").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: "customer".to_string(),
                columns: vec!["name".to_string(), "age".to_string()]
            }
        );
    }

    #[test]
    fn rejects_two_statements() {
        let err = parse_sql("select 1; select 2;").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn rejects_where_clause() {
        let err = parse_sql("select age from customer where age > 1").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
