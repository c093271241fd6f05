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

//! Drives one connection through the state machine in §4.4: startup, then
//! Query/Terminate in a loop, one statement at a time.

use relkv_common::Result;
use relkv_engine::{execute, parse_sql, CellValue, Outcome};
use relkv_storage::Store;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::{
    self, FrontendMessage, QUERY_TAG, TERMINATE_TAG,
};

fn cell_to_json(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) => serde_json::to_string(s).expect("string always serializes"),
        CellValue::Int(i) => i.to_string(),
    }
}

fn command_tag(sql: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Selected(result) => format!("SELECT {}", result.rows.len()),
        _ => {
            let verb = sql
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_uppercase();
            format!("{verb} ok")
        }
    }
}

/// Runs the query/terminate loop for one already-started-up connection.
/// Returns on Terminate, a protocol/IO error, or a query execution error
/// (which per §7 both log and close the connection).
pub async fn run_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    store: &Store,
    columnar: bool,
) -> Result<()> {
    protocol::write_auth_ok(stream).await?;
    protocol::write_ready_for_query(stream).await?;

    loop {
        let FrontendMessage { tag, payload } = protocol::read_message(stream).await?;
        match tag {
            TERMINATE_TAG => return Ok(()),
            t if t == QUERY_TAG => {
                let sql = protocol::query_text(&payload)?;
                handle_query(stream, store, &sql, columnar).await?;
            }
            other => {
                return Err(relkv_common::Error::Protocol(format!(
                    "unexpected message type {other:#x} in Idle state"
                )))
            }
        }
    }
}

async fn handle_query<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    store: &Store,
    sql: &str,
    columnar: bool,
) -> Result<()> {
    let result = (|| {
        let stmt = parse_sql(sql)?;
        execute(store, stmt, columnar)
    })();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, sql, "query execution failed, closing connection");
            return Err(e);
        }
    };

    if let Outcome::Selected(ref pg_result) = outcome {
        protocol::write_row_description(stream, &pg_result.field_names, &pg_result.field_types)
            .await?;
        for row in &pg_result.rows {
            let values: Vec<String> = row.iter().map(cell_to_json).collect();
            protocol::write_data_row(stream, &values).await?;
        }
    }

    protocol::write_command_complete(stream, &command_tag(sql, &outcome)).await?;
    protocol::write_ready_for_query(stream).await?;
    Ok(())
}
