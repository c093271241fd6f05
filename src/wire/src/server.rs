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

//! Listener (C6): accepts connections indefinitely and spawns one
//! independent session task per connection, each holding a cloned handle
//! to the shared KV store (sled's `Db` is cheaply `Clone`-able).

use relkv_common::Result;
use relkv_storage::Store;
use tokio::net::{TcpListener, TcpStream};

use crate::protocol;
use crate::session::run_session;

/// Binds `addr` and serves connections until the listener itself errors.
pub async fn pg_serve(addr: &str, store: Store, columnar: bool) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr, "listening for postgres wire connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "accepted connection");
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = pg_serve_conn(stream, store, columnar).await {
                tracing::warn!(%peer, error = %e, "session ended with an error");
            }
        });
    }
}

async fn pg_serve_conn(mut stream: TcpStream, store: Store, columnar: bool) -> Result<()> {
    protocol::read_startup(&mut stream).await?;
    run_session(&mut stream, &store, columnar).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve_on_ephemeral_port(columnar: bool) -> (String, Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served_store = store.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let store = served_store.clone();
                tokio::spawn(async move {
                    let _ = pg_serve_conn(stream, store, columnar).await;
                });
            }
        });
        (addr.to_string(), store, dir)
    }

    #[tokio::test]
    async fn create_insert_select_end_to_end() {
        let (addr, _store, _dir) = serve_on_ephemeral_port(false).await;
        let (client, connection) = tokio_postgres::connect(
            &format!("host={} port={} sslmode=disable", addr.split(':').next().unwrap(), addr.split(':').nth(1).unwrap()),
            tokio_postgres::NoTls,
        )
        .await
        .unwrap();
        tokio::spawn(async move {
            let _ = connection.await;
        });

        client
            .simple_query("create table customer (age int, name text)")
            .await
            .unwrap();
        client
            .simple_query("insert into customer values (14, 'garry')")
            .await
            .unwrap();
        let rows = client.simple_query("select name from customer").await.unwrap();
        let row_count = rows
            .iter()
            .filter(|m| matches!(m, tokio_postgres::SimpleQueryMessage::Row(_)))
            .count();
        assert_eq!(row_count, 1);
    }

    #[tokio::test]
    async fn select_unknown_table_errors_and_closes() {
        let (addr, _store, _dir) = serve_on_ephemeral_port(false).await;
        let (client, connection) = tokio_postgres::connect(
            &format!("host={} port={} sslmode=disable", addr.split(':').next().unwrap(), addr.split(':').nth(1).unwrap()),
            tokio_postgres::NoTls,
        )
        .await
        .unwrap();
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let err = client.simple_query("select a from nosuch").await;
        assert!(err.is_err());
    }

    async fn raw_connect(addr: &str) -> TcpStream {
        TcpStream::connect(addr).await.unwrap()
    }

    #[tokio::test]
    async fn ssl_request_is_denied_then_startup_proceeds() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (addr, _store, _dir) = serve_on_ephemeral_port(false).await;
        let mut stream = raw_connect(&addr).await;

        // SSLRequest: len=8, code=80877103.
        stream.write_all(&8i32.to_be_bytes()).await.unwrap();
        stream.write_all(&80877103i32.to_be_bytes()).await.unwrap();
        let mut deny = [0u8; 1];
        stream.read_exact(&mut deny).await.unwrap();
        assert_eq!(deny[0], b'N');

        // Minimal StartupMessage: version 196608, zero-length parameter list.
        stream.write_all(&9i32.to_be_bytes()).await.unwrap();
        stream.write_all(&196608i32.to_be_bytes()).await.unwrap();
        stream.write_all(&[0u8]).await.unwrap();

        let mut auth_tag = [0u8; 1];
        stream.read_exact(&mut auth_tag).await.unwrap();
        assert_eq!(auth_tag[0], b'R');
    }

    #[tokio::test]
    async fn two_statements_in_one_query_closes_the_connection() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (addr, _store, _dir) = serve_on_ephemeral_port(false).await;
        let mut stream = raw_connect(&addr).await;

        stream.write_all(&9i32.to_be_bytes()).await.unwrap();
        stream.write_all(&196608i32.to_be_bytes()).await.unwrap();
        stream.write_all(&[0u8]).await.unwrap();
        // Drain AuthenticationOk (9 bytes) + ReadyForQuery (6 bytes).
        let mut drain = [0u8; 15];
        stream.read_exact(&mut drain).await.unwrap();
        let mut buf = [0u8; 1024];

        let sql = b"select 1; select 2;\0";
        stream.write_all(b"Q").await.unwrap();
        stream
            .write_all(&((sql.len() + 4) as i32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(sql).await.unwrap();

        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "connection should be closed after a parse error");
    }
}
