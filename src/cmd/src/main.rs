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

//! Process bootstrap: parse flags, init logging, open the KV store, and
//! serve the PostgreSQL wire listener until the process is killed.

use clap::Parser;
use relkv_storage::Store;

/// A minimal relational query engine speaking the PostgreSQL wire protocol.
#[derive(Parser, Debug)]
#[command(name = "relkv", version)]
struct Opts {
    /// TCP port to bind on loopback.
    #[arg(long)]
    pg_port: u16,

    /// Clear the entire KV keyspace before serving.
    #[arg(long)]
    reset: bool,

    /// Use the column-layout scan path for SELECT instead of row-layout.
    #[arg(long)]
    columnar: bool,

    /// Directory backing the sled KV store.
    #[arg(long, default_value = "relkv-data")]
    db_path: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let store = Store::open(&opts.db_path)?;
    if opts.reset {
        tracing::info!("--reset set, clearing keyspace");
        store.reset()?;
    }

    let addr = format!("127.0.0.1:{}", opts.pg_port);
    relkv_wire::pg_serve(&addr, store, opts.columnar).await?;
    Ok(())
}
