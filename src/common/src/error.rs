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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across the engine, shared by every component crate so a
/// session can log and close the connection uniformly regardless of which
/// layer raised them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed wire protocol message: {0}")]
    Protocol(String),

    #[error("sql parse error: {0}")]
    Parse(String),

    #[error("unknown table: {0}")]
    TableUnknown(String),

    #[error("unknown column: {0}")]
    ColumnUnknown(String),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("catalog write failed: {0}")]
    CatalogWriteFailed(String),

    #[error("kv transaction error: {0}")]
    KvTransaction(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
