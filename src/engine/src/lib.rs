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

//! The SQL-to-KV mapping engine: parses query text, lowers it to a
//! restricted statement type, and dispatches it onto the catalog and row
//! store.

pub mod executor;
pub mod parse;
pub mod rowstore;

pub use executor::{execute, Outcome, PgResult};
pub use parse::{parse_sql, CellValue, Statement};
