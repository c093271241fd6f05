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

//! The two keyspace namespaces ("subspaces") the engine uses, and the glue
//! between [`crate::tuple`] packing and byte-range scans.

use crate::tuple::{self, TupleElem};

/// A directory-style byte prefix under which tuple-packed keys are grouped.
/// Opening a subspace is idempotent: it is just the prefix bytes, there is
/// no on-disk registration step (unlike a real FDB directory layer).
#[derive(Debug, Clone)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    pub fn open(name: &str) -> Self {
        let mut prefix = name.as_bytes().to_vec();
        prefix.push(b'/');
        Self { prefix }
    }

    /// Packs a tuple under this subspace.
    pub fn pack(&self, elems: &[TupleElem]) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend(tuple::pack(elems));
        out
    }

    /// Unpacks a key previously produced by [`Subspace::pack`], stripping
    /// the subspace prefix first.
    pub fn unpack(&self, key: &[u8]) -> Result<Vec<TupleElem>, String> {
        let rest = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or_else(|| "key does not belong to this subspace".to_string())?;
        tuple::unpack(rest)
    }

    /// The half-open range `[prefix, prefix_incremented)` covering every key
    /// whose tuple starts with `elems` under this subspace.
    pub fn range(&self, elems: &[TupleElem]) -> (Vec<u8>, Vec<u8>) {
        let mut prefix = self.prefix.clone();
        prefix.extend(tuple::pack(elems));
        tuple::prefix_range(&prefix)
    }
}

/// Returns the `catalog/table` and `data/table_data` subspaces, per §3.
pub fn catalog_subspace() -> Subspace {
    Subspace::open("catalog/table")
}

pub fn data_subspace() -> Subspace {
    Subspace::open("data/table_data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_covers_only_matching_prefix() {
        let sub = catalog_subspace();
        let key_in = sub.pack(&[TupleElem::from("customer"), TupleElem::from("age")]);
        let key_out = sub.pack(&[TupleElem::from("customerx")]);
        let (start, end) = sub.range(&[TupleElem::from("customer")]);
        assert!(key_in.as_slice() >= start.as_slice() && key_in.as_slice() < end.as_slice());
        assert!(!(key_out.as_slice() >= start.as_slice() && key_out.as_slice() < end.as_slice()));
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let sub = data_subspace();
        let elems = vec![
            TupleElem::from("customer"),
            TupleElem::from("r"),
            TupleElem::from("row-id"),
            TupleElem::from("age"),
        ];
        let key = sub.pack(&elems);
        assert_eq!(sub.unpack(&key).unwrap(), elems);
    }
}
