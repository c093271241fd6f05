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

//! Order-preserving tuple packing, modeled on the FoundationDB tuple layer:
//! each element is tagged, and the encoding of any tuple never forms a
//! prefix of the encoding of another, so lexicographic byte order matches
//! tuple order (elementwise, then by length).

const TAG_STR: u8 = 0x02;
const TAG_INT: u8 = 0x15;

/// One element of a packed key tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleElem {
    Str(String),
    Int(i64),
}

impl From<&str> for TupleElem {
    fn from(s: &str) -> Self {
        TupleElem::Str(s.to_string())
    }
}

impl From<String> for TupleElem {
    fn from(s: String) -> Self {
        TupleElem::Str(s)
    }
}

impl From<i64> for TupleElem {
    fn from(i: i64) -> Self {
        TupleElem::Int(i)
    }
}

/// Packs a tuple of elements into order-preserving bytes.
pub fn pack(elems: &[TupleElem]) -> Vec<u8> {
    let mut out = Vec::new();
    for elem in elems {
        match elem {
            TupleElem::Str(s) => {
                out.push(TAG_STR);
                // Escape 0x00 as 0x00 0xFF so the terminator 0x00 0x00 is
                // unambiguous and no encoded string is a prefix of another.
                for &b in s.as_bytes() {
                    if b == 0x00 {
                        out.push(0x00);
                        out.push(0xFF);
                    } else {
                        out.push(b);
                    }
                }
                out.push(0x00);
                out.push(0x00);
            }
            TupleElem::Int(i) => {
                out.push(TAG_INT);
                // Flip the sign bit so two's-complement ordering matches
                // unsigned big-endian byte ordering.
                let flipped = (*i as u64) ^ (1u64 << 63);
                out.extend_from_slice(&flipped.to_be_bytes());
            }
        }
    }
    out
}

/// Unpacks bytes produced by [`pack`] back into a tuple.
pub fn unpack(mut bytes: &[u8]) -> Result<Vec<TupleElem>, String> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let tag = bytes[0];
        bytes = &bytes[1..];
        match tag {
            TAG_STR => {
                let mut s = Vec::new();
                loop {
                    match bytes {
                        [0x00, 0x00, rest @ ..] => {
                            bytes = rest;
                            break;
                        }
                        [0x00, 0xFF, rest @ ..] => {
                            s.push(0x00);
                            bytes = rest;
                        }
                        [b, rest @ ..] => {
                            s.push(*b);
                            bytes = rest;
                        }
                        [] => return Err("unterminated string element".to_string()),
                    }
                }
                let s = String::from_utf8(s).map_err(|e| e.to_string())?;
                out.push(TupleElem::Str(s));
            }
            TAG_INT => {
                if bytes.len() < 8 {
                    return Err("truncated int element".to_string());
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                bytes = &bytes[8..];
                let flipped = u64::from_be_bytes(buf);
                let i = (flipped ^ (1u64 << 63)) as i64;
                out.push(TupleElem::Int(i));
            }
            other => return Err(format!("unknown tuple tag {other:#x}")),
        }
    }
    Ok(out)
}

/// Returns the half-open byte range `[prefix, prefix_incremented)` that
/// scans every key with `prefix` as a prefix.
pub fn prefix_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let start = prefix.to_vec();
    let mut end = prefix.to_vec();
    // Increment the last byte that isn't already 0xFF, dropping any
    // trailing 0xFF bytes first; an all-0xFF prefix has no finite upper
    // bound, so the range is left open (callers only hit this for key
    // spaces this crate never produces).
    while let Some(&last) = end.last() {
        if last == 0xFF {
            end.pop();
        } else {
            break;
        }
    }
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_tuple() {
        let elems = vec![
            TupleElem::from("customer"),
            TupleElem::from("r"),
            TupleElem::Int(-7),
        ];
        let packed = pack(&elems);
        assert_eq!(unpack(&packed).unwrap(), elems);
    }

    #[test]
    fn string_ordering_matches_byte_ordering() {
        let a = pack(&[TupleElem::from("age")]);
        let b = pack(&[TupleElem::from("name")]);
        assert!(a < b);
    }

    #[test]
    fn string_prefix_does_not_collide_with_a_longer_string() {
        // "ab"'s terminator (0x00 0x00) disambiguates it from "abc", so one
        // is not a byte-prefix of the other despite "ab" being a string
        // prefix of "abc".
        let short = pack(&[TupleElem::from("ab")]);
        let long = pack(&[TupleElem::from("abc")]);
        assert!(!long.starts_with(&short));
        assert!(short < long);
    }

    #[test]
    fn int_ordering_matches_signed_ordering() {
        let neg = pack(&[TupleElem::Int(-5)]);
        let zero = pack(&[TupleElem::Int(0)]);
        let pos = pack(&[TupleElem::Int(5)]);
        assert!(neg < zero);
        assert!(zero < pos);
    }

    #[test]
    fn prefix_range_is_half_open() {
        let (start, end) = prefix_range(b"catalog/table/customer/");
        assert_eq!(start, b"catalog/table/customer/");
        assert!(start < end);
    }
}
