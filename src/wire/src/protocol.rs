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

//! Message-level framing for the PostgreSQL v3 wire protocol subset this
//! engine speaks: startup negotiation, simple Query, Terminate, and the
//! result-set messages, read and written directly against an async socket.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use relkv_common::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SSL_REQUEST_CODE: i32 = 80877103;
const STARTUP_PROTOCOL_VERSION: i32 = 196608; // 3.0, high 16 bits = 3

/// What the client sent as its first message on the connection.
pub enum FirstMessage {
    /// An SSLRequest; the caller must reply with `N` and read another first
    /// message (the client falls back to a plain StartupMessage).
    SslRequest,
    /// A real StartupMessage; connection parameters are ignored.
    Startup,
}

/// Reads one frontend message's 4-byte prefixed length and the following
/// 4-byte code, used for the untagged startup-phase messages.
async fn read_length_prefixed_with_code<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<(i32, BytesMut)> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = BigEndian::read_i32(&len_buf);
    if len < 4 {
        return Err(Error::Protocol(format!("invalid message length {len}")));
    }
    let mut rest = BytesMut::zeroed((len - 4) as usize);
    stream.read_exact(&mut rest).await?;
    Ok((len, rest))
}

/// Reads and, if necessary, denies SSL/GSSAPI negotiation until a real
/// StartupMessage arrives. Connection parameters inside the StartupMessage
/// are not parsed; authentication is not supported (§6).
pub async fn read_startup<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S) -> Result<()> {
    loop {
        let (_len, body) = read_length_prefixed_with_code(stream).await?;
        if body.len() < 4 {
            return Err(Error::Protocol("startup message too short".to_string()));
        }
        let code = BigEndian::read_i32(&body[..4]);
        if code == SSL_REQUEST_CODE {
            stream.write_all(b"N").await?;
            continue;
        }
        if code == STARTUP_PROTOCOL_VERSION {
            return Ok(());
        }
        return Err(Error::Protocol(format!(
            "unsupported startup code {code}"
        )));
    }
}

/// One tagged frontend message: its type byte and payload (length prefix
/// and tag stripped).
pub struct FrontendMessage {
    pub tag: u8,
    pub payload: BytesMut,
}

/// Reads one tagged frontend message (Query, Terminate, …).
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<FrontendMessage> {
    let mut tag_buf = [0u8; 1];
    stream.read_exact(&mut tag_buf).await?;
    let (_len, payload) = read_length_prefixed_with_code(stream).await?;
    Ok(FrontendMessage {
        tag: tag_buf[0],
        payload,
    })
}

pub const QUERY_TAG: u8 = b'Q';
pub const TERMINATE_TAG: u8 = b'X';

/// Extracts the null-terminated query string from a Query message payload.
pub fn query_text(payload: &[u8]) -> Result<String> {
    let end = payload
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(payload.len());
    String::from_utf8(payload[..end].to_vec())
        .map_err(|e| Error::Protocol(format!("query text is not valid utf-8: {e}")))
}

async fn write_tagged<W: AsyncWrite + Unpin>(stream: &mut W, tag: u8, body: &[u8]) -> Result<()> {
    let mut buf = BytesMut::with_capacity(5 + body.len());
    buf.put_u8(tag);
    buf.put_i32((body.len() + 4) as i32);
    buf.put_slice(body);
    stream.write_all(&buf).await?;
    Ok(())
}

/// `AuthenticationOk`: no credentials are ever checked (§6).
pub async fn write_auth_ok<W: AsyncWrite + Unpin>(stream: &mut W) -> Result<()> {
    write_tagged(stream, b'R', &0i32.to_be_bytes()).await
}

/// `ReadyForQuery` with transaction status `'I'` (idle), per §4.4.
pub async fn write_ready_for_query<W: AsyncWrite + Unpin>(stream: &mut W) -> Result<()> {
    write_tagged(stream, b'Z', b"I").await
}

/// One result column's wire type, resolved from its catalog type token.
pub fn type_oid(type_token: &str) -> i32 {
    match type_token {
        "text" => 25,
        "pg_catalog.int4" => 23,
        _ => 0,
    }
}

/// `RowDescription`: one field per name/OID pair.
pub async fn write_row_description<W: AsyncWrite + Unpin>(
    stream: &mut W,
    field_names: &[String],
    field_types: &[String],
) -> Result<()> {
    let mut body = BytesMut::new();
    body.put_i16(field_names.len() as i16);
    for (name, type_token) in field_names.iter().zip(field_types) {
        body.put_slice(name.as_bytes());
        body.put_u8(0);
        body.put_i32(0); // table OID
        body.put_i16(0); // column attr number
        body.put_i32(type_oid(type_token));
        body.put_i16(-1); // type size
        body.put_i32(-1); // type modifier
        body.put_i16(0); // format code: text
    }
    write_tagged(stream, b'T', &body).await
}

/// `DataRow`: each value is its JSON textual encoding, per §4.5 step 2.
pub async fn write_data_row<W: AsyncWrite + Unpin>(stream: &mut W, values: &[String]) -> Result<()> {
    let mut body = BytesMut::new();
    body.put_i16(values.len() as i16);
    for v in values {
        body.put_i32(v.len() as i32);
        body.put_slice(v.as_bytes());
    }
    write_tagged(stream, b'D', &body).await
}

/// `CommandComplete` with the given tag (e.g. `INSERT ok`, `SELECT 2`).
pub async fn write_command_complete<W: AsyncWrite + Unpin>(stream: &mut W, tag: &str) -> Result<()> {
    let mut body = BytesMut::new();
    body.put_slice(tag.as_bytes());
    body.put_u8(0);
    write_tagged(stream, b'C', &body).await
}
