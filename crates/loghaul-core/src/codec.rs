//! Handshake framing codec
//!
//! A connection starts with one request/response exchange before raw log bytes flow.
//!
//! Request (client -> server):
//! ```text
//! +--------------+--------------------+----------------------+
//! | "CL" (2 B)   | Length (u16 LE)    | JSON ConnectRequest  |
//! +--------------+--------------------+----------------------+
//! ```
//!
//! Response (server -> client), never preceded by the marker:
//! ```text
//! +--------------------+-----------------------+
//! | Length (u16 LE)    | JSON ConnectResponse  |
//! +--------------------+-----------------------+
//! ```
//!
//! Readers consume exactly the marker, the prefix and the payload. Whatever follows on the
//! stream belongs to the post-handshake body and is left untouched.

use std::io::Read;

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Marker that opens every handshake request.
pub const MARKER: [u8; 2] = *b"CL";

/// Largest payload that fits the `u16` length prefix.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

const LENGTH_PREFIX_SIZE: usize = 2;

/// Status text sent with a successful handshake.
pub const STATUS_OK: &str = "OK";

/// Status text sent when the stream name is refused.
pub const STATUS_INVALID_NAME: &str = "name can only contain alpha char";

/// Handshake request naming the stream and negotiating compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "Name")]
    pub name: String,

    /// Producers predating compression omit the field.
    #[serde(rename = "Compression", default)]
    pub compression: bool,
}

impl ConnectRequest {
    pub fn new(name: impl Into<String>, compression: bool) -> Self {
        Self {
            name: name.into(),
            compression,
        }
    }
}

/// Handshake reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    #[serde(rename = "Success")]
    pub success: bool,

    #[serde(rename = "Status")]
    pub status: String,
}

impl ConnectResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: STATUS_OK.to_string(),
        }
    }

    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
        }
    }
}

fn encode_frame<T: Serialize>(message: &T, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge(payload.len()));
    }

    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u16_le(payload.len() as u16);
    dst.extend_from_slice(&payload);
    Ok(())
}

/// Encode a handshake request: marker followed by one frame.
pub fn encode_connect_request(request: &ConnectRequest) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(MARKER.len() + LENGTH_PREFIX_SIZE + 64);
    buf.extend_from_slice(&MARKER);
    encode_frame(request, &mut buf)?;
    Ok(buf)
}

/// Encode a handshake response: one frame, no marker.
pub fn encode_connect_response(response: &ConnectResponse) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 64);
    encode_frame(response, &mut buf)?;
    Ok(buf)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|source| Error::Parse {
        raw: String::from_utf8_lossy(payload).into_owned(),
        source,
    })
}

fn check_marker(marker: [u8; 2]) -> Result<()> {
    if marker != MARKER {
        return Err(Error::InvalidMarker(marker));
    }
    Ok(())
}

fn read_frame<R: Read>(src: &mut R) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    src.read_exact(&mut prefix)?;

    let length = u16::from_le_bytes(prefix) as usize;
    let mut payload = vec![0u8; length];
    src.read_exact(&mut payload)
        .map_err(|source| Error::TruncatedFrame { length, source })?;
    Ok(payload)
}

async fn read_frame_async<R: AsyncRead + Unpin>(src: &mut R) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    src.read_exact(&mut prefix).await?;

    let length = u16::from_le_bytes(prefix) as usize;
    let mut payload = vec![0u8; length];
    src.read_exact(&mut payload)
        .await
        .map_err(|source| Error::TruncatedFrame { length, source })?;
    Ok(payload)
}

/// Read a handshake request from a blocking stream.
pub fn read_connect_request<R: Read>(src: &mut R) -> Result<ConnectRequest> {
    let mut marker = [0u8; 2];
    src.read_exact(&mut marker)?;
    check_marker(marker)?;
    decode_payload(&read_frame(src)?)
}

/// Read a handshake response from a blocking stream.
pub fn read_connect_response<R: Read>(src: &mut R) -> Result<ConnectResponse> {
    decode_payload(&read_frame(src)?)
}

/// Read a handshake request from an async stream.
pub async fn read_connect_request_async<R: AsyncRead + Unpin>(
    src: &mut R,
) -> Result<ConnectRequest> {
    let mut marker = [0u8; 2];
    src.read_exact(&mut marker).await?;
    check_marker(marker)?;
    decode_payload(&read_frame_async(src).await?)
}

/// Read a handshake response from an async stream.
pub async fn read_connect_response_async<R: AsyncRead + Unpin>(
    src: &mut R,
) -> Result<ConnectResponse> {
    decode_payload(&read_frame_async(src).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_wire_layout() {
        let buf = encode_connect_request(&ConnectRequest::new("orders", false)).unwrap();

        let json = br#"{"Name":"orders","Compression":false}"#;
        assert_eq!(&buf[..2], b"CL");
        assert_eq!(u16::from_le_bytes([buf[2], buf[3]]) as usize, json.len());
        assert_eq!(&buf[4..], &json[..]);
    }

    #[test]
    fn test_response_has_no_marker() {
        let buf = encode_connect_response(&ConnectResponse::ok()).unwrap();

        let json = br#"{"Success":true,"Status":"OK"}"#;
        assert_eq!(u16::from_le_bytes([buf[0], buf[1]]) as usize, json.len());
        assert_eq!(&buf[2..], &json[..]);
    }

    #[test]
    fn test_request_roundtrip() {
        let request = ConnectRequest::new("market-pricing_01", true);
        let buf = encode_connect_request(&request).unwrap();

        let decoded = read_connect_request(&mut Cursor::new(buf.to_vec())).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_roundtrip() {
        let response = ConnectResponse::rejected(STATUS_INVALID_NAME);
        let buf = encode_connect_response(&response).unwrap();

        let decoded = read_connect_response(&mut Cursor::new(buf.to_vec())).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let request = ConnectRequest::new("x".repeat(MAX_PAYLOAD_SIZE), false);
        let err = encode_connect_request(&request).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(n) if n > MAX_PAYLOAD_SIZE));
    }

    #[test]
    fn test_payload_at_limit_accepted() {
        // {"Success":false,"Status":""} is 29 bytes of overhead
        let status = "s".repeat(MAX_PAYLOAD_SIZE - 29);
        let response = ConnectResponse::rejected(status);
        let buf = encode_connect_response(&response).unwrap();
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + MAX_PAYLOAD_SIZE);

        let decoded = read_connect_response(&mut Cursor::new(buf.to_vec())).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_invalid_marker() {
        let mut buf = encode_connect_request(&ConnectRequest::new("a", false))
            .unwrap()
            .to_vec();
        buf[0] = b'X';

        let err = read_connect_request(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidMarker([b'X', b'L'])));
    }

    #[test]
    fn test_truncated_payload() {
        let buf = encode_connect_response(&ConnectResponse::ok()).unwrap();
        let truncated = buf[..buf.len() - 3].to_vec();

        let err = read_connect_response(&mut Cursor::new(truncated)).unwrap_err();
        match err {
            Error::TruncatedFrame { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_prefix() {
        let err = read_connect_response(&mut Cursor::new(vec![5u8])).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_malformed_payload_keeps_raw_text() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(8);
        buf.extend_from_slice(b"not json");

        let err = read_connect_response(&mut Cursor::new(buf.to_vec())).unwrap_err();
        match err {
            Error::Parse { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_compression_defaults_to_false() {
        let json = br#"{"Name":"legacy"}"#;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&MARKER);
        buf.put_u16_le(json.len() as u16);
        buf.extend_from_slice(json);

        let request = read_connect_request(&mut Cursor::new(buf.to_vec())).unwrap();
        assert_eq!(request, ConnectRequest::new("legacy", false));
    }

    #[tokio::test]
    async fn test_async_reader_leaves_body_untouched() {
        let mut buf = encode_connect_request(&ConnectRequest::new("orders", true))
            .unwrap()
            .to_vec();
        buf.extend_from_slice(b"body bytes");

        let mut src = Cursor::new(buf);
        let request = read_connect_request_async(&mut src).await.unwrap();
        assert_eq!(request.name, "orders");

        let mut rest = Vec::new();
        AsyncReadExt::read_to_end(&mut src, &mut rest).await.unwrap();
        assert_eq!(rest, b"body bytes");
    }

    #[tokio::test]
    async fn test_async_response_roundtrip() {
        let buf = encode_connect_response(&ConnectResponse::ok()).unwrap();
        let mut src = Cursor::new(buf.to_vec());

        let response = read_connect_response_async(&mut src).await.unwrap();
        assert!(response.success);
        assert_eq!(response.status, STATUS_OK);
    }
}
