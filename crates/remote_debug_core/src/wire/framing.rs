//! `Content-Length: N\r\n\r\n<N bytes of JSON>` framing.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame body. A full cache page of base64 is far
/// below this.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

fn invalid_data(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.into())
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> std::io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if saw_header {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream closed while reading frame headers",
                ));
            }
            return Ok(None);
        }
        saw_header = true;

        let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
        if trimmed.is_empty() {
            break;
        }

        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                let parsed = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| invalid_data(format!("invalid Content-Length value: {e}")))?;
                content_length = Some(parsed);
            }
        }
    }

    let length =
        content_length.ok_or_else(|| invalid_data("missing required Content-Length header"))?;
    if length > MAX_FRAME_LEN {
        return Err(invalid_data(format!(
            "frame of {length} bytes exceeds limit of {MAX_FRAME_LEN}"
        )));
    }

    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice::<T>(&body)
        .map(Some)
        .map_err(|e| invalid_data(format!("invalid JSON payload: {e}")))
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)
        .map_err(|e| invalid_data(format!("failed to encode frame: {e}")))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}
