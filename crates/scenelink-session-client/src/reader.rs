// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Whole-frame reads from a byte stream.

use std::io;

use scenelink_proto::wire::{frame_len, HEADER_BYTES};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::SessionError;

/// Read one complete packet (header, payload and checksum).
///
/// Returns `Ok(None)` when the stream ends cleanly before any byte of a new
/// frame. Reads until the full header is buffered so short reads cannot
/// desynchronise framing. A bad magic, an unknown version or an oversized
/// length is an error: the stream cannot be resynchronised after any of them.
pub async fn read_frame<R>(stream: &mut R, max_payload: usize) -> Result<Option<Vec<u8>>, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_BYTES];
    let mut read = 0usize;
    while read < header.len() {
        let n = stream.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated frame header: read {read} of {HEADER_BYTES} bytes"),
            )
            .into());
        }
        read += n;
    }
    let total = frame_len(&header, max_payload)?.unwrap_or(HEADER_BYTES);
    let mut packet = vec![0u8; total];
    packet[..HEADER_BYTES].copy_from_slice(&header);
    stream.read_exact(&mut packet[HEADER_BYTES..]).await?;
    Ok(Some(packet))
}
