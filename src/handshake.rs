//! Bolt handshake (§4.6, §6): the 4-byte magic preamble followed by up
//! to four version proposals, and the server's one chosen version (or
//! zero for "no match").

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::BoxedStream;

pub const MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Encodes a `major.minor` pair as `0x0000MMmm` (§6).
pub const fn encode_version(major: u8, minor: u8) -> u32 {
    ((major as u32) << 8) | (minor as u32)
}

pub fn decode_version(encoded: u32) -> (u8, u8) {
    (((encoded >> 8) & 0xFF) as u8, (encoded & 0xFF) as u8)
}

/// Protocol versions proposed, in preference order (§6). Unused
/// proposal slots are zero-filled, not omitted.
pub const PROPOSED_VERSIONS: [u32; 4] =
    [encode_version(5, 8), encode_version(5, 5), encode_version(4, 5), encode_version(4, 4)];

/// Sends the magic preamble and version proposals, then reads the
/// server's 4-byte reply. Buffers until all 4 bytes are available rather
/// than trusting a single `read()` to return them atomically — a TCP
/// stack is free to split that reply across reads (§9 open question).
pub async fn negotiate(stream: &mut BoxedStream, deadline: Duration) -> Result<u32> {
    let fut = negotiate_inner(stream);
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::ConnectTimeout(deadline)),
    }
}

async fn negotiate_inner(stream: &mut BoxedStream) -> Result<u32> {
    let mut outbound = Vec::with_capacity(4 + 4 * 4);
    outbound.extend_from_slice(&MAGIC);
    for version in PROPOSED_VERSIONS {
        outbound.extend_from_slice(&version.to_be_bytes());
    }
    stream.write_all(&outbound).await.map_err(|e| Error::ConnectionLost(e.to_string()))?;
    stream.flush().await.map_err(|e| Error::ConnectionLost(e.to_string()))?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await.map_err(|e| Error::ConnectionLost(e.to_string()))?;
    let agreed = u32::from_be_bytes(reply);

    if agreed == 0 {
        return Err(Error::ProtocolError("server rejected all proposed versions".into()));
    }
    if !PROPOSED_VERSIONS.contains(&agreed) {
        return Err(Error::ProtocolError(format!("server agreed to unproposed version {agreed:#010x}")));
    }
    Ok(agreed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposed_versions_match_spec_wire_example() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        for v in PROPOSED_VERSIONS {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        assert_eq!(
            bytes,
            vec![
                0x60, 0x60, 0xB0, 0x17, 0x00, 0x00, 0x05, 0x08, 0x00, 0x00, 0x05, 0x05, 0x00, 0x00, 0x04, 0x05, 0x00,
                0x00, 0x04, 0x04,
            ]
        );
    }

    #[test]
    fn encode_decode_round_trip() {
        assert_eq!(decode_version(encode_version(5, 8)), (5, 8));
        assert_eq!(encode_version(5, 8), 0x0000_0508);
    }
}
