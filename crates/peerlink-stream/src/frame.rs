//! Length-prefixed framing for byte-stream transports
//!
//! Frames are a 4-byte little-endian length followed by a JSON payload.

use async_trait::async_trait;
use peerlink_core::{LinkError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted frame size (64 MB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Read one length-prefixed frame from a stream.
#[async_trait]
pub trait FrameRead {
    async fn read_frame(&mut self) -> Result<Vec<u8>>;
}

/// Write one length-prefixed frame to a stream.
#[async_trait]
pub trait FrameWrite {
    async fn write_frame(&mut self, data: &[u8]) -> Result<()>;
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameRead for R {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        // Read 4-byte length prefix (little-endian)
        let mut len_bytes = [0u8; 4];
        self.read_exact(&mut len_bytes)
            .await
            .map_err(|e| LinkError::Transport(format!("read length failed: {}", e)))?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        // Sanity check on message size
        if len > MAX_FRAME_LEN {
            return Err(LinkError::Transport(format!("frame too large: {} bytes", len)));
        }

        // Read frame body
        let mut data = vec![0u8; len];
        self.read_exact(&mut data)
            .await
            .map_err(|e| LinkError::Transport(format!("read data failed: {}", e)))?;

        Ok(data)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameWrite for W {
    async fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        // Write 4-byte length prefix (little-endian)
        let len = (data.len() as u32).to_le_bytes();
        self.write_all(&len)
            .await
            .map_err(|e| LinkError::Transport(format!("write length failed: {}", e)))?;

        // Write frame body
        self.write_all(data)
            .await
            .map_err(|e| LinkError::Transport(format!("write data failed: {}", e)))?;

        // Flush to ensure data is sent
        self.flush()
            .await
            .map_err(|e| LinkError::Transport(format!("flush failed: {}", e)))?;

        Ok(())
    }
}
