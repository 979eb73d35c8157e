//! Module `file_ops`
//!
//! Streams directory listings out and uploaded files in over a data
//! connection.

use log::{debug, error, info, warn};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::TransferError;
use crate::protocol::responses::CRLF;

/// Writes one CRLF-terminated line per listing entry, then shuts the
/// stream down.
pub async fn send_listing<W>(stream: &mut W, lines: &[String]) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push_str(CRLF);
    }

    stream
        .write_all(payload.as_bytes())
        .await
        .map_err(TransferError::Stream)?;
    stream.flush().await.map_err(TransferError::Stream)?;
    stream.shutdown().await.map_err(TransferError::Stream)?;
    Ok(())
}

/// Removes the upload target when dropped, unless the upload was committed.
///
/// Covers both a failed transfer and a session task cancelled mid-upload.
struct PartialUpload<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> PartialUpload<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialUpload<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!("Removed partial upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove partial upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Copies every byte from `data_stream` into a new file at `target` until
/// EOF. If the copy fails or the future is dropped first, the partial file
/// is removed.
pub async fn receive_file<R>(
    data_stream: &mut R,
    target: &Path,
    buffer_size: usize,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
{
    let guard = PartialUpload::new(target);

    match write_stream_to_file(data_stream, target, buffer_size).await {
        Ok(total) => {
            guard.commit();
            info!("File uploaded: {} ({} bytes)", target.display(), total);
            Ok(total)
        }
        Err(e) => {
            error!("Upload to {} failed: {}", target.display(), e);
            Err(TransferError::Stream(e))
        }
    }
}

async fn write_stream_to_file<R>(
    data_stream: &mut R,
    target: &Path,
    buffer_size: usize,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let file = File::create(target).await?;
    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = data_stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(total)
}
