// Raw byte-stream connection to the messaging server.

use log::debug;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;

/// Fixed size of a single read, matching the protocol's framing (none beyond
/// newlines). A reply larger than one chunk is not reassembled.
const READ_BUFFER_SIZE: usize = 1024;

/// A bidirectional plaintext stream to the server. The read and write halves
/// sit behind separate locks so the listen loop can block on a read while
/// commands keep writing.
pub struct Transport {
    reader: TokioMutex<OwnedReadHalf>,
    writer: TokioMutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

impl Transport {
    /// Open a TCP connection to `host:port`. No retries; the caller decides
    /// what a failed connect means.
    pub async fn open(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        let (reader, writer) = stream.into_split();
        Ok(Transport {
            reader: TokioMutex::new(reader),
            writer: TokioMutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }

    /// Write one protocol line, appending the terminating newline.
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport is closed"));
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Block until the server sends something, returning up to
    /// [`READ_BUFFER_SIZE`] bytes. `None` means the stream ended.
    pub async fn read_chunk(&self) -> io::Result<Option<Vec<u8>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport is closed"));
        }
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut reader = self.reader.lock().await;
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(buf[..n].to_vec()))
        }
    }

    /// Shut down the connection. Safe to call more than once; later reads and
    /// writes fail with `NotConnected`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Error shutting down stream: {}", e);
        }
    }
}
