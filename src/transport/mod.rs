//! Line-oriented links: host (stdio), modem (serial) and cloud (TCP)

pub mod serial;
pub mod tcp;
pub mod traits;

pub use serial::SerialConnector;
pub use tcp::TcpConnector;
pub use traits::{TransportConnector, TransportStream};

use cellfix_shared::codec::{CodecError, LineDecoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Read lines from `reader` and forward them on `tx` until EOF
///
/// Over-long lines are dropped with a warning; reading continues after the
/// next terminator.
pub fn spawn_line_reader<R>(mut reader: R, name: &'static str, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = LineDecoder::new();
        let mut read_buf = vec![0u8; 1024];

        loop {
            let n = match reader.read(&mut read_buf).await {
                Ok(0) => {
                    debug!("[{}] Link closed", name);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!("[{}] Read error: {}", name, e);
                    break;
                }
            };
            decoder.extend(&read_buf[..n]);

            loop {
                match decoder.decode_next() {
                    Ok(Some(line)) if line.is_empty() => {}
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(CodecError::LineTooLong(len)) => {
                        warn!("[{}] Dropped line of {} bytes", name, len);
                    }
                }
            }
        }
    })
}

/// Write each line received on `rx` to `writer` with a `\r\n` terminator
pub fn spawn_line_writer<W>(mut writer: W, name: &'static str, mut rx: mpsc::Receiver<String>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let result = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\r\n").await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = result {
                error!("[{}] Write error: {}", name, e);
                break;
            }
        }
    })
}
