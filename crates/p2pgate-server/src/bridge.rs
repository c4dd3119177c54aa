//! The stream bridge — concurrent bidirectional byte pumping between a
//! client endpoint and a dialed destination endpoint.
//!
//! Each direction runs as its own task with an `mpsc` cancel channel.
//! Whichever direction terminates first (end-of-stream, I/O error) makes the
//! session owner cancel the other; both tasks are joined before [`bridge`]
//! returns, so a session is never considered complete while a pump is still
//! running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::endpoint::{RelayRead, RelayWrite};

/// Monotonic counter of bytes observed flowing through one session.
///
/// Shared by both pump directions; `Relaxed` is enough since the value is
/// only read for logging after both pumps have been joined.
#[derive(Debug, Default)]
pub struct ByteCounter(AtomicU64);

impl ByteCounter {
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Copy from `src` to `dst` until end-of-stream, error, or cancel; then
/// close `dst` so its peer observes end-of-stream too.
async fn pump<R, W>(
    mut src: R,
    mut dst: W,
    counter: Arc<ByteCounter>,
    mut cancel_rx: mpsc::Receiver<()>,
    direction: &'static str,
) where
    R: RelayRead,
    W: RelayWrite,
{
    loop {
        tokio::select! {
            _ = cancel_rx.recv() => {
                debug!(direction, "relay cancelled");
                break;
            }
            chunk = src.recv() => match chunk {
                Ok(Some(data)) => {
                    if let Err(e) = dst.send(&data).await {
                        warn!(direction, error = %e, "relay write failed");
                        break;
                    }
                    counter.add(data.len() as u64);
                }
                Ok(None) => {
                    debug!(direction, "closed by remote side");
                    break;
                }
                Err(e) => {
                    warn!(direction, error = %e, "relay read failed");
                    break;
                }
            }
        }
    }

    if let Err(e) = dst.close().await {
        debug!(direction, error = %e, "endpoint close failed");
    }
}

/// Run both pump directions of one session to completion.
///
/// Spawns `client → destination` and `destination → client` as separate
/// tasks sharing `counter`. The first task to finish triggers the other's
/// cancel channel; both are awaited before this function returns.
pub async fn bridge<CR, CW, DR, DW>(
    client_rd: CR,
    client_wr: CW,
    dest_rd: DR,
    dest_wr: DW,
    counter: Arc<ByteCounter>,
) where
    CR: RelayRead + 'static,
    CW: RelayWrite + 'static,
    DR: RelayRead + 'static,
    DW: RelayWrite + 'static,
{
    let (up_cancel_tx, up_cancel_rx) = mpsc::channel::<()>(1);
    let (down_cancel_tx, down_cancel_rx) = mpsc::channel::<()>(1);

    let mut up = tokio::spawn(pump(
        client_rd,
        dest_wr,
        counter.clone(),
        up_cancel_rx,
        "client to destination",
    ));
    let mut down = tokio::spawn(pump(
        dest_rd,
        client_wr,
        counter,
        down_cancel_rx,
        "destination to client",
    ));

    tokio::select! {
        _ = &mut up => {
            let _ = down_cancel_tx.send(()).await;
            let _ = down.await;
        }
        _ = &mut down => {
            let _ = up_cancel_tx.send(()).await;
            let _ = up.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{TcpReader, TcpWriter};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (outer, inner) = tokio::join!(TcpStream::connect(addr), async {
            listener.accept().await.map(|(s, _)| s)
        });
        (outer.unwrap(), inner.unwrap())
    }

    /// Bridge two plain TCP pairs: `client_outer <-> [bridge] <-> dest_outer`.
    fn spawn_bridge(
        client_inner: TcpStream,
        dest_inner: TcpStream,
        counter: Arc<ByteCounter>,
    ) -> tokio::task::JoinHandle<()> {
        let (crd, cwr) = client_inner.into_split();
        let (drd, dwr) = dest_inner.into_split();
        tokio::spawn(bridge(
            TcpReader::new(crd),
            TcpWriter::new(cwr),
            TcpReader::new(drd),
            TcpWriter::new(dwr),
            counter,
        ))
    }

    #[test]
    fn counter_accumulates() {
        let counter = ByteCounter::default();
        counter.add(100);
        counter.add(28);
        assert_eq!(counter.total(), 128);
    }

    #[tokio::test]
    async fn relays_both_directions_and_counts() {
        let (mut client_outer, client_inner) = tcp_pair().await;
        let (dest_inner, mut dest_outer) = tcp_pair().await;
        let counter = Arc::new(ByteCounter::default());
        let session = spawn_bridge(client_inner, dest_inner, counter.clone());

        client_outer.write_all(&[0xAB; 100]).await.unwrap();
        let mut buf = [0u8; 100];
        dest_outer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xAB; 100]);

        dest_outer.write_all(&[0xCD; 50]).await.unwrap();
        let mut buf = [0u8; 50];
        client_outer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xCD; 50]);

        // Destination closes: treated as graceful, session fully unwinds.
        drop(dest_outer);
        let n = client_outer.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "client must observe end-of-stream");

        timeout(Duration::from_secs(5), session)
            .await
            .expect("bridge must return after destination close")
            .unwrap();
        assert_eq!(counter.total(), 150);
    }

    #[tokio::test]
    async fn closing_client_tears_down_both_endpoints() {
        let (client_outer, client_inner) = tcp_pair().await;
        let (dest_inner, mut dest_outer) = tcp_pair().await;
        let counter = Arc::new(ByteCounter::default());
        let session = spawn_bridge(client_inner, dest_inner, counter.clone());

        drop(client_outer);

        timeout(Duration::from_secs(5), session)
            .await
            .expect("bridge must return after client close")
            .unwrap();

        let mut buf = [0u8; 1];
        let n = dest_outer.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "destination must observe end-of-stream");
        assert_eq!(counter.total(), 0);
    }
}
