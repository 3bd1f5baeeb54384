//! Streaming asset downloads.

use super::types::{AddonError, DOWNLOAD_TIMEOUT};
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Streams `url` into `dest`.
///
/// `on_progress` receives the received/total ratio after every chunk when
/// the server sends a `Content-Length`; otherwise it is never called.
/// Returns the number of bytes written.
///
/// # Errors
/// Returns `DownloadFailed` on transport errors, non-success status codes,
/// stalls longer than [`DOWNLOAD_TIMEOUT`] and write failures.
pub(crate) async fn download_to_file<F>(
    client: &Client,
    url: &str,
    dest: &Path,
    on_progress: F,
) -> Result<u64, AddonError>
where
    F: FnMut(f64),
{
    download_with_idle_timeout(client, url, dest, DOWNLOAD_TIMEOUT, on_progress).await
}

/// Like [`download_to_file`], failing once the server has sent nothing for
/// `idle`. The response headers and every body chunk each get `idle`; a
/// slow transfer that keeps delivering bytes never times out.
async fn download_with_idle_timeout<F>(
    client: &Client,
    url: &str,
    dest: &Path,
    idle: Duration,
    mut on_progress: F,
) -> Result<u64, AddonError>
where
    F: FnMut(f64),
{
    assert!(!url.is_empty(), "URL must not be empty");

    debug!("[ADDON-DOWNLOAD] GET {} -> {}", url, dest.display());
    let start = Instant::now();

    let mut response = timeout(idle, client.get(url).send())
        .await
        .map_err(|_| stalled(url, idle))?
        .map_err(|e| {
            warn!("[ADDON-DOWNLOAD] HTTP request failed: {}", e);
            AddonError::download(url, e)
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!("[ADDON-DOWNLOAD] Server answered {} for {}", status, url);
        return Err(AddonError::download(url, format!("HTTP {}", status)));
    }

    let total = response.content_length().filter(|len| *len > 0);
    debug!("[ADDON-DOWNLOAD] Content-Length: {:?}", total);

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| AddonError::download(url, format!("cannot create {}: {}", dest.display(), e)))?;

    let mut received: u64 = 0;
    loop {
        let chunk = timeout(idle, response.chunk())
            .await
            .map_err(|_| stalled(url, idle))?
            .map_err(|e| {
                warn!("[ADDON-DOWNLOAD] Read failed after {} bytes: {}", received, e);
                AddonError::download(url, e)
            })?;
        let Some(chunk) = chunk else { break };

        file.write_all(&chunk)
            .await
            .map_err(|e| AddonError::download(url, format!("write failed: {}", e)))?;
        received += chunk.len() as u64;

        if let Some(total) = total {
            on_progress((received as f64 / total as f64).min(1.0));
        }
    }

    file.flush()
        .await
        .map_err(|e| AddonError::download(url, format!("write failed: {}", e)))?;

    info!(
        "[ADDON-DOWNLOAD] Downloaded {} bytes in {:?}",
        received,
        start.elapsed()
    );
    Ok(received)
}

fn stalled(url: &str, idle: Duration) -> AddonError {
    warn!("[ADDON-DOWNLOAD] No data from {} for {:?}", url, idle);
    AddonError::download(url, format!("no data received for {:?}", idle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::ErrorKind;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serves one response whose body arrives a byte at a time, `gap` apart.
    async fn trickle_server(body: &'static [u8], gap: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for byte in body {
                tokio::time::sleep(gap).await;
                if socket.write_all(&[*byte]).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
        });

        format!("http://{}/patch.mpq", addr)
    }

    #[tokio::test]
    async fn test_slow_transfer_outlives_idle_timeout() {
        let url = trickle_server(b"0123456789", Duration::from_millis(60)).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("patch.mpq");
        let mut ratios = Vec::new();

        // The whole body takes ~600ms, well over the 250ms idle limit.
        let written = download_with_idle_timeout(
            &Client::new(),
            &url,
            &dest,
            Duration::from_millis(250),
            |r| ratios.push(r),
        )
        .await
        .unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789");
        assert_eq!(ratios.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn test_stalled_transfer_fails() {
        let url = trickle_server(b"01", Duration::from_millis(500)).await;
        let dir = tempfile::tempdir().unwrap();

        let err = download_with_idle_timeout(
            &Client::new(),
            &url,
            &dir.path().join("patch.mpq"),
            Duration::from_millis(100),
            |_| {},
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert!(err.to_string().contains("no data received"));
    }
}
