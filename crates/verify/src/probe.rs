//! Reachability check for the game server
//!
//! The server is started outside this tool; the probe only confirms that
//! something answers before a browser is launched against it.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{VerifyError, VerifyResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Poll `url` until it answers with a 2xx status. Returns the number of attempts.
pub async fn wait_for_page(url: &str, timeout: Duration) -> VerifyResult<usize> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("{} is up ({} attempt(s))", url, attempts);
                return Ok(attempts);
            }
            Ok(resp) => warn!("{} returned {}", url, resp.status()),
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                // refused connections are expected while the server comes up
                if !e.is_connect() {
                    warn!("Probe error: {}", e);
                }
            }
        }

        if start.elapsed() + POLL_INTERVAL > timeout {
            return Err(VerifyError::PageUnreachable {
                url: url.to_string(),
                attempts,
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_unreachable_port() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{}/", port);
        let err = wait_for_page(&url, Duration::from_millis(300)).await.unwrap_err();
        assert!(matches!(err, VerifyError::PageUnreachable { attempts, .. } if attempts >= 1));
    }

    #[tokio::test]
    async fn test_reachable_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = "<html><div id=\"hud\"></div></html>";
                let resp = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(resp.as_bytes()).await;
            }
        });

        let url = format!("http://127.0.0.1:{}/index.html", port);
        let attempts = wait_for_page(&url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(attempts, 1);
    }
}
