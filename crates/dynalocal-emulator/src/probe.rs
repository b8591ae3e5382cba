//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "TCP reachability polling under a deadline."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

use crate::error::UnreachableError;

/// Pause between failed connection attempts.
pub const PROBE_BACKOFF: Duration = Duration::from_millis(50);

/// Poll `host:port` until a TCP connection succeeds or `deadline` elapses.
///
/// Every attempt is bounded by the remaining time and failed attempts are
/// followed by [`PROBE_BACKOFF`], so the error is never returned before the
/// deadline has passed.
pub async fn wait_for_reachable(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<(), UnreachableError> {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_sub(started.elapsed());
        match timeout(remaining, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                debug!(%host, port, attempts, elapsed = ?started.elapsed(), "endpoint reachable");
                return Ok(());
            }
            Ok(Err(err)) => trace!(%host, port, attempts, error = %err, "connect attempt failed"),
            Err(_) => trace!(%host, port, attempts, "connect attempt timed out"),
        }

        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            let elapsed = started.elapsed();
            debug!(%host, port, attempts, ?elapsed, "endpoint unreachable before deadline");
            return Err(UnreachableError {
                host: host.to_owned(),
                port,
                elapsed,
            });
        }
        sleep(PROBE_BACKOFF.min(remaining)).await;
    }
}
