//! Listening socket and accept loop.

use std::io;
use std::net::SocketAddr;

use metrics::counter;
use radiosim_core::RadioError;
use tokio::net::{TcpListener, TcpSocket, lookup_host};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::metrics::{ACCEPT_ERRORS_TOTAL, CONNECTIONS_TOTAL};
use crate::session::{self, Session, SessionContext};

/// Resolve `host` and bind the first address that accepts a listener.
///
/// `SO_REUSEADDR` is set so a stopped server can be restarted on the same
/// port while old connections linger in `TIME_WAIT`.
pub async fn bind(host: &str, port: u16, backlog: u32) -> Result<TcpListener, RadioError> {
    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| RadioError::bind(host, port, e))?;

    let mut last_err = None;
    for addr in addrs {
        match bind_addr(addr, backlog) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!(%addr, error = %e, "bind attempt failed");
                last_err = Some(e);
            }
        }
    }
    let err = last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses")
    });
    Err(RadioError::bind(host, port, err))
}

fn bind_addr(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Accept connections until the context's token is cancelled.
///
/// Each connection becomes a [`Session`] driven by its own task on
/// `tracker`. The listening socket is closed when this returns.
pub async fn accept_loop(listener: TcpListener, ctx: SessionContext, tracker: TaskTracker) {
    let local = listener.local_addr().ok();
    info!(addr = ?local, "accept loop started");

    loop {
        let accepted = tokio::select! {
            () = ctx.token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                }
                counter!(CONNECTIONS_TOTAL).increment(1);
                let (session, reader) = Session::accept(stream, peer, ctx.config.write_timeout());
                let _ = tracker.spawn(session::run_session(session, reader, ctx.clone()));
            }
            Err(e) => {
                // Transient (e.g. EMFILE): back off so the loop does not spin.
                warn!(error = %e, "accept failed");
                counter!(ACCEPT_ERRORS_TOTAL).increment(1);
                tokio::select! {
                    () = ctx.token.cancelled() => break,
                    () = tokio::time::sleep(ctx.config.poll_interval()) => {}
                }
            }
        }
    }

    drop(listener);
    info!(addr = ?local, "listener closed");
}
