use may::coroutine::JoinHandle;
use may_minihttp::HttpService;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Typed wrapper around `may_minihttp`'s server.
pub struct HttpServer<T>(pub T);

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening socket until it accepts connections, for about
    /// half a second.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..100 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the accept loop and wait for it to exit.
    pub fn stop(self) {
        // SAFETY: cancelling the accept coroutine is the shutdown path; the
        // handle is owned here and joined right after.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "Server stopped");
    }

    /// Block until the server exits.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = may_minihttp::HttpServer(self.0).start(addr)?;
        info!(addr = %addr, "Server listening");
        Ok(ServerHandle { addr, handle })
    }
}
