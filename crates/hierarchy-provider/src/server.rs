use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use crate::context::ProviderContext;
use crate::dispatcher::Dispatcher;
use crate::error::{ProtocolError, StartupError};

/// Newline-delimited JSON over TCP. Connections are served concurrently,
/// requests on one connection strictly in order.
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// `StartupError::Bind` when the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs + std::fmt::Display,
        context: Arc<ProviderContext>,
    ) -> Result<Self, StartupError> {
        let label = addr.to_string();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr: label, source })?;
        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(context),
        })
    }

    /// Replace the method registry, e.g. to add provider-specific methods.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// # Errors
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is cancelled. Open connections are closed at
    /// their next request boundary.
    pub async fn run(self, shutdown: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Provider listening on {addr}");
        }

        let searches = Arc::clone(&self.dispatcher.context().searches);
        let reaper = tokio::spawn(searches.run_reaper(shutdown.clone()));

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection opened from {peer}");
                        let dispatcher = self.dispatcher.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, &dispatcher, &shutdown).await {
                                warn!("Connection from {peer} failed: {err}");
                            }
                            debug!("Connection closed from {peer}");
                        });
                    }
                    Err(err) => warn!("Failed to accept connection: {err}"),
                },
            }
        }

        if let Err(err) = reaper.await {
            warn!("Search reaper ended abnormally: {err}");
        }
        info!("Provider stopped");
    }
}

/// Longest request line accepted; longer lines are answered with an error
/// and discarded.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

enum Frame {
    Line(Vec<u8>),
    Oversized,
    Eof,
}

/// Read up to the next newline without buffering more than
/// `MAX_REQUEST_BYTES`. A final line without a newline is still returned.
async fn next_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut oversized = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (oversized, buf.is_empty()) {
                (true, _) => Frame::Oversized,
                (false, true) => Frame::Eof,
                (false, false) => Frame::Line(std::mem::take(buf)),
            });
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        if !oversized {
            if buf.len() + chunk.len() > MAX_REQUEST_BYTES {
                oversized = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        let used = newline.map_or(available.len(), |pos| pos + 1);
        reader.consume(used);

        if newline.is_some() {
            return Ok(if oversized {
                Frame::Oversized
            } else {
                Frame::Line(std::mem::take(buf))
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    dispatcher: &Dispatcher,
    shutdown: &CancellationToken,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => break,
            frame = next_frame(&mut reader, &mut buf) => frame?,
        };
        let response = match frame {
            Frame::Eof => break,
            Frame::Oversized => {
                warn!("Discarding request longer than {MAX_REQUEST_BYTES} bytes");
                ProtocolError::Malformed(format!(
                    "Request exceeds {MAX_REQUEST_BYTES} bytes"
                ))
                .to_response()
            }
            Frame::Line(bytes) => match String::from_utf8(bytes) {
                Ok(line) => match dispatcher.dispatch_line(&line).await {
                    Some(response) => response,
                    None => continue,
                },
                Err(err) => {
                    ProtocolError::Malformed(format!("Invalid UTF-8: {err}")).to_response()
                }
            },
        };

        let mut payload = response.to_string();
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
