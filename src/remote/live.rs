//! Websocket connection to the live multimodal endpoint.
//!
//! After the setup handshake a link thread owns the socket outright. It
//! polls the socket with a short read timeout, writes whatever the forwarder
//! queued in between, and pushes decoded events into the inbound stream.

use super::protocol::{ClientMessage, ServerMessage, SetupOptions};
use super::{InboundStream, RemoteSession};
use crate::chunk::{InboundEvent, OutboundChunk};
use crate::error::SessionError;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

const LINK_POLL: Duration = Duration::from_millis(20);
const OUTBOUND_SLOTS: usize = 8;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub endpoint: String,
    pub api_key: String,
    pub setup: SetupOptions,
    /// Bounds the TCP connect and the setup handshake; nothing after that.
    pub connect_timeout: Duration,
}

pub struct LiveSession {
    name: String,
    outbound: Option<Sender<Message>>,
    inbound: InboundStream,
    link: Option<thread::JoinHandle<()>>,
    link_error: Arc<Mutex<Option<String>>>,
}

impl LiveSession {
    pub fn connect(config: &LiveConfig) -> Result<Self, SessionError> {
        let url = format!("{}?key={}", config.endpoint, config.api_key);
        let request = url
            .as_str()
            .into_client_request()
            .map_err(|err| SessionError::Transport(format!("invalid endpoint: {err}")))?;
        let uri = request.uri().clone();
        let host = uri
            .host()
            .ok_or_else(|| SessionError::Transport("endpoint has no host".to_string()))?
            .to_string();
        let port = uri
            .port_u16()
            .unwrap_or(if uri.scheme_str() == Some("ws") { 80 } else { 443 });

        tracing::info!(endpoint = %config.endpoint, model = %config.setup.model, "connecting");
        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|err| SessionError::Transport(format!("cannot resolve {host}: {err}")))?
            .next()
            .ok_or_else(|| SessionError::Transport(format!("no address for {host}")))?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|err| SessionError::Transport(format!("connect to {host}:{port}: {err}")))?;
        let control = stream.try_clone().map_err(SessionError::transport)?;
        control
            .set_read_timeout(Some(config.connect_timeout))
            .map_err(SessionError::transport)?;
        let _ = control.set_nodelay(true);

        let (mut socket, _response) = tungstenite::client_tls(request, stream)
            .map_err(|err| SessionError::Transport(format!("websocket handshake: {err}")))?;

        control
            .set_read_timeout(Some(LINK_POLL))
            .map_err(SessionError::transport)?;
        let setup = ClientMessage::setup(&config.setup).to_json()?;
        socket
            .send(Message::Text(setup))
            .map_err(|err| SessionError::Transport(format!("send setup: {err}")))?;
        await_setup_complete(&mut socket, config.connect_timeout)?;
        tracing::info!(model = %config.setup.model, "session ready");

        let (outbound_tx, outbound_rx) = bounded(OUTBOUND_SLOTS);
        let (inbound_tx, inbound_rx) = unbounded();
        let link_error = Arc::new(Mutex::new(None));
        let link = thread::Builder::new()
            .name("voxlink-link".to_string())
            .spawn({
                let link_error = link_error.clone();
                move || run_link(socket, outbound_rx, inbound_tx, link_error)
            })
            .map_err(SessionError::transport)?;

        Ok(Self {
            name: config.setup.model.clone(),
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            link: Some(link),
            link_error,
        })
    }

    fn closed_error(&self) -> SessionError {
        let reason = crate::lock_or_recover(&self.link_error, "link error")
            .clone()
            .unwrap_or_else(|| "connection closed".to_string());
        SessionError::Transport(reason)
    }
}

impl RemoteSession for LiveSession {
    fn send(&mut self, chunk: OutboundChunk) -> Result<(), SessionError> {
        let json = ClientMessage::from_chunk(&chunk).to_json()?;
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(self.closed_error());
        };
        if outbound.send(Message::Text(json)).is_err() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn inbound(&self) -> InboundStream {
        self.inbound.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        // Disconnecting the outbound channel tells the link to close the socket.
        self.outbound.take();
        if let Some(link) = self.link.take() {
            let _ = link.join();
        }
        tracing::info!("session closed");
    }
}

fn is_poll_timeout(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

fn await_setup_complete(socket: &mut Socket, timeout: Duration) -> Result<(), SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(SessionError::Transport(format!(
                "no setup acknowledgement within {} ms",
                timeout.as_millis()
            )));
        }
        let raw = match socket.read() {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "no reason given".to_string());
                return Err(SessionError::Transport(format!("closed during setup: {reason}")));
            }
            Ok(_) => continue,
            Err(err) if is_poll_timeout(&err) => continue,
            Err(err) => return Err(SessionError::Transport(format!("setup: {err}"))),
        };
        if ServerMessage::parse(&raw)?.setup_complete.is_some() {
            return Ok(());
        }
    }
}

fn run_link(
    mut socket: Socket,
    outbound: Receiver<Message>,
    inbound: Sender<Result<InboundEvent, SessionError>>,
    link_error: Arc<Mutex<Option<String>>>,
) {
    let fail = |reason: String| {
        tracing::error!(%reason, "session link failed");
        *crate::lock_or_recover(&link_error, "link error") = Some(reason.clone());
        let _ = inbound.send(Err(SessionError::Transport(reason)));
    };

    loop {
        loop {
            match outbound.try_recv() {
                Ok(message) => {
                    if let Err(err) = socket.send(message) {
                        fail(format!("send failed: {err}"));
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    tracing::debug!("session link closed by owner");
                    return;
                }
            }
        }

        let raw = match socket.read() {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "remote closed the session");
                return;
            }
            Ok(_) => continue,
            Err(err) if is_poll_timeout(&err) => continue,
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return;
            }
            Err(err) => {
                fail(format!("receive failed: {err}"));
                return;
            }
        };

        let message = match ServerMessage::parse(&raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%err, "skipping server message");
                continue;
            }
        };
        if message.go_away.is_some() {
            tracing::warn!("server announced it will close the session soon");
        }
        let events = match message.into_events() {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(%err, "skipping server message");
                continue;
            }
        };
        for event in events {
            if inbound.send(Ok(event)).is_err() {
                // Nobody is listening any more.
                let _ = socket.close(None);
                let _ = socket.flush();
                return;
            }
        }
    }
}
