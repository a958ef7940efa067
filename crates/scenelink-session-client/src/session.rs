// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session task: socket IO plus the reconnection state machine.
//!
//! ```text
//! Disconnected ─▶ Connecting ─▶ Connected ─▶ [Errored ─▶] Disconnected
//!      ▲              │                                        │
//!      │            Errored ─▶ Reconnecting ◀──────────────────┘
//!      │                            │
//!      └── budget spent (parked) ◀──┴──▶ Connecting
//! ```
//!
//! Each failed connection attempt counts against `reconnect_attempts`; a
//! successful connection or a manual `reconnect()` resets the count. Once the
//! budget is spent the task parks until `reconnect()`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scenelink_bus::{RegistrationGuard, Store, WILDCARD};
use scenelink_proto::wire::{decode_downlink, encode_uplink};
use scenelink_proto::{DownlinkEvent, SceneChannels, UplinkEvent};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{read_frame, Connector, SessionConfig, SessionError, SessionState, SessionStatus, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reconnect,
    Disconnect,
    Shutdown,
}

const TRANSITION_BACKLOG: usize = 64;

/// What the driver does next.
enum Next {
    Connect,
    Wait,
    Park,
    Stop,
}

/// Why a live connection ended.
enum ServeEnd {
    PeerClosed,
    Failed(SessionError),
    Reconnect,
    Disconnect,
    Shutdown,
}

/// Entry point for session tasks.
#[derive(Debug, Clone, Copy)]
pub struct Session;

impl Session {
    /// Start a session task on the current tokio runtime and connect right
    /// away.
    ///
    /// Every uplink event published while connected is written to the socket;
    /// events published at any other time are dropped. Inbound frames are
    /// published on `channels.downlink`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<C: Connector>(config: SessionConfig, connector: C, channels: &SceneChannels) -> SessionHandle {
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (transitions, _) = broadcast::channel(TRANSITION_BACKLOG);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let ready = Arc::new(AtomicBool::new(false));

        let gate = Arc::clone(&ready);
        // Taps run inside `publish`, so the gate is read at publish time and
        // the queue receives events in publish order.
        let outbound = channels
            .uplink
            .tap(WILDCARD, move |event: &UplinkEvent| {
                if !gate.load(Ordering::Acquire) {
                    debug!(etype = %event.etype, "not connected; uplink event dropped");
                    return;
                }
                if out_tx.try_send(event.clone()).is_err() {
                    debug!(etype = %event.etype, "outbound queue full; uplink event dropped");
                }
            })
            .into_guard();

        let driver = Driver {
            config,
            connector,
            downlink: channels.downlink.clone(),
            commands: cmd_rx,
            outbound: out_rx,
            ready,
            status: status_tx,
            transitions: transitions.clone(),
        };
        let task = tokio::spawn(driver.run());

        SessionHandle {
            commands: cmd_tx,
            status: status_rx,
            transitions,
            task,
            outbound,
        }
    }
}

/// Control surface of a running session.
///
/// Dropping the handle stops the session task at its next step; prefer
/// [`SessionHandle::shutdown`] to wait for the socket to close.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    transitions: broadcast::Sender<SessionState>,
    task: JoinHandle<()>,
    outbound: RegistrationGuard,
}

impl SessionHandle {
    /// Status watch; every transition is published.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Every state change from now on, including ones the status watch
    /// coalesces. A receiver that falls more than 64 changes behind lags.
    pub fn transitions(&self) -> broadcast::Receiver<SessionState> {
        self.transitions.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Reset the attempt budget and connect again now.
    ///
    /// A live connection is closed first. Only one connection attempt is
    /// ever in flight.
    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    /// Close the connection and stop retrying until [`SessionHandle::reconnect`].
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            debug!(?cmd, "session task already stopped");
        }
    }

    /// Close the connection, stop the task and release the uplink
    /// subscription.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        let Self {
            commands,
            task,
            outbound,
            ..
        } = self;
        // The task may already be gone; joining below reports that.
        let _ = commands.send(Command::Shutdown);
        drop(outbound);
        task.await.map_err(|_| SessionError::Closed)
    }
}

struct Driver<C> {
    config: SessionConfig,
    connector: C,
    downlink: Store<DownlinkEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    outbound: mpsc::Receiver<UplinkEvent>,
    ready: Arc<AtomicBool>,
    status: watch::Sender<SessionStatus>,
    transitions: broadcast::Sender<SessionState>,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        let mut next = Next::Connect;
        loop {
            next = match next {
                Next::Connect => self.attempt().await,
                Next::Wait => self.backoff().await,
                Next::Park => self.parked().await,
                Next::Stop => break,
            };
        }
        self.ready.store(false, Ordering::Release);
        self.update(|s| s.state = SessionState::Disconnected);
        debug!("session task stopped");
    }

    fn update(&self, f: impl FnOnce(&mut SessionStatus)) {
        self.status.send_modify(|s| {
            let before = s.state;
            f(s);
            if s.state != before {
                info!(from = %before, to = %s.state, failed = s.failed_attempts, "session state");
                // No receivers is fine.
                let _ = self.transitions.send(s.state);
            }
        });
    }

    fn rearm(&self) {
        self.update(|s| {
            s.failed_attempts = 0;
            s.exhausted = false;
        });
    }

    async fn attempt(&mut self) -> Next {
        self.update(|s| s.state = SessionState::Connecting);
        debug!(endpoint = %self.config.endpoint, "connecting");
        let result = tokio::select! {
            r = self.connector.connect(&self.config.endpoint) => r,
            cmd = self.commands.recv() => return match cmd {
                Some(Command::Reconnect) => {
                    self.rearm();
                    Next::Connect
                }
                Some(Command::Disconnect) => {
                    self.update(|s| s.state = SessionState::Disconnected);
                    Next::Park
                }
                Some(Command::Shutdown) | None => Next::Stop,
            },
        };

        let transport = match result {
            Ok(transport) => transport,
            Err(err) => {
                warn!(%err, endpoint = %self.config.endpoint, "connection attempt failed");
                self.update(|s| {
                    s.failed_attempts += 1;
                    s.state = SessionState::Errored;
                    s.last_error = Some(err.to_string());
                });
                return Next::Wait;
            }
        };

        self.update(|s| {
            s.failed_attempts = 0;
            s.exhausted = false;
            s.last_error = None;
        });
        match self.serve(transport).await {
            ServeEnd::PeerClosed => {
                info!("connection closed by peer");
                self.update(|s| s.state = SessionState::Disconnected);
                Next::Wait
            }
            ServeEnd::Failed(err) => {
                warn!(%err, "connection lost");
                self.update(|s| {
                    s.state = SessionState::Errored;
                    s.last_error = Some(err.to_string());
                });
                self.update(|s| s.state = SessionState::Disconnected);
                Next::Wait
            }
            ServeEnd::Reconnect => Next::Connect,
            ServeEnd::Disconnect => {
                self.update(|s| s.state = SessionState::Disconnected);
                Next::Park
            }
            ServeEnd::Shutdown => Next::Stop,
        }
    }

    async fn backoff(&mut self) -> Next {
        let failed = self.status.borrow().failed_attempts;
        if failed >= self.config.reconnect_attempts {
            warn!(failed, "reconnect attempts exhausted; waiting for manual reconnect");
            self.update(|s| {
                s.state = SessionState::Disconnected;
                s.exhausted = true;
            });
            return Next::Park;
        }
        self.update(|s| s.state = SessionState::Reconnecting);
        tokio::select! {
            () = tokio::time::sleep(self.config.reconnect_interval) => Next::Connect,
            cmd = self.commands.recv() => match cmd {
                Some(Command::Reconnect) => {
                    self.rearm();
                    Next::Connect
                }
                Some(Command::Disconnect) => {
                    self.update(|s| s.state = SessionState::Disconnected);
                    Next::Park
                }
                Some(Command::Shutdown) | None => Next::Stop,
            },
        }
    }

    async fn parked(&mut self) -> Next {
        match self.commands.recv().await {
            Some(Command::Reconnect) => {
                self.rearm();
                Next::Connect
            }
            Some(Command::Disconnect) => Next::Park,
            Some(Command::Shutdown) | None => Next::Stop,
        }
    }

    async fn serve(&mut self, transport: Transport) -> ServeEnd {
        let (rd, mut wr) = tokio::io::split(transport);
        if let Err(err) = write_event(&mut wr, &UplinkEvent::session_start()).await {
            return ServeEnd::Failed(err);
        }
        // Anything queued under an earlier connection is stale.
        while self.outbound.try_recv().is_ok() {}
        self.ready.store(true, Ordering::Release);
        self.update(|s| s.state = SessionState::Connected);

        let mut reader = tokio::spawn(read_loop(
            rd,
            self.downlink.clone(),
            self.config.max_frame_bytes,
        ));
        let end = loop {
            tokio::select! {
                res = &mut reader => break match res {
                    Ok(Ok(())) => ServeEnd::PeerClosed,
                    Ok(Err(err)) => ServeEnd::Failed(err),
                    Err(join) => ServeEnd::Failed(io::Error::other(join.to_string()).into()),
                },
                Some(event) = self.outbound.recv() => match write_event(&mut wr, &event).await {
                    Ok(()) => {}
                    Err(SessionError::Wire(err)) => {
                        warn!(%err, etype = %event.etype, "uplink event not encodable; dropped");
                    }
                    Err(err) => break ServeEnd::Failed(err),
                },
                cmd = self.commands.recv() => break match cmd {
                    Some(Command::Reconnect) => {
                        info!("manual reconnect");
                        self.rearm();
                        ServeEnd::Reconnect
                    }
                    Some(Command::Disconnect) => ServeEnd::Disconnect,
                    Some(Command::Shutdown) | None => ServeEnd::Shutdown,
                },
            }
        };
        self.ready.store(false, Ordering::Release);
        reader.abort();
        // Best effort; the peer may already be gone.
        let _ = wr.shutdown().await;
        end
    }
}

async fn write_event<W>(wr: &mut W, event: &UplinkEvent) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_uplink(event)?;
    wr.write_all(&bytes).await?;
    wr.flush().await?;
    Ok(())
}

async fn read_loop<R>(mut rd: R, downlink: Store<DownlinkEvent>, max_payload: usize) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    while let Some(packet) = read_frame(&mut rd, max_payload).await? {
        match decode_downlink(&packet) {
            Ok((event, _)) => {
                debug!(etype = %event.etype, key = ?event.key, "downlink event");
                downlink.publish(event);
            }
            Err(err) => warn!(%err, "inbound frame dropped"),
        }
    }
    Ok(())
}
