//! Async driver for [`RelayBridge`].
//!
//! Polls both legs and the pending upstream connect, feeds what happens to
//! the bridge, and performs the returned actions in order. Closing a leg is
//! reported back to the bridge as that leg's `*Closed` event.
//!
//! Each leg's sink is owned by its own writer task fed through a bounded
//! queue, so a peer that stops reading only ever stalls its own leg. A full
//! queue is reported as an error on that leg.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt, future};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, info_span, warn};

use super::RelayResult;
use super::bridge::{BridgeAction, BridgeEvent, RelayBridge};
use super::frame::{Leg, LegEvent, LegSink, LegStream, RelayFrame};
use super::upstream::UpstreamConnector;
use crate::core::bid::BidSink;
use crate::core::realtime::RealtimeResult;

/// Frames buffered per leg before the leg is considered stalled.
pub const LEG_QUEUE_CAPACITY: usize = 256;

/// How long a closed leg may take to flush its queue once the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session settings for [`run_bridge`].
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub session_id: String,
    pub connect_timeout: Duration,
}

type ConnectTask = JoinHandle<Result<RealtimeResult<Leg>, tokio::time::error::Elapsed>>;

async fn next_leg_event(stream: &mut Option<LegStream>) -> Option<LegEvent> {
    match stream {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

type ConnectOutcome = Result<Result<RealtimeResult<Leg>, tokio::time::error::Elapsed>, JoinError>;

async fn join_connect(task: &mut Option<ConnectTask>) -> ConnectOutcome {
    let Some(handle) = task.as_mut() else {
        return future::pending().await;
    };
    let result = handle.await;
    *task = None;
    result
}

/// Sending half of a leg: a bounded queue drained by a dedicated task.
struct LegWriter {
    queue: mpsc::Sender<RelayFrame>,
    task: JoinHandle<RelayResult<()>>,
}

impl LegWriter {
    fn spawn(mut sink: LegSink) -> Self {
        let (queue, mut frames) = mpsc::channel::<RelayFrame>(LEG_QUEUE_CAPACITY);
        let task = tokio::spawn(
            async move {
                while let Some(frame) = frames.recv().await {
                    sink.send(frame).await?;
                }
                sink.close().await
            }
            .in_current_span(),
        );
        Self { queue, task }
    }
}

/// Resolves when an installed writer exits on its own, which only happens
/// on a send failure while its queue is still open.
async fn join_writer(writer: &mut Option<LegWriter>) -> Result<RelayResult<()>, JoinError> {
    let Some(active) = writer.as_mut() else {
        return future::pending().await;
    };
    let result = (&mut active.task).await;
    *writer = None;
    result
}

fn writer_exit_reason(result: Result<RelayResult<()>, JoinError>) -> String {
    match result {
        Ok(Ok(())) => "writer stopped".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    }
}

/// Outcome of queueing a frame on a leg.
enum Enqueued {
    Sent,
    /// The leg has no writer or its writer already exited
    Dropped,
    Stalled,
}

fn enqueue(writer: Option<&LegWriter>, frame: RelayFrame) -> Enqueued {
    let Some(writer) = writer else {
        return Enqueued::Dropped;
    };
    match writer.queue.try_send(frame) {
        Ok(()) => Enqueued::Sent,
        Err(TrySendError::Full(_)) => Enqueued::Stalled,
        Err(TrySendError::Closed(_)) => Enqueued::Dropped,
    }
}

struct Driver {
    session_id: String,
    connect_timeout: Duration,
    connector: Option<Arc<dyn UpstreamConnector>>,
    bid_sink: Arc<dyn BidSink>,
    client_writer: Option<LegWriter>,
    client_stream: Option<LegStream>,
    upstream_writer: Option<LegWriter>,
    upstream_stream: Option<LegStream>,
    connecting: Option<ConnectTask>,
    /// Leg delivered by a finished connect task, installed on `UpstreamConnected`
    connected_leg: Option<Leg>,
    /// Writers of closed legs still flushing their queues
    retired: Vec<JoinHandle<RelayResult<()>>>,
    pending: VecDeque<BridgeEvent>,
}

impl Driver {
    fn execute(&mut self, action: BridgeAction) {
        match action {
            BridgeAction::ConnectUpstream => self.start_connect(),
            BridgeAction::SendUpstream(frame) => match enqueue(self.upstream_writer.as_ref(), frame) {
                Enqueued::Sent => {}
                Enqueued::Dropped => debug!("No upstream writer, dropping frame"),
                Enqueued::Stalled => {
                    self.abandon_upstream();
                    self.pending.push_back(BridgeEvent::UpstreamError(
                        "upstream write queue full".to_string(),
                    ));
                }
            },
            BridgeAction::SendClient(frame) => match enqueue(self.client_writer.as_ref(), frame) {
                Enqueued::Sent | Enqueued::Dropped => {}
                Enqueued::Stalled => {
                    self.abandon_client();
                    self.pending.push_back(BridgeEvent::ClientError(
                        "client write queue full".to_string(),
                    ));
                }
            },
            BridgeAction::BidCreated(draft) => self.bid_sink.bid_created(&self.session_id, draft),
            BridgeAction::CloseUpstream => {
                if let Some(task) = self.connecting.take() {
                    task.abort();
                }
                self.connected_leg = None;
                self.upstream_stream = None;
                let writer = self.upstream_writer.take();
                self.retire(writer);
                self.pending.push_back(BridgeEvent::UpstreamClosed);
            }
            BridgeAction::CloseClient => {
                self.client_stream = None;
                let writer = self.client_writer.take();
                self.retire(writer);
                self.pending.push_back(BridgeEvent::ClientClosed);
            }
        }
    }

    /// Stop accepting frames for a leg and let its writer flush and close.
    fn retire(&mut self, writer: Option<LegWriter>) {
        if let Some(LegWriter { queue, task }) = writer {
            drop(queue);
            self.retired.push(task);
        }
    }

    fn abandon_client(&mut self) {
        self.client_stream = None;
        if let Some(writer) = self.client_writer.take() {
            writer.task.abort();
        }
    }

    fn abandon_upstream(&mut self) {
        self.upstream_stream = None;
        if let Some(writer) = self.upstream_writer.take() {
            writer.task.abort();
        }
    }

    fn start_connect(&mut self) {
        let Some(connector) = self.connector.clone() else {
            self.pending.push_back(BridgeEvent::UpstreamConnectFailed(
                "no upstream connector".to_string(),
            ));
            return;
        };
        let timeout = self.connect_timeout;
        self.connecting = Some(tokio::spawn(async move {
            tokio::time::timeout(timeout, connector.connect()).await
        }));
    }

    /// Wait for the next event from either leg, either writer or the connect task.
    async fn next_event(&mut self) -> BridgeEvent {
        loop {
            tokio::select! {
                event = next_leg_event(&mut self.client_stream) => match event {
                    Some(LegEvent::Frame(frame)) => return BridgeEvent::ClientFrame(frame),
                    Some(LegEvent::Ignored) => continue,
                    Some(LegEvent::Error(e)) => {
                        self.abandon_client();
                        return BridgeEvent::ClientError(e);
                    }
                    Some(LegEvent::Closed) | None => {
                        self.client_stream = None;
                        let writer = self.client_writer.take();
                        self.retire(writer);
                        return BridgeEvent::ClientClosed;
                    }
                },
                event = next_leg_event(&mut self.upstream_stream) => match event {
                    Some(LegEvent::Frame(frame)) => return BridgeEvent::UpstreamFrame(frame),
                    Some(LegEvent::Ignored) => continue,
                    Some(LegEvent::Error(e)) => {
                        self.upstream_stream = None;
                        return BridgeEvent::UpstreamError(e);
                    }
                    Some(LegEvent::Closed) | None => {
                        self.upstream_stream = None;
                        let writer = self.upstream_writer.take();
                        self.retire(writer);
                        return BridgeEvent::UpstreamClosed;
                    }
                },
                result = join_writer(&mut self.client_writer) => {
                    self.client_stream = None;
                    return BridgeEvent::ClientError(writer_exit_reason(result));
                }
                result = join_writer(&mut self.upstream_writer) => {
                    return BridgeEvent::UpstreamError(writer_exit_reason(result));
                }
                result = join_connect(&mut self.connecting) => return self.connect_finished(result),
            }
        }
    }

    fn connect_finished(&mut self, result: ConnectOutcome) -> BridgeEvent {
        match result {
            Ok(Ok(Ok(leg))) => {
                self.connected_leg = Some(leg);
                BridgeEvent::UpstreamConnected
            }
            Ok(Ok(Err(e))) => BridgeEvent::UpstreamConnectFailed(e.to_string()),
            Ok(Err(_)) => BridgeEvent::UpstreamConnectFailed(format!(
                "connect timed out after {:?}",
                self.connect_timeout
            )),
            Err(e) => BridgeEvent::UpstreamConnectFailed(e.to_string()),
        }
    }

    fn install_upstream(&mut self) {
        if let Some(leg) = self.connected_leg.take() {
            self.upstream_writer = Some(LegWriter::spawn(leg.sink));
            self.upstream_stream = Some(leg.stream);
        }
    }

    /// Give every closed leg a bounded chance to flush, then drop what is left.
    async fn drain_writers(&mut self) {
        let writers = [self.client_writer.take(), self.upstream_writer.take()];
        for writer in writers {
            self.retire(writer);
        }

        let deadline = tokio::time::Instant::now() + WRITER_DRAIN_TIMEOUT;
        for mut task in std::mem::take(&mut self.retired) {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => debug!("Leg close failed: {}", e),
                Ok(Err(e)) => debug!("Leg writer ended abnormally: {}", e),
                Err(_) => {
                    warn!("Leg writer did not flush in time, dropping queued frames");
                    task.abort();
                }
            }
        }
    }
}

/// Run one relay session to completion.
///
/// Returns once both legs are closed and their queued frames are flushed,
/// or abandoned after a short grace period. `connector` is `None` when no
/// upstream credential is configured; the bridge then rejects the client
/// without dialing out.
pub async fn run_bridge(
    mut bridge: RelayBridge,
    client: Leg,
    connector: Option<Arc<dyn UpstreamConnector>>,
    bid_sink: Arc<dyn BidSink>,
    options: BridgeOptions,
) {
    let span = info_span!("relay", session_id = %options.session_id);

    async move {
        let mut driver = Driver {
            session_id: options.session_id,
            connect_timeout: options.connect_timeout,
            connector,
            bid_sink,
            client_writer: Some(LegWriter::spawn(client.sink)),
            client_stream: Some(client.stream),
            upstream_writer: None,
            upstream_stream: None,
            connecting: None,
            connected_leg: None,
            retired: Vec::new(),
            pending: VecDeque::from([BridgeEvent::ClientConnected]),
        };

        loop {
            while let Some(event) = driver.pending.pop_front() {
                if event == BridgeEvent::UpstreamConnected {
                    driver.install_upstream();
                }
                for action in bridge.handle(event) {
                    driver.execute(action);
                }
            }

            if bridge.is_closed() {
                break;
            }

            if driver.client_stream.is_none()
                && driver.upstream_stream.is_none()
                && driver.connecting.is_none()
            {
                warn!("Relay legs exhausted before close, forcing shutdown");
                driver.execute(BridgeAction::CloseUpstream);
                driver.execute(BridgeAction::CloseClient);
                continue;
            }

            let event = driver.next_event().await;
            driver.pending.push_back(event);
        }

        driver.drain_writers().await;
        debug!("Relay session finished");
    }
    .instrument(span)
    .await
}
