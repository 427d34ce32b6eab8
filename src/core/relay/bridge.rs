//! Relay bridge state machine.
//!
//! ```text
//! AwaitingClient -> AwaitingUpstream -> Bridging -> Draining -> Closed
//! ```
//!
//! The bridge never touches a socket. Each call to [`RelayBridge::handle`]
//! takes one event from either leg and returns the actions to perform, in
//! order. Close actions are emitted at most once per leg, and the driver
//! reports the matching `*Closed` event back once a leg is shut.

use tracing::{debug, info, warn};

use super::frame::RelayFrame;
use super::{
    CONNECT_FAILED_MESSAGE, MISSING_CREDENTIAL_MESSAGE, UPSTREAM_CLOSED_MESSAGE,
    UPSTREAM_ERROR_MESSAGE,
};
use crate::core::bid::{BidDraft, intercept_function_call};
use crate::core::realtime::openai::messages::RelayEvent;

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    AwaitingClient,
    AwaitingUpstream,
    Bridging,
    Draining,
    Closed,
}

/// Input to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    ClientConnected,
    ClientFrame(RelayFrame),
    ClientClosed,
    ClientError(String),
    UpstreamConnected,
    UpstreamConnectFailed(String),
    UpstreamFrame(RelayFrame),
    UpstreamClosed,
    UpstreamError(String),
}

/// Output of the bridge, executed by the driver in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    ConnectUpstream,
    SendUpstream(RelayFrame),
    SendClient(RelayFrame),
    /// Hand an extracted bid to the business layer
    BidCreated(BidDraft),
    CloseUpstream,
    CloseClient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegState {
    /// Not opened yet (or, for upstream, never requested)
    Idle,
    /// Upstream connect in flight
    Connecting,
    Open,
    Closing,
    Closed,
}

pub struct RelayBridge {
    state: BridgeState,
    credential_present: bool,
    session_update: String,
    client: LegState,
    upstream: LegState,
    error_reported: bool,
}

impl RelayBridge {
    /// `session_update` is sent upstream verbatim once connected.
    pub fn new(session_update: String, credential_present: bool) -> Self {
        Self {
            state: BridgeState::AwaitingClient,
            credential_present,
            session_update,
            client: LegState::Idle,
            upstream: LegState::Idle,
            error_reported: false,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == BridgeState::Closed
    }

    pub fn handle(&mut self, event: BridgeEvent) -> Vec<BridgeAction> {
        let mut actions = Vec::new();

        match event {
            BridgeEvent::ClientConnected => self.on_client_connected(&mut actions),
            BridgeEvent::UpstreamConnected => self.on_upstream_connected(&mut actions),
            BridgeEvent::UpstreamConnectFailed(reason) => {
                if self.upstream == LegState::Connecting {
                    warn!("Upstream connection failed: {}", reason);
                    self.upstream = LegState::Closed;
                    self.report_error(CONNECT_FAILED_MESSAGE, &mut actions);
                    self.close_client(&mut actions);
                }
            }
            BridgeEvent::ClientFrame(frame) => match self.state {
                BridgeState::Bridging => actions.push(BridgeAction::SendUpstream(frame)),
                BridgeState::AwaitingUpstream => {
                    debug!(bytes = frame.len(), "Dropping client frame, upstream not ready");
                }
                _ => {}
            },
            BridgeEvent::UpstreamFrame(frame) => {
                if self.state == BridgeState::Bridging {
                    self.forward_upstream(frame, &mut actions);
                }
            }
            BridgeEvent::ClientClosed | BridgeEvent::ClientError(_) => {
                if let BridgeEvent::ClientError(e) = &event {
                    warn!("Client connection error: {}", e);
                } else if self.client == LegState::Open {
                    info!("Client disconnected");
                }
                self.client = LegState::Closed;
                self.close_upstream(&mut actions);
            }
            BridgeEvent::UpstreamClosed => {
                let unexpected = self.upstream == LegState::Open;
                self.upstream = LegState::Closed;
                if unexpected {
                    info!("Upstream connection closed");
                    self.report_error(UPSTREAM_CLOSED_MESSAGE, &mut actions);
                }
                self.close_client(&mut actions);
            }
            BridgeEvent::UpstreamError(e) => {
                if matches!(self.upstream, LegState::Open | LegState::Connecting) {
                    warn!("Upstream connection error: {}", e);
                    self.report_error(UPSTREAM_ERROR_MESSAGE, &mut actions);
                    self.close_upstream(&mut actions);
                    self.close_client(&mut actions);
                }
            }
        }

        self.settle();
        actions
    }

    fn on_client_connected(&mut self, actions: &mut Vec<BridgeAction>) {
        if self.state != BridgeState::AwaitingClient {
            return;
        }
        self.client = LegState::Open;

        if !self.credential_present {
            warn!("Rejecting client: upstream credential not configured");
            self.report_error(MISSING_CREDENTIAL_MESSAGE, actions);
            self.close_client(actions);
            return;
        }

        self.state = BridgeState::AwaitingUpstream;
        self.upstream = LegState::Connecting;
        actions.push(BridgeAction::ConnectUpstream);
    }

    fn on_upstream_connected(&mut self, actions: &mut Vec<BridgeAction>) {
        if self.upstream != LegState::Connecting {
            return;
        }
        self.upstream = LegState::Open;

        if self.state == BridgeState::AwaitingUpstream && self.client == LegState::Open {
            info!("Upstream connected, configuring session");
            self.state = BridgeState::Bridging;
            actions.push(BridgeAction::SendUpstream(RelayFrame::Text(
                self.session_update.clone(),
            )));
        } else {
            self.close_upstream(actions);
        }
    }

    fn forward_upstream(&mut self, frame: RelayFrame, actions: &mut Vec<BridgeAction>) {
        if let Some(outcome) = frame.as_text().and_then(intercept_function_call) {
            for notice in outcome.client_notices {
                actions.push(BridgeAction::SendClient(RelayFrame::Text(notice)));
            }
            if let Some(draft) = outcome.draft {
                actions.push(BridgeAction::BidCreated(draft));
            }
            actions.push(BridgeAction::SendUpstream(RelayFrame::Text(
                outcome.acknowledgement,
            )));
        }
        actions.push(BridgeAction::SendClient(frame));
    }

    /// Send one error to the client per session.
    fn report_error(&mut self, message: &str, actions: &mut Vec<BridgeAction>) {
        if self.error_reported || self.client != LegState::Open {
            return;
        }
        self.error_reported = true;
        actions.push(BridgeAction::SendClient(RelayFrame::Text(
            RelayEvent::error(message).to_json(),
        )));
    }

    fn close_client(&mut self, actions: &mut Vec<BridgeAction>) {
        if self.client == LegState::Open {
            self.client = LegState::Closing;
            actions.push(BridgeAction::CloseClient);
        }
    }

    fn close_upstream(&mut self, actions: &mut Vec<BridgeAction>) {
        match self.upstream {
            LegState::Open | LegState::Connecting => {
                self.upstream = LegState::Closing;
                actions.push(BridgeAction::CloseUpstream);
            }
            LegState::Idle => self.upstream = LegState::Closed,
            LegState::Closing | LegState::Closed => {}
        }
    }

    fn settle(&mut self) {
        if self.state == BridgeState::AwaitingClient && self.client == LegState::Idle {
            return;
        }
        let client_done = self.client == LegState::Closed;
        let upstream_done = matches!(self.upstream, LegState::Closed | LegState::Idle);

        if client_done && upstream_done {
            if self.state != BridgeState::Closed {
                debug!("Relay session closed");
            }
            self.state = BridgeState::Closed;
        } else if self.client != LegState::Open
            || matches!(self.upstream, LegState::Closing | LegState::Closed)
        {
            self.state = BridgeState::Draining;
        }
    }
}
