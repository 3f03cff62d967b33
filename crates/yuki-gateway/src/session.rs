//! The gateway session actor.
//!
//! One task owns the entire session: the state machine, the sequence
//! tracker, and the live socket handle. Everything else reaches it
//! through its input channel, so every timer expiry, provisioning
//! outcome, and inbound envelope is serialized through one loop and
//! no locking is needed on the hot path.
//!
//! Timers are guarded: each one captures the state it was armed in and
//! its action is applied only if the session is still in that state
//! when it fires. Stale timers from abandoned recovery attempts are
//! dropped with a debug line.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use yuki_proto::{Envelope, EnvelopeKind, HandshakePayload, ResumeAckPayload};

use crate::backoff::BackoffConfig;
use crate::demux;
use crate::error::GatewayError;
use crate::events::SessionEvent;
use crate::provision::{GatewayEndpoint, GatewayRequest, ProvisionError, Provisioner};
use crate::socket::{SocketHandle, Transport};
use crate::state::{AtomicSessionState, SessionState};
use crate::tracker::SequenceTracker;

/// Delay before the first bounded startup retry.
const STARTUP_FIRST_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Delay before the last bounded startup retry.
const STARTUP_LAST_RETRY_DELAY: Duration = Duration::from_secs(4);
/// Pause inserted between a timeout and the recovery state it hops to.
const STATE_HOP_DELAY: Duration = Duration::from_secs(2);
/// Offsets of the extra heartbeat probes sent in the first pong retry.
const REPING_DELAYS: [Duration; 2] = [Duration::from_secs(2), Duration::from_secs(4)];
/// Offsets of the resume requests sent in the last pong retry.
const RESUME_DELAYS: [Duration; 2] = [Duration::from_secs(8), Duration::from_secs(16)];

const INPUT_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 64;

/// Tunable timing of a session. The defaults mirror the platform's
/// documented expectations; tests shrink or pause them.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether to negotiate payload compression at provisioning time.
    pub compress: bool,
    /// How long to wait for the handshake result after a socket opens.
    pub handshake_timeout: Duration,
    /// How long to wait for a heartbeat reply.
    pub pong_timeout: Duration,
    /// How long to wait for a resume acknowledgement.
    pub resume_ok_timeout: Duration,
    /// Steady-state heartbeat cadence.
    pub heartbeat_interval: Duration,
    /// Backoff policy for post-disconnect re-provisioning.
    pub backoff: BackoffConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compress: true,
            handshake_timeout: Duration::from_secs(6),
            pong_timeout: Duration::from_secs(6),
            resume_ok_timeout: Duration::from_secs(6),
            heartbeat_interval: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

/// What a guarded timer does when it fires in the right state.
#[derive(Debug, Clone, Copy)]
enum TimerAction {
    /// Move to the given state.
    Transition(SessionState),
    /// Fire one attempt of the post-disconnect provisioning loop.
    ProvisionAttempt,
    /// Send an extra heartbeat probe.
    SendHeartbeat,
    /// Send a resume request.
    SendResume,
    /// Steady-state heartbeat tick.
    HeartbeatTick,
}

/// Everything that can reach the session loop.
#[derive(Debug)]
enum Input {
    Timer {
        armed_in: SessionState,
        action: TimerAction,
    },
    Provisioned {
        armed_in: SessionState,
        result: Result<GatewayEndpoint, ProvisionError>,
    },
    SocketReady {
        armed_in: SessionState,
        socket: SocketHandle,
    },
    Shutdown,
}

/// Handle for observing and stopping a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<AtomicSessionState>,
    input_tx: mpsc::Sender<Input>,
}

impl SessionHandle {
    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Ask the session loop to stop.
    pub async fn shutdown(&self) {
        let _ = self.input_tx.send(Input::Shutdown).await;
    }
}

/// The session actor. Construct with [`GatewaySession::new`], then
/// drive it with [`GatewaySession::run`].
pub struct GatewaySession<P, T> {
    config: SessionConfig,
    provisioner: Arc<P>,
    transport: Arc<T>,
    state: Arc<AtomicSessionState>,
    tracker: SequenceTracker,
    socket: Option<SocketHandle>,
    heartbeat: Option<JoinHandle<()>>,
    backoff_attempt: u32,
    input_tx: mpsc::Sender<Input>,
    input_rx: mpsc::Receiver<Input>,
    envelope_tx: mpsc::Sender<Envelope>,
    envelope_rx: mpsc::Receiver<Envelope>,
    events_tx: mpsc::Sender<SessionEvent>,
}

enum Step {
    Input(Option<Input>),
    Inbound(Option<Envelope>),
}

impl<P: Provisioner, T: Transport> GatewaySession<P, T> {
    /// Build a session in the initial provisioning state.
    ///
    /// Returns the actor itself, a handle for observation and
    /// shutdown, and the receiver the host consumes events from.
    #[must_use]
    pub fn new(
        provisioner: Arc<P>,
        transport: Arc<T>,
        config: SessionConfig,
    ) -> (Self, SessionHandle, mpsc::Receiver<SessionEvent>) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        let (envelope_tx, envelope_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let state = Arc::new(AtomicSessionState::new(SessionState::OpeningGateway));
        let handle = SessionHandle {
            state: Arc::clone(&state),
            input_tx: input_tx.clone(),
        };
        let session = Self {
            config,
            provisioner,
            transport,
            state,
            tracker: SequenceTracker::new(),
            socket: None,
            heartbeat: None,
            backoff_attempt: 0,
            input_tx,
            input_rx,
            envelope_tx,
            envelope_rx,
            events_tx,
        };
        (session, handle, events_rx)
    }

    /// Run the session until shutdown or a fatal failure.
    ///
    /// A fatal failure emits [`SessionEvent::SevereError`] before the
    /// error is returned; recoverable trouble never surfaces here.
    pub async fn run(mut self) -> Result<(), GatewayError> {
        info!(state = %self.current(), "gateway session starting");
        self.enter_state();
        loop {
            let step = tokio::select! {
                input = self.input_rx.recv() => Step::Input(input),
                envelope = self.envelope_rx.recv() => Step::Inbound(envelope),
            };
            match step {
                Step::Input(None) | Step::Input(Some(Input::Shutdown)) => {
                    info!("gateway session stopping");
                    return Ok(());
                }
                Step::Input(Some(input)) => self.handle_input(input).await?,
                Step::Inbound(Some(envelope)) => self.handle_envelope(envelope).await,
                Step::Inbound(None) => {}
            }
        }
    }

    fn current(&self) -> SessionState {
        self.state.load()
    }

    /// Transition to `target` and run its entry actions. A transition
    /// to the current state is a logged no-op, so a state's timers and
    /// side effects are never armed twice.
    fn set_state(&mut self, target: SessionState) {
        let current = self.current();
        if current == target {
            warn!(state = %current, "already in state, ignoring transition");
            return;
        }
        info!(from = %current, to = %target, "session state changed");
        self.state.store(target);
        self.enter_state();
    }

    fn enter_state(&mut self) {
        match self.current() {
            SessionState::OpeningGateway
            | SessionState::OpeningGatewayFirstRetry
            | SessionState::OpeningGatewayLastRetry => {
                self.stop_heartbeat();
                self.socket = None;
                self.spawn_provision(GatewayRequest::fresh(self.config.compress));
            }
            // The dead socket is kept until a replacement opens, so
            // late resume probes still reach the wire.
            SessionState::OpeningGatewayAfterDisconnect => {
                self.stop_heartbeat();
                self.backoff_attempt = 1;
                let delay = self.config.backoff.delay_for_attempt(self.backoff_attempt);
                self.arm(delay, TimerAction::ProvisionAttempt);
            }
            SessionState::WaitingForHandshake => {
                self.stop_heartbeat();
                self.arm(
                    self.config.handshake_timeout + STATE_HOP_DELAY,
                    TimerAction::Transition(SessionState::OpeningGateway),
                );
            }
            SessionState::Connected => self.ensure_heartbeat(),
            SessionState::WaitingForPong => {
                self.arm(
                    self.config.pong_timeout + STATE_HOP_DELAY,
                    TimerAction::Transition(SessionState::WaitingForPongFirstRetry),
                );
            }
            SessionState::WaitingForPongFirstRetry => {
                for delay in REPING_DELAYS {
                    self.arm(delay, TimerAction::SendHeartbeat);
                }
                self.arm(
                    self.config.pong_timeout + REPING_DELAYS[0] + REPING_DELAYS[1],
                    TimerAction::Transition(SessionState::WaitingForPongLastRetry),
                );
            }
            SessionState::WaitingForPongLastRetry => {
                for delay in RESUME_DELAYS {
                    self.arm(delay, TimerAction::SendResume);
                }
                self.arm(
                    RESUME_DELAYS[0],
                    TimerAction::Transition(SessionState::WaitingForResumeOk),
                );
            }
            SessionState::WaitingForResumeOk => {
                self.arm(
                    self.config.resume_ok_timeout,
                    TimerAction::Transition(SessionState::OpeningGatewayAfterDisconnect),
                );
            }
        }
    }

    /// Arm a guarded one-shot timer in the current state.
    fn arm(&self, delay: Duration, action: TimerAction) {
        let armed_in = self.current();
        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = input_tx.send(Input::Timer { armed_in, action }).await;
        });
    }

    /// Fire a provisioning request; the outcome comes back through the
    /// input channel tagged with the state it was started in.
    fn spawn_provision(&self, request: GatewayRequest) {
        let armed_in = self.current();
        let provisioner = Arc::clone(&self.provisioner);
        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            let result = provisioner.open_gateway(request).await;
            let _ = input_tx.send(Input::Provisioned { armed_in, result }).await;
        });
    }

    /// Open a socket against a provisioned endpoint; the handle comes
    /// back through the input channel.
    fn spawn_socket_open(&self, url: String) {
        let armed_in = self.current();
        let transport = Arc::clone(&self.transport);
        let inbound = self.envelope_tx.clone();
        let input_tx = self.input_tx.clone();
        let compressed = self.config.compress;
        tokio::spawn(async move {
            match transport.open(url.clone(), compressed, inbound).await {
                Ok(socket) => {
                    let _ = input_tx.send(Input::SocketReady { armed_in, socket }).await;
                }
                // The handshake timer drives recovery.
                Err(error) => warn!(%url, %error, "socket open failed"),
            }
        });
    }

    /// Start the heartbeat interval task if one is not already
    /// running. The task ticks immediately, then every interval; it
    /// makes no decisions of its own, the actor guards every tick and
    /// aborts the task when the session leaves the live cycle.
    fn ensure_heartbeat(&mut self) {
        if self.heartbeat.is_some() {
            return;
        }
        let input_tx = self.input_tx.clone();
        let period = self.config.heartbeat_interval;
        self.heartbeat = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let tick = Input::Timer {
                    armed_in: SessionState::Connected,
                    action: TimerAction::HeartbeatTick,
                };
                if input_tx.send(tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
    }

    async fn handle_input(&mut self, input: Input) -> Result<(), GatewayError> {
        match input {
            Input::Timer { armed_in, action } => self.handle_timer(armed_in, action).await,
            Input::Provisioned { armed_in, result } => {
                self.handle_provisioned(armed_in, result).await
            }
            Input::SocketReady { armed_in, socket } => {
                if self.current() == armed_in {
                    self.socket = Some(socket);
                } else {
                    debug!(armed_in = %armed_in, "socket from abandoned attempt, dropping");
                }
                Ok(())
            }
            // Handled in the run loop.
            Input::Shutdown => Ok(()),
        }
    }

    async fn handle_timer(
        &mut self,
        armed_in: SessionState,
        action: TimerAction,
    ) -> Result<(), GatewayError> {
        match action {
            TimerAction::Transition(target) => {
                if self.current() == armed_in {
                    self.set_state(target);
                } else {
                    debug!(armed_in = %armed_in, target = %target, "stale transition timer");
                }
            }
            TimerAction::ProvisionAttempt => {
                if self.current() == armed_in {
                    info!(attempt = self.backoff_attempt, "re-provisioning gateway endpoint");
                    let request = GatewayRequest::resume(
                        self.config.compress,
                        self.tracker.last_sn(),
                        self.tracker.session_id(),
                    );
                    self.spawn_provision(request);
                }
            }
            TimerAction::SendHeartbeat => {
                if self.current() == armed_in {
                    self.send_envelope(Envelope::ping(self.tracker.last_sn())).await;
                }
            }
            // Resume probes span the whole escalation episode: they
            // stay valid across the hops into the resume-wait and
            // post-disconnect states.
            TimerAction::SendResume => {
                let state = self.current();
                if state == SessionState::WaitingForPongLastRetry
                    || state == SessionState::WaitingForResumeOk
                    || state == SessionState::OpeningGatewayAfterDisconnect
                {
                    self.send_envelope(Envelope::resume(self.tracker.last_sn())).await;
                }
            }
            TimerAction::HeartbeatTick => {
                if self.current() == armed_in {
                    self.set_state(SessionState::WaitingForPong);
                    self.send_envelope(Envelope::ping(self.tracker.last_sn())).await;
                }
            }
        }
        Ok(())
    }

    async fn handle_provisioned(
        &mut self,
        armed_in: SessionState,
        result: Result<GatewayEndpoint, ProvisionError>,
    ) -> Result<(), GatewayError> {
        // A protocol violation poisons every later request; fatal even
        // when the attempt itself is stale.
        if let Err(ProvisionError::Protocol(message)) = &result {
            return self
                .severe(GatewayError::ProtocolViolation(message.clone()))
                .await;
        }
        if self.current() != armed_in {
            debug!(armed_in = %armed_in, "provisioning outcome from abandoned attempt");
            return Ok(());
        }
        match result {
            Ok(endpoint) => {
                info!(url = %endpoint.url, "gateway endpoint ready");
                self.set_state(SessionState::WaitingForHandshake);
                self.spawn_socket_open(endpoint.url);
                Ok(())
            }
            Err(error) => {
                warn!(state = %armed_in, %error, "gateway provisioning failed");
                match armed_in {
                    SessionState::OpeningGateway => {
                        self.arm(
                            STARTUP_FIRST_RETRY_DELAY,
                            TimerAction::Transition(SessionState::OpeningGatewayFirstRetry),
                        );
                        Ok(())
                    }
                    SessionState::OpeningGatewayFirstRetry => {
                        self.arm(
                            STARTUP_LAST_RETRY_DELAY,
                            TimerAction::Transition(SessionState::OpeningGatewayLastRetry),
                        );
                        Ok(())
                    }
                    SessionState::OpeningGatewayLastRetry => {
                        self.severe(GatewayError::ControlPlaneUnreachable(
                            "startup retries exhausted".to_string(),
                        ))
                        .await
                    }
                    SessionState::OpeningGatewayAfterDisconnect => {
                        self.backoff_attempt = self.backoff_attempt.saturating_add(1);
                        let delay = self.config.backoff.delay_for_attempt(self.backoff_attempt);
                        info!(
                            attempt = self.backoff_attempt,
                            delay_millis = delay.as_millis(),
                            "rescheduling re-provisioning"
                        );
                        self.arm(delay, TimerAction::ProvisionAttempt);
                        Ok(())
                    }
                    other => {
                        debug!(state = %other, "provisioning failure in unexpected state");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope.kind {
            EnvelopeKind::Event => {
                if let Some((sn, event)) = demux::route_event(&envelope) {
                    self.tracker.observe(sn);
                    let _ = self.events_tx.send(event).await;
                }
            }
            EnvelopeKind::HandshakeResult => {
                match serde_json::from_value::<HandshakePayload>(envelope.payload) {
                    Ok(payload) => {
                        info!(session_id = %payload.session_id, "handshake succeeded");
                        self.tracker.set_session_id(payload.session_id);
                        if self.current() == SessionState::WaitingForHandshake {
                            self.set_state(SessionState::Connected);
                        }
                    }
                    Err(error) => warn!(%error, "handshake result without session id"),
                }
            }
            EnvelopeKind::Ping => {
                debug!("server probe, replying with pong");
                self.send_envelope(Envelope::pong()).await;
            }
            EnvelopeKind::Pong => {
                let state = self.current();
                if state == SessionState::WaitingForPong
                    || state == SessionState::WaitingForPongFirstRetry
                {
                    self.set_state(SessionState::Connected);
                }
            }
            EnvelopeKind::Reconnect => {
                warn!("server requested full reconnect, wiping session continuity");
                self.tracker.reset();
                self.socket = None;
                let _ = self.events_tx.send(SessionEvent::Reset).await;
                self.set_state(SessionState::OpeningGateway);
            }
            EnvelopeKind::ResumeAck => {
                match serde_json::from_value::<ResumeAckPayload>(envelope.payload) {
                    Ok(payload) => {
                        info!(session_id = %payload.session_id, "resume acknowledged");
                        self.tracker.set_session_id(payload.session_id);
                        if self.current() == SessionState::WaitingForResumeOk {
                            self.set_state(SessionState::Connected);
                        }
                    }
                    Err(error) => warn!(%error, "resume ack without session id"),
                }
            }
            EnvelopeKind::Resume => debug!("ignoring unexpected inbound resume"),
        }
    }

    async fn send_envelope(&self, envelope: Envelope) {
        if let Some(socket) = &self.socket {
            if let Err(error) = socket.send(envelope).await {
                warn!(%error, "dropping outbound envelope");
            }
        } else {
            warn!("no live socket, dropping outbound envelope");
        }
    }

    /// Emit the fatal event, then return the error that stops the
    /// session loop.
    async fn severe(&mut self, error: GatewayError) -> Result<(), GatewayError> {
        error!(%error, "fatal session failure");
        let _ = self
            .events_tx
            .send(SessionEvent::SevereError(error.to_string()))
            .await;
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use super::*;

    struct PendingProvisioner;

    impl Provisioner for PendingProvisioner {
        fn open_gateway(
            &self,
            _request: GatewayRequest,
        ) -> impl Future<Output = Result<GatewayEndpoint, ProvisionError>> + Send {
            std::future::pending()
        }
    }

    struct PendingTransport;

    impl Transport for PendingTransport {
        fn open(
            &self,
            _url: String,
            _compressed: bool,
            _inbound: mpsc::Sender<Envelope>,
        ) -> impl Future<Output = Result<SocketHandle, GatewayError>> + Send {
            std::future::pending()
        }
    }

    fn make_session() -> (
        GatewaySession<PendingProvisioner, PendingTransport>,
        SessionHandle,
        mpsc::Receiver<SessionEvent>,
    ) {
        GatewaySession::new(
            Arc::new(PendingProvisioner),
            Arc::new(PendingTransport),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_same_state_transition_is_ignored() {
        let (mut session, handle, _events) = make_session();
        assert_eq!(handle.state(), SessionState::OpeningGateway);

        session.set_state(SessionState::OpeningGateway);
        assert_eq!(handle.state(), SessionState::OpeningGateway);
    }

    #[tokio::test]
    async fn test_stale_timer_is_ignored() {
        let (mut session, handle, _events) = make_session();

        session
            .handle_timer(
                SessionState::Connected,
                TimerAction::Transition(SessionState::WaitingForPong),
            )
            .await
            .expect("no fatal");
        assert_eq!(handle.state(), SessionState::OpeningGateway);
    }

    #[tokio::test]
    async fn test_handshake_result_connects_and_stores_session() {
        let (mut session, handle, _events) = make_session();
        session.state.store(SessionState::WaitingForHandshake);

        session
            .handle_envelope(Envelope::handshake_result("sess-9"))
            .await;

        assert_eq!(handle.state(), SessionState::Connected);
        assert_eq!(session.tracker.session_id(), "sess-9");
    }

    #[tokio::test]
    async fn test_pong_recovers_only_from_wait_states() {
        let (mut session, handle, _events) = make_session();

        session.handle_envelope(Envelope::pong()).await;
        assert_eq!(handle.state(), SessionState::OpeningGateway);

        session.state.store(SessionState::WaitingForPong);
        session.handle_envelope(Envelope::pong()).await;
        assert_eq!(handle.state(), SessionState::Connected);

        session.state.store(SessionState::WaitingForPongFirstRetry);
        session.handle_envelope(Envelope::pong()).await;
        assert_eq!(handle.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_wipes_continuity() {
        let (mut session, handle, mut events) = make_session();
        session.state.store(SessionState::Connected);
        session.tracker.observe(42);
        session.tracker.set_session_id("sess-1");

        session.handle_envelope(Envelope::reconnect()).await;

        assert_eq!(handle.state(), SessionState::OpeningGateway);
        assert_eq!(session.tracker.last_sn(), 0);
        assert!(session.tracker.session_id().is_empty());
        assert!(matches!(events.recv().await, Some(SessionEvent::Reset)));
    }

    #[tokio::test]
    async fn test_resume_ack_recovers_only_from_resume_wait() {
        let (mut session, handle, _events) = make_session();

        session.handle_envelope(Envelope::resume_ack("sess-2")).await;
        assert_eq!(handle.state(), SessionState::OpeningGateway);
        assert_eq!(session.tracker.session_id(), "sess-2");

        session.state.store(SessionState::WaitingForResumeOk);
        session.handle_envelope(Envelope::resume_ack("sess-2")).await;
        assert_eq!(handle.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_heartbeat_task_lifecycle_is_actor_owned() {
        let (mut session, _handle, _events) = make_session();
        session.set_state(SessionState::WaitingForHandshake);
        session.set_state(SessionState::Connected);
        assert!(session.heartbeat.is_some());

        // The task survives the escalation tiers; its ticks are
        // guarded by the actor instead.
        session.set_state(SessionState::WaitingForPong);
        assert!(session.heartbeat.is_some());
        session.set_state(SessionState::WaitingForResumeOk);
        assert!(session.heartbeat.is_some());

        // Re-entering the connected state while the task is alive
        // must not lose it, and leaving the live cycle stops it.
        session.set_state(SessionState::Connected);
        assert!(session.heartbeat.is_some());
        session.set_state(SessionState::OpeningGatewayAfterDisconnect);
        assert!(session.heartbeat.is_none());

        // The next connected entry gets a fresh task.
        session.set_state(SessionState::WaitingForHandshake);
        session.set_state(SessionState::Connected);
        assert!(session.heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_stale_socket_is_dropped() {
        let (mut session, _handle, _events) = make_session();
        let (tx, _rx) = mpsc::channel(1);

        session
            .handle_input(Input::SocketReady {
                armed_in: SessionState::WaitingForHandshake,
                socket: SocketHandle::new(tx),
            })
            .await
            .expect("no fatal");
        assert!(session.socket.is_none());
    }

    #[tokio::test]
    async fn test_last_retry_failure_is_fatal() {
        let (mut session, _handle, mut events) = make_session();
        session.state.store(SessionState::OpeningGatewayLastRetry);

        let result = session
            .handle_provisioned(
                SessionState::OpeningGatewayLastRetry,
                Err(ProvisionError::Transient("still down".to_string())),
            )
            .await;

        assert!(matches!(result, Err(GatewayError::ControlPlaneUnreachable(_))));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::SevereError(_))
        ));
    }

    #[tokio::test]
    async fn test_protocol_violation_is_fatal_even_when_stale() {
        let (mut session, _handle, mut events) = make_session();

        let result = session
            .handle_provisioned(
                SessionState::OpeningGatewayAfterDisconnect,
                Err(ProvisionError::Protocol("bucket mismatch".to_string())),
            )
            .await;

        assert!(matches!(result, Err(GatewayError::ProtocolViolation(_))));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::SevereError(_))
        ));
    }
}
