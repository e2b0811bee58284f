// Session engine
//
// The orchestrator owns the entire lifecycle of one assessment attempt.
// All inputs (transport events, microphone frames, camera chunks, the
// liveness tick, and control commands) are multiplexed through a
// single select loop, so no two handlers ever run concurrently and no
// lock guards session state. Every termination path (agent decision,
// manual stop, security violation, hard timeout, fatal error) funnels
// through the decision arbiter, which guarantees exactly one final
// result.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::audio::backend::{AudioFrame, AudioTrack, CaptureBackend};
use crate::audio::capture::CapturePipeline;
use crate::audio::codec;
use crate::audio::playback::PlaybackScheduler;
use crate::audio::recorder::{RecorderInput, SessionRecorder};
use crate::error::EngineError;
use crate::session::config::{SessionConfig, SessionDescriptor};
use crate::session::decision::{DecisionArbiter, Submission, Verdict};
use crate::session::liveness::{LivenessAction, LivenessMonitor};
use crate::session::outcome::{SessionOutcome, SessionStats, SessionStatus};
use crate::session::transcript::TranscriptAssembler;
use crate::transport::supervisor::{ConnectionState, ConnectionSupervisor, DropDisposition};
use crate::transport::{DialogueConnection, DialogueConnector, PlaybackSink, ServerEvent};

const CHECK_IN_PROMPT: &str = "SYSTEM: The candidate has been silent for a while. \
    Briefly check in and ask if they need the question repeated.";

const FORCE_FAIL_PROMPT: &str = "SYSTEM: The candidate is unresponsive after repeated \
    check-ins. Conclude the interview now and submit a failing result for unresponsiveness.";

const CONCLUDE_PROMPT: &str = "SYSTEM: The interview time limit has been reached. \
    Conclude immediately and submit your result now.";

/// Control signals from the surrounding application.
#[derive(Debug)]
pub enum SessionCommand {
    /// Candidate clicked "end interview".
    ManualStop,
    /// Proctoring violation (tab switch, focus loss) auto-terminating
    /// the session.
    SecurityViolation { detail: String },
}

/// Control handle for a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Request an early termination.
    ///
    /// If the agent already rendered its decision, that decision is the
    /// result; otherwise the session finalizes as terminated by the
    /// candidate. Returns false once the session has ended.
    pub async fn manual_stop(&self) -> bool {
        self.commands.send(SessionCommand::ManualStop).await.is_ok()
    }

    /// Report a proctoring violation.
    pub async fn report_violation(&self, detail: impl Into<String>) -> bool {
        self.commands
            .send(SessionCommand::SecurityViolation {
                detail: detail.into(),
            })
            .await
            .is_ok()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

/// All mutable session state, owned by the engine's event loop.
///
/// Handlers borrow this one struct; nothing is shared across tasks.
struct SessionState {
    descriptor: SessionDescriptor,
    config: SessionConfig,
    supervisor: ConnectionSupervisor,
    scheduler: PlaybackScheduler,
    pipeline: CapturePipeline,
    liveness: LivenessMonitor,
    transcript: TranscriptAssembler,
    arbiter: DecisionArbiter,
    started: Instant,
    started_at: DateTime<Utc>,
    frames_sent: u64,
    reconnects: u32,
}

impl SessionState {
    fn new(descriptor: SessionDescriptor, config: SessionConfig) -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(
                config.retry_budget(),
                config.rejection_window(),
            ),
            scheduler: PlaybackScheduler::new(config.sample_rate),
            pipeline: CapturePipeline::new(config.pipeline()),
            liveness: LivenessMonitor::new(config.liveness()),
            transcript: TranscriptAssembler::new(),
            arbiter: DecisionArbiter::new(),
            started: Instant::now(),
            started_at: Utc::now(),
            frames_sent: 0,
            reconnects: 0,
            descriptor,
            config,
        }
    }

    /// Session clock: time since the engine started.
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Route scheduled agent buffers whose start time has arrived to the
    /// direct-listen output and the recording mix.
    async fn drain_due(
        &mut self,
        now: Duration,
        sink: &dyn PlaybackSink,
        recorder_tx: &mpsc::Sender<RecorderInput>,
    ) {
        for buffer in self.scheduler.pop_due(now) {
            if let Err(e) = sink.play(&buffer.samples).await {
                debug!("Playback sink rejected buffer: {}", e);
            }

            let frame = AudioFrame {
                samples: buffer.samples,
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
                timestamp_ms: buffer.starts_at.as_millis() as u64,
                track: AudioTrack::Agent,
            };
            let _ = recorder_tx.try_send(RecorderInput::Audio(frame));
        }
    }
}

pub struct SessionEngine {
    descriptor: SessionDescriptor,
    config: SessionConfig,
    connector: Arc<dyn DialogueConnector>,
    capture: Box<dyn CaptureBackend>,
    playback_sink: Arc<dyn PlaybackSink>,
    commands: mpsc::Receiver<SessionCommand>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionEngine {
    pub fn new(
        descriptor: SessionDescriptor,
        config: SessionConfig,
        connector: Arc<dyn DialogueConnector>,
        capture: Box<dyn CaptureBackend>,
        playback_sink: Arc<dyn PlaybackSink>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (status_tx, status_rx) =
            watch::channel(SessionStatus::initial(descriptor.session_id.clone()));

        let handle = SessionHandle {
            commands: command_tx,
            status: status_rx,
        };

        let engine = Self {
            descriptor,
            config,
            connector,
            capture,
            playback_sink,
            commands: command_rx,
            status_tx,
        };

        (engine, handle)
    }

    /// Run the session to its single terminal result.
    ///
    /// Ok is the finalized outcome (pass/fail/terminated); Err is one of
    /// the fatal taxonomy errors from `EngineError`. Either way, all
    /// held resources are released exactly once.
    pub async fn run(self) -> Result<SessionOutcome, EngineError> {
        let SessionEngine {
            descriptor,
            config,
            connector,
            mut capture,
            playback_sink,
            mut commands,
            status_tx,
        } = self;

        let mut state = SessionState::new(descriptor, config);

        info!("Starting screening session {}", state.descriptor.session_id);
        state.supervisor.set_state(ConnectionState::Initializing);
        push_status(&status_tx, &state);

        // Candidate media; failure here is fatal to initialization
        let streams = match capture.start().await {
            Ok(streams) => streams,
            Err(e) => {
                state.supervisor.set_state(ConnectionState::Error);
                push_status(&status_tx, &state);
                return Err(EngineError::MediaAccess(format!("{:#}", e)));
            }
        };
        let mut mic_rx = streams.audio;
        let mut camera_rx = streams.video;

        // Recording is best-effort: a broken recorder never kills the session
        let recorder = SessionRecorder::start(state.config.recorder());
        let recorder_tx = recorder.sender();

        // First connection; a sub-second rejection is fatal with zero retries
        let (connection, mut attempt_started) =
            match establish(&mut state, connector.as_ref()).await {
                Ok(ok) => ok,
                Err(fatal) => {
                    if let Err(e) = capture.stop().await {
                        warn!("Capture stop failed: {}", e);
                    }
                    drop(recorder_tx);
                    let _ = recorder.stop(state.config.recorder_stop_grace()).await;
                    state.supervisor.end();
                    push_status(&status_tx, &state);
                    return Err(fatal);
                }
            };
        let DialogueConnection {
            mut handle,
            mut events,
        } = connection;

        push_status(&status_tx, &state);

        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; consume it so elapsed math
        // starts from a clean baseline
        tick.tick().await;
        let mut last_tick = state.now();

        let mut mic_open = true;
        let mut camera_open = true;
        let mut commands_open = true;

        let result: Result<Verdict, EngineError> = 'session: loop {
            tokio::select! {
                biased;

                event = events.recv() => {
                    let now = state.now();
                    let mut connection_lost: Option<String> = None;

                    match event {
                        Some(ServerEvent::Opened) => {
                            state.supervisor.on_open();
                            push_status(&status_tx, &state);
                        }
                        Some(ServerEvent::AudioFrame(bytes)) => {
                            match codec::decode_frame(&bytes) {
                                Ok(samples) => {
                                    state.scheduler.enqueue(samples, now);
                                    state
                                        .drain_due(now, playback_sink.as_ref(), &recorder_tx)
                                        .await;
                                }
                                Err(e) => warn!("Dropping malformed agent audio frame: {}", e),
                            }
                        }
                        Some(ServerEvent::PartialTranscript { speaker, text }) => {
                            state.transcript.push_partial(speaker, &text);
                        }
                        Some(ServerEvent::TurnComplete) => {
                            state.transcript.complete_turn();
                        }
                        Some(ServerEvent::Interrupted) => {
                            let dropped = state.scheduler.flush(now);
                            if dropped > 0 {
                                debug!(
                                    "Flushed {} scheduled agent buffers on interruption",
                                    dropped
                                );
                            }
                            state.transcript.interrupt_agent();
                        }
                        Some(ServerEvent::ToolCall { name, args, id }) => {
                            if name == state.config.decision_tool {
                                match parse_verdict(&args) {
                                    Ok(verdict) => {
                                        match state.arbiter.submit(verdict.clone()) {
                                            Submission::Accepted => {
                                                info!(
                                                    "Agent decision received: passed={}",
                                                    verdict.passed
                                                );

                                                // Ack before teardown so the agent
                                                // sees the call land
                                                let ack = serde_json::json!({
                                                    "status": "acknowledged"
                                                });
                                                if let Err(e) =
                                                    handle.send_tool_response(&id, ack).await
                                                {
                                                    debug!(
                                                        "Tool response not delivered: {}",
                                                        e
                                                    );
                                                }

                                                if let Some(v) = state
                                                    .arbiter
                                                    .finalize_with(|| verdict.clone())
                                                {
                                                    break 'session Ok(v);
                                                }
                                            }
                                            Submission::DuplicateIgnored
                                            | Submission::AlreadyFinalized => {}
                                        }
                                    }
                                    Err(e) => warn!("Malformed decision payload: {}", e),
                                }
                            } else {
                                warn!("Ignoring unknown tool call: {}", name);
                            }
                        }
                        Some(ServerEvent::Closed { code }) => {
                            info!("Transport closed (code {:?})", code);
                            connection_lost = Some(format!("closed (code {:?})", code));
                        }
                        Some(ServerEvent::Error { message }) => {
                            warn!("Transport error: {}", message);
                            connection_lost = Some(message);
                        }
                        None => {
                            connection_lost = Some("event stream ended".to_string());
                        }
                    }

                    if let Some(reason) = connection_lost {
                        match recover(
                            &mut state,
                            connector.as_ref(),
                            attempt_started.elapsed(),
                            &reason,
                        )
                        .await
                        {
                            Ok((new_connection, started)) => {
                                // The previous transport handle is never reused
                                handle = new_connection.handle;
                                events = new_connection.events;
                                attempt_started = started;
                                push_status(&status_tx, &state);
                            }
                            Err(fatal) => break 'session Err(fatal),
                        }
                    }
                }

                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(SessionCommand::ManualStop) => {
                            if let Some(verdict) = state.arbiter.finalize_with(|| Verdict {
                                passed: false,
                                reason: "Terminated by candidate".to_string(),
                            }) {
                                info!("Manual stop: finalizing with passed={}", verdict.passed);
                                break 'session Ok(verdict);
                            }
                        }
                        Some(SessionCommand::SecurityViolation { detail }) => {
                            if let Some(verdict) = state.arbiter.finalize_with(|| Verdict {
                                passed: false,
                                reason: format!("Security violation: {}", detail),
                            }) {
                                warn!("Finalizing on security violation: {}", verdict.reason);
                                break 'session Ok(verdict);
                            }
                        }
                        None => {
                            // Control handle dropped; the session runs unattended
                            commands_open = false;
                        }
                    }
                }

                frame = mic_rx.recv(), if mic_open => {
                    match frame {
                        Some(frame) => {
                            let now = state.now();
                            let processed = state.pipeline.process(&frame);

                            if processed.speech {
                                state.liveness.observe_speech(now);
                            }

                            // Recording keeps its own pace; drop on backlog
                            let _ = recorder_tx.try_send(RecorderInput::Audio(frame));

                            if let Some(wire) = processed.wire {
                                if state.supervisor.state() == ConnectionState::Connected {
                                    match handle.send_audio_frame(&wire).await {
                                        Ok(()) => state.frames_sent += 1,
                                        // Not buffered, not retried: a missed
                                        // frame beats unbounded backlog
                                        Err(e) => debug!("Dropping mic frame: {}", e),
                                    }
                                }
                            }
                        }
                        None => {
                            warn!("Microphone stream ended");
                            mic_open = false;
                        }
                    }
                }

                chunk = camera_rx.recv(), if camera_open => {
                    match chunk {
                        Some(chunk) => {
                            let _ = recorder_tx.try_send(RecorderInput::Video(chunk));
                        }
                        None => camera_open = false,
                    }
                }

                _ = tick.tick() => {
                    let now = state.now();
                    let elapsed = now.saturating_sub(last_tick);
                    last_tick = now;

                    state.drain_due(now, playback_sink.as_ref(), &recorder_tx).await;

                    let connected =
                        state.supervisor.state() == ConnectionState::Connected;
                    let agent_speaking = state.scheduler.is_speaking(now);

                    for action in state.liveness.tick(now, elapsed, connected, agent_speaking) {
                        match action {
                            LivenessAction::CheckIn { strike } => {
                                warn!("Silence strike {}: prompting agent to check in", strike);
                                if let Err(e) = handle.send_text(CHECK_IN_PROMPT).await {
                                    debug!("Check-in prompt not delivered: {}", e);
                                }
                            }
                            LivenessAction::ForceFail { strike } => {
                                warn!(
                                    "Silence strike {}: instructing agent to fail for \
                                     unresponsiveness",
                                    strike
                                );
                                if let Err(e) = handle.send_text(FORCE_FAIL_PROMPT).await {
                                    debug!("Forced-fail prompt not delivered: {}", e);
                                }
                            }
                            LivenessAction::BudgetExpired => {
                                info!("Time budget exhausted, asking the agent to conclude");
                                if let Err(e) = handle.send_text(CONCLUDE_PROMPT).await {
                                    debug!("Conclusion prompt not delivered: {}", e);
                                }
                            }
                            LivenessAction::TimeoutFinalize => {
                                let budget = state.config.time_budget_secs;
                                if let Some(verdict) = state.arbiter.finalize_with(|| Verdict {
                                    passed: false,
                                    reason: format!(
                                        "Interview time limit reached ({}s)",
                                        budget
                                    ),
                                }) {
                                    warn!(
                                        "Hard timeout: finalizing with passed={}",
                                        verdict.passed
                                    );
                                    break 'session Ok(verdict);
                                }
                            }
                        }
                    }

                    push_status(&status_tx, &state);
                }
            }
        };

        // Finalization: stop every subsystem exactly once, flush what
        // remains, emit the one terminal result
        state.supervisor.shutdown();

        if let Err(e) = capture.stop().await {
            warn!("Capture stop failed: {}", e);
        }

        let now = state.now();
        state.scheduler.flush(now);

        drop(recorder_tx);
        let recording = recorder.stop(state.config.recorder_stop_grace()).await;

        if let Err(e) = handle.close().await {
            debug!("Transport close: {}", e);
        }

        state.supervisor.end();
        push_status(&status_tx, &state);

        let duration = state.now();

        match result {
            Ok(verdict) => {
                let transcript = state.transcript.finish();
                let stats = SessionStats {
                    started_at: state.started_at,
                    duration_secs: duration.as_secs_f64(),
                    frames_sent: state.frames_sent,
                    transcript_entries: transcript.len(),
                    reconnects: state.reconnects,
                };

                info!(
                    "Session {} finalized: passed={} ({})",
                    state.descriptor.session_id, verdict.passed, verdict.reason
                );

                Ok(SessionOutcome {
                    session_id: state.descriptor.session_id,
                    passed: verdict.passed,
                    reason: verdict.reason,
                    transcript,
                    recording,
                    stats,
                })
            }
            Err(e) => {
                error!("Session {} failed: {}", state.descriptor.session_id, e);
                Err(e)
            }
        }
    }
}

/// Connect with retries until open, fatal classification, or an
/// exhausted budget.
async fn establish(
    state: &mut SessionState,
    connector: &dyn DialogueConnector,
) -> Result<(DialogueConnection, Instant), EngineError> {
    loop {
        state.supervisor.begin_attempt();
        let attempt_started = Instant::now();

        match connector.connect(&state.descriptor).await {
            Ok(connection) => {
                state.supervisor.on_open();
                return Ok((connection, attempt_started));
            }
            Err(e) => {
                warn!("Connect attempt failed: {}", e);
                match state.supervisor.on_drop(attempt_started.elapsed()) {
                    DropDisposition::ConfigurationFailure => {
                        return Err(EngineError::Configuration(e.to_string()));
                    }
                    DropDisposition::RetriesExhausted { attempts } => {
                        return Err(EngineError::ConnectionLost {
                            attempts,
                            reason: e.to_string(),
                        });
                    }
                    DropDisposition::Suppressed => {
                        return Err(EngineError::ConnectionLost {
                            attempts: state.supervisor.attempts(),
                            reason: "session shutting down".to_string(),
                        });
                    }
                    DropDisposition::Reconnect { delay, attempt } => {
                        info!("Retrying connect in {:?} (attempt {})", delay, attempt);
                        tokio::time::sleep(delay).await;
                        state.reconnects += 1;
                    }
                }
            }
        }
    }
}

/// Handle a mid-session drop: classify, back off, reconnect.
async fn recover(
    state: &mut SessionState,
    connector: &dyn DialogueConnector,
    since_attempt: Duration,
    reason: &str,
) -> Result<(DialogueConnection, Instant), EngineError> {
    match state.supervisor.on_drop(since_attempt) {
        DropDisposition::ConfigurationFailure => {
            Err(EngineError::Configuration(reason.to_string()))
        }
        DropDisposition::RetriesExhausted { attempts } => Err(EngineError::ConnectionLost {
            attempts,
            reason: reason.to_string(),
        }),
        DropDisposition::Suppressed => Err(EngineError::ConnectionLost {
            attempts: state.supervisor.attempts(),
            reason: reason.to_string(),
        }),
        DropDisposition::Reconnect { delay, attempt } => {
            warn!(
                "Transient drop ({}), reconnecting in {:?} (attempt {})",
                reason, delay, attempt
            );
            tokio::time::sleep(delay).await;
            state.reconnects += 1;
            establish(state, connector).await
        }
    }
}

fn push_status(status_tx: &watch::Sender<SessionStatus>, state: &SessionState) {
    let now = state.now();
    let _ = status_tx.send(SessionStatus {
        session_id: state.descriptor.session_id.clone(),
        state: state.supervisor.state(),
        elapsed_secs: now.as_secs_f64(),
        strikes: state.liveness.strikes(),
        transcript_entries: state.transcript.entries().len(),
        agent_speaking: state.scheduler.is_speaking(now),
    });
}

#[derive(Debug, Deserialize)]
struct DecisionArgs {
    passed: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse the decision tool's `{passed, reason}` arguments.
fn parse_verdict(args: &serde_json::Value) -> Result<Verdict, serde_json::Error> {
    let parsed: DecisionArgs = serde_json::from_value(args.clone())?;

    Ok(Verdict {
        passed: parsed.passed,
        reason: parsed
            .reason
            .unwrap_or_else(|| "No reason provided".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict() {
        let args = serde_json::json!({"passed": true, "reason": "solid answers"});
        let verdict = parse_verdict(&args).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.reason, "solid answers");
    }

    #[test]
    fn test_parse_verdict_defaults_missing_reason() {
        let args = serde_json::json!({"passed": false});
        let verdict = parse_verdict(&args).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.reason, "No reason provided");
    }

    #[test]
    fn test_parse_verdict_rejects_missing_passed() {
        let args = serde_json::json!({"reason": "no verdict"});
        assert!(parse_verdict(&args).is_err());
    }
}
