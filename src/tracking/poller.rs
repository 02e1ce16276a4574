//! Polling synchronizer for one emergency visit.
//!
//! Fetches the visit immediately and then on every interval tick, replacing
//! the local snapshot wholesale. Each request carries a sequence number; a
//! response is applied only if it is newer than the last applied one and does
//! not move the status backwards. Polling stops for good once the visit is
//! finished or the handle is dropped. Errors that a retry cannot fix (auth
//! failures, rejected requests) stop it too; anything else waits for the
//! next tick.
//!
//! Fetches run concurrently with the timer, so a slow backend produces
//! overlapping requests rather than a stalled schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::route::{format_duration, RouteEstimator};
use crate::api::{ApiError, VisitSource};
use crate::config::ClientConfig;
use crate::models::{GeoPoint, VisitSnapshot, VisitStatus};
use crate::session::AuthFailure;

// ═══════════════════════════════════════════════════════════
// Policy and options
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between ticks. No backoff: a failed tick is simply
    /// retried at the next one.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl From<&ClientConfig> for PollPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval,
        }
    }
}

pub type EtaCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Optional ETA side effect: when an applied snapshot moves the supervisor,
/// ask the estimator for the remaining time and hand the formatted string
/// to the callback.
#[derive(Clone, Default)]
pub struct PollOptions {
    pub estimator: Option<Arc<dyn RouteEstimator>>,
    pub on_eta: Option<EtaCallback>,
}

// ═══════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════

/// Banner shown while the dispatcher waits on the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Waiting,
    Confirmed,
    Finished,
}

impl ConfirmationStatus {
    pub fn from_status(status: VisitStatus) -> Self {
        match status {
            VisitStatus::Assigned => Self::Waiting,
            VisitStatus::Confirmed | VisitStatus::InProgress => Self::Confirmed,
            VisitStatus::Finished => Self::Finished,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Waiting => "En espera de confirmación",
            Self::Confirmed => "Supervisor confirma visita",
            Self::Finished => "Visita Finalizada",
        }
    }
}

/// What happened to one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { location_changed: bool },
    /// An older request resolved after a newer one was applied.
    Stale,
    /// Newer request, but its status ranks below the displayed one.
    Regressed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub visit_id: i64,
    pub snapshot: Option<VisitSnapshot>,
    /// Last non-empty GPS fix seen. Responses without one keep the old pin.
    pub last_location: Option<GeoPoint>,
    pub confirmation: Option<ConfirmationStatus>,
    pub applied_seq: u64,
    pub requests_issued: u64,
    pub responses_discarded: u64,
    /// Terminal latch. Once set, no further request is issued.
    pub terminal: bool,
    pub auth_failure: Option<AuthFailure>,
    pub last_error: Option<String>,
    pub stopped: bool,
}

impl PollState {
    pub fn new(visit_id: i64) -> Self {
        Self {
            visit_id,
            snapshot: None,
            last_location: None,
            confirmation: None,
            applied_seq: 0,
            requests_issued: 0,
            responses_discarded: 0,
            terminal: false,
            auth_failure: None,
            last_error: None,
            stopped: false,
        }
    }

    /// Apply-if-newer with a forward-only status guard.
    pub fn apply(&mut self, seq: u64, snapshot: VisitSnapshot) -> ApplyOutcome {
        if seq <= self.applied_seq {
            self.responses_discarded += 1;
            return ApplyOutcome::Stale;
        }
        if let Some(current) = &self.snapshot {
            if snapshot.status.rank() < current.status.rank() {
                self.responses_discarded += 1;
                return ApplyOutcome::Regressed;
            }
        }

        let location_changed = match snapshot.last_known_location {
            Some(point) if self.last_location != Some(point) => {
                self.last_location = Some(point);
                true
            }
            _ => false,
        };

        self.applied_seq = seq;
        self.confirmation = Some(ConfirmationStatus::from_status(snapshot.status));
        self.terminal = snapshot.status.is_terminal();
        self.last_error = None;
        self.snapshot = Some(snapshot);
        ApplyOutcome::Applied { location_changed }
    }

    pub fn is_done(&self) -> bool {
        self.terminal || self.auth_failure.is_some()
    }
}

// ═══════════════════════════════════════════════════════════
// Handle
// ═══════════════════════════════════════════════════════════

/// Owner of a running poller. Dropping it stops polling.
pub struct PollerHandle {
    state: watch::Receiver<PollState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Request shutdown. In-flight requests are abandoned.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the loop to end (latch, auth failure or `stop`) and return
    /// the final state.
    pub async fn join(mut self) -> PollState {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Visit poller task failed");
            }
        }
        self.state()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ═══════════════════════════════════════════════════════════
// Loop
// ═══════════════════════════════════════════════════════════

/// Start polling `visit_id`. Must be called inside a Tokio runtime.
pub fn start(
    source: Arc<dyn VisitSource>,
    visit_id: i64,
    policy: PollPolicy,
    options: PollOptions,
) -> PollerHandle {
    let (state_tx, state_rx) = watch::channel(PollState::new(visit_id));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        tracing::info!(visit_id, interval_ms = policy.interval.as_millis() as u64, "Visit poller started");
        poll_loop(source, visit_id, policy, options, state_tx, shutdown_rx).await;
    });

    PollerHandle {
        state: state_rx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

type FetchResult = (u64, Result<Option<VisitSnapshot>, ApiError>);

async fn poll_loop(
    source: Arc<dyn VisitSource>,
    visit_id: i64,
    policy: PollPolicy,
    options: PollOptions,
    state_tx: watch::Sender<PollState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    // First tick completes immediately: fetch on start.
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: JoinSet<FetchResult> = JoinSet::new();
    let mut next_seq: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(visit_id, "Visit poller stopped by owner");
                break;
            }
            _ = ticker.tick() => {
                next_seq += 1;
                let seq = next_seq;
                let source = source.clone();
                in_flight.spawn(async move { (seq, source.fetch_visit(visit_id).await) });
                state_tx.send_modify(|s| s.requests_issued += 1);
            }
            Some(joined) = in_flight.join_next() => {
                let (seq, result) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        tracing::warn!(visit_id, error = %e, "Visit fetch task failed");
                        continue;
                    }
                };
                if handle_response(visit_id, seq, result, &options, &state_tx) {
                    break;
                }
            }
        }
    }

    in_flight.abort_all();
    state_tx.send_modify(|s| s.stopped = true);
}

/// Returns `true` when polling must stop.
fn handle_response(
    visit_id: i64,
    seq: u64,
    result: Result<Option<VisitSnapshot>, ApiError>,
    options: &PollOptions,
    state_tx: &watch::Sender<PollState>,
) -> bool {
    match result {
        Ok(Some(snapshot)) => {
            let destination = snapshot.destination;
            let mut outcome = ApplyOutcome::Stale;
            let mut moved_to = None;
            state_tx.send_modify(|s| {
                outcome = s.apply(seq, snapshot);
                moved_to = s.last_location;
            });

            match outcome {
                ApplyOutcome::Applied { location_changed } => {
                    if location_changed {
                        if let Some(from) = moved_to {
                            request_eta(visit_id, from, destination, options);
                        }
                    }
                    if state_tx.borrow().terminal {
                        tracing::info!(visit_id, seq, "Visit finished, polling stopped");
                        return true;
                    }
                }
                ApplyOutcome::Stale => {
                    tracing::debug!(visit_id, seq, "Discarding out-of-order visit response");
                }
                ApplyOutcome::Regressed => {
                    tracing::debug!(visit_id, seq, "Discarding visit response with earlier status");
                }
            }
            false
        }
        Ok(None) => {
            tracing::debug!(visit_id, seq, "Visit not found");
            false
        }
        Err(ApiError::Auth(failure)) => {
            tracing::warn!(visit_id, code = failure.code(), "Visit polling ended by authentication failure");
            state_tx.send_modify(|s| {
                s.auth_failure = Some(failure);
                s.last_error = Some(failure.message().to_string());
            });
            true
        }
        Err(e) if !e.is_retryable() => {
            tracing::error!(visit_id, seq, error = %e, "Visit polling ended by rejected request");
            state_tx.send_modify(|s| s.last_error = Some(e.to_string()));
            true
        }
        Err(e) => {
            tracing::warn!(visit_id, seq, error = %e, "Visit poll failed, retrying next tick");
            state_tx.send_modify(|s| s.last_error = Some(e.to_string()));
            false
        }
    }
}

fn request_eta(visit_id: i64, from: GeoPoint, to: GeoPoint, options: &PollOptions) {
    let (Some(estimator), Some(on_eta)) = (options.estimator.clone(), options.on_eta.clone()) else {
        return;
    };
    tokio::spawn(async move {
        match estimator.estimate(from, to).await {
            Ok(estimate) => on_eta(format_duration(estimate.duration_secs)),
            Err(e) => tracing::debug!(visit_id, error = %e, "ETA unavailable"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::route::{RouteError, RouteEstimate};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn snapshot(status: VisitStatus, location: Option<(f64, f64)>) -> VisitSnapshot {
        VisitSnapshot {
            visit_id: 311,
            case_id: Some("c-77".into()),
            status,
            last_known_location: location.map(|(lat, lng)| GeoPoint::new(lat, lng)),
            destination: GeoPoint::new(14.6349, -90.5069),
            scheduled_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()),
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap()),
            store_name: None,
            assignee_name: None,
            visit_type: None,
            objective: None,
            division: None,
        }
    }

    type Step = (Duration, Result<Option<VisitSnapshot>, ApiError>);

    /// Replays scripted responses, one per call, then repeats `fallback`.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Step>>,
        fallback: VisitStatus,
    }

    impl ScriptedSource {
        fn new(script: Vec<Step>, fallback: VisitStatus) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
                fallback,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisitSource for ScriptedSource {
        async fn fetch_visit(&self, _visit_id: i64) -> Result<Option<VisitSnapshot>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some((delay, result)) => {
                    tokio::time::sleep(delay).await;
                    result
                }
                None => Ok(Some(snapshot(self.fallback, None))),
            }
        }
    }

    fn fast() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5_000),
        }
    }

    #[test]
    fn apply_rejects_stale_and_regressed() {
        let mut state = PollState::new(311);
        assert_eq!(
            state.apply(2, snapshot(VisitStatus::Confirmed, None)),
            ApplyOutcome::Applied { location_changed: false }
        );
        assert_eq!(state.apply(1, snapshot(VisitStatus::Assigned, None)), ApplyOutcome::Stale);
        assert_eq!(state.apply(3, snapshot(VisitStatus::Assigned, None)), ApplyOutcome::Regressed);
        assert_eq!(state.snapshot.as_ref().unwrap().status, VisitStatus::Confirmed);
        assert_eq!(state.applied_seq, 2);
        assert_eq!(state.responses_discarded, 2);
    }

    #[test]
    fn apply_keeps_last_pin_when_location_missing() {
        let mut state = PollState::new(311);
        state.apply(1, snapshot(VisitStatus::Confirmed, Some((14.6, -90.5))));
        let outcome = state.apply(2, snapshot(VisitStatus::Confirmed, None));
        assert_eq!(outcome, ApplyOutcome::Applied { location_changed: false });
        assert_eq!(state.last_location, Some(GeoPoint::new(14.6, -90.5)));
        assert!(state.snapshot.as_ref().unwrap().last_known_location.is_none());
    }

    #[test]
    fn confirmation_banner_follows_status() {
        assert_eq!(
            ConfirmationStatus::from_status(VisitStatus::Assigned),
            ConfirmationStatus::Waiting
        );
        assert_eq!(
            ConfirmationStatus::from_status(VisitStatus::InProgress),
            ConfirmationStatus::Confirmed
        );
        assert_eq!(ConfirmationStatus::Finished.message(), "Visita Finalizada");
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_on_start() {
        let source = ScriptedSource::new(vec![], VisitStatus::Assigned);
        let handle = start(source.clone(), 311, fast(), PollOptions::default());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(handle.state().confirmation, Some(ConfirmationStatus::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_latch_stops_ticks() {
        let source = ScriptedSource::new(
            vec![
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Assigned, None)))),
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Confirmed, None)))),
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Finished, None)))),
            ],
            VisitStatus::Finished,
        );
        let handle = start(source.clone(), 311, fast(), PollOptions::default());
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.stopped).await.unwrap();

        let calls_at_latch = source.calls();
        assert_eq!(calls_at_latch, 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), calls_at_latch);

        let state = handle.join().await;
        assert!(state.terminal);
        assert_eq!(state.confirmation, Some(ConfirmationStatus::Finished));
        assert_eq!(state.requests_issued, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_response_is_discarded() {
        // Tick 1 (t=0) resolves at t=8s with an older status; tick 2 (t=5s)
        // resolves at t=6s with a newer one.
        let source = ScriptedSource::new(
            vec![
                (Duration::from_secs(8), Ok(Some(snapshot(VisitStatus::Assigned, None)))),
                (Duration::from_secs(1), Ok(Some(snapshot(VisitStatus::Confirmed, None)))),
            ],
            VisitStatus::Confirmed,
        );
        let handle = start(source.clone(), 311, fast(), PollOptions::default());

        tokio::time::sleep(Duration::from_millis(9_000)).await;
        let state = handle.state();
        assert_eq!(source.calls(), 2);
        assert_eq!(state.applied_seq, 2);
        assert_eq!(state.responses_discarded, 1);
        assert_eq!(state.snapshot.unwrap().status, VisitStatus::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_next_tick() {
        let source = ScriptedSource::new(
            vec![
                (Duration::ZERO, Err(ApiError::Connection("http://backend".into()))),
                (Duration::ZERO, Err(ApiError::Status { status: 503, body: String::new() })),
            ],
            VisitStatus::Confirmed,
        );
        let handle = start(source.clone(), 311, fast(), PollOptions::default());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let state = handle.state();
        assert!(state.last_error.is_some());
        assert!(state.snapshot.is_none());

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        let state = handle.state();
        assert_eq!(source.calls(), 3);
        assert!(state.last_error.is_none());
        assert_eq!(state.snapshot.unwrap().status, VisitStatus::Confirmed);
        assert!(!state.stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_stops_polling() {
        let source = ScriptedSource::new(
            vec![(Duration::ZERO, Err(ApiError::Auth(AuthFailure::Expired)))],
            VisitStatus::Assigned,
        );
        let handle = start(source.clone(), 311, fast(), PollOptions::default());
        let state = handle.join().await;

        assert_eq!(state.auth_failure, Some(AuthFailure::Expired));
        assert!(state.stopped);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_request_stops_polling() {
        let source = ScriptedSource::new(
            vec![(Duration::ZERO, Err(ApiError::NotAuthorized))],
            VisitStatus::Assigned,
        );
        let handle = start(source.clone(), 311, fast(), PollOptions::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = handle.state();
        assert!(state.stopped);
        assert!(state.auth_failure.is_none());
        assert_eq!(state.last_error.as_deref(), Some(ApiError::NotAuthorized.to_string().as_str()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let source = ScriptedSource::new(vec![], VisitStatus::Assigned);
        let handle = start(source.clone(), 311, fast(), PollOptions::default());
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 1);
    }

    struct FixedEstimator;

    #[async_trait]
    impl RouteEstimator for FixedEstimator {
        async fn estimate(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteEstimate, RouteError> {
            Ok(RouteEstimate {
                distance_m: 12_000.0,
                duration_secs: 75.0 * 60.0,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn eta_reported_when_location_changes() {
        let source = ScriptedSource::new(
            vec![
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Confirmed, Some((14.60, -90.52)))))),
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Confirmed, Some((14.60, -90.52)))))),
                (Duration::ZERO, Ok(Some(snapshot(VisitStatus::Confirmed, Some((14.62, -90.51)))))),
            ],
            VisitStatus::Finished,
        );
        let etas: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = etas.clone();
        let options = PollOptions {
            estimator: Some(Arc::new(FixedEstimator)),
            on_eta: Some(Arc::new(move |eta: String| sink.lock().unwrap().push(eta))),
        };
        let handle = start(source.clone(), 311, fast(), options);
        let state = handle.join().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(state.terminal);
        // Two distinct fixes; the repeated one does not trigger a new estimate.
        assert_eq!(*etas.lock().unwrap(), vec!["1 h 15 min", "1 h 15 min"]);
    }
}
