// Session client: lifecycle, polling reconciliation, reconnection.
//
// Owns the session identity, the working/baseline document snapshots,
// the participant set, the chat log, the activity log, and the polling
// cadence. A periodic timer fires poll-tick notifications; the caller
// answers each tick with diff-and-push and pull-and-merge. Restart and
// Rejoin recover from transient connectivity loss with a bounded
// fixed-delay retry.
//
// The session state mutex is never held across an await; requests are
// assembled under the lock, sent without it, and results are committed
// under a fresh lock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cuesync_common::protocol::{
    DeleteLinesRequest, GetSubtitleRequest, GetUpdatesRequest, InsertLineRequest, JoinRequest,
    LeaveRequest, SendMessageRequest, StartRequest, UpdateLineRequest, WireLine, WireSequence,
    WireUpdate, WireUser, MSG_OK, MSG_SESSION_ALREADY_RUNNING,
};
use cuesync_common::textcodec;
use cuesync_common::types::{ChatEntry, CueLine, Participant, PendingUpdate, UpdateAction};

use crate::activity::{ActivityEntry, ActivityLog};
use crate::retry::{self, Attempt, RetryOutcome, RetryPolicy};
use crate::transport::SyncTransport;

/// Two line times are considered equal within this many milliseconds.
const TIME_TOLERANCE_MS: f64 = 0.01;

// ── Notifications ───────────────────────────────────────────────────

/// Notifications exposed to the embedding application.
///
/// Callbacks fire outside the client's locks, so implementations may
/// call back into the client.
pub trait SessionListener: Send + Sync {
    /// One poll interval elapsed; the caller should run diff-and-push
    /// followed by pull-and-merge.
    fn on_poll_tick(&self) {}

    /// The activity log changed.
    fn on_activity_changed(&self) {}
}

/// Listener that ignores every notification.
pub struct NullListener;

impl SessionListener for NullListener {}

// ── Reconnection outcomes ───────────────────────────────────────────

/// Result of a successful Restart/Rejoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectStatus {
    /// The previous session was resumed in place.
    Resumed { message: String },
    /// The client rejoined the surviving server-side session; the
    /// caller must treat the working document as replaced.
    ReloadRequired { message: String },
}

/// What a single restart attempt produced.
enum StartOutcome {
    Resumed(String),
    SessionConflict,
}

// ── Session state ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    base_url: String,
    session_id: String,
    user_name: String,
    file_name: String,
    current_user: Option<Participant>,
    participants: Vec<Participant>,
    chat: Vec<ChatEntry>,
    /// Timestamp of the most recent successfully pulled update window.
    last_update_time: i64,
    working: Vec<CueLine>,
    baseline: Vec<CueLine>,
    original: Option<Vec<CueLine>>,
}

// ── Client ──────────────────────────────────────────────────────────

/// The synchronization client for one collaborative editing session.
pub struct SessionClient {
    transport: Arc<dyn SyncTransport>,
    listener: Arc<dyn SessionListener>,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    state: Mutex<SessionState>,
    log: ActivityLog,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionClient {
    /// Create a client bound to a working document and an optional
    /// original reference document.
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        working: Vec<CueLine>,
        original: Option<Vec<CueLine>>,
    ) -> Self {
        let state = SessionState { working, original, ..Default::default() };
        Self {
            transport,
            listener: Arc::new(NullListener),
            retry_policy: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            state: Mutex::new(state),
            log: ActivityLog::new(),
            poll_task: Mutex::new(None),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    // ── Read access ─────────────────────────────────────────────────

    pub fn session_id(&self) -> String {
        self.lock_state().session_id.clone()
    }

    pub fn file_name(&self) -> String {
        self.lock_state().file_name.clone()
    }

    pub fn current_user(&self) -> Option<Participant> {
        self.lock_state().current_user.clone()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.lock_state().participants.clone()
    }

    pub fn chat_log(&self) -> Vec<ChatEntry> {
        self.lock_state().chat.clone()
    }

    pub fn last_update_time(&self) -> i64 {
        self.lock_state().last_update_time
    }

    /// Snapshot of the working document.
    pub fn working_lines(&self) -> Vec<CueLine> {
        self.lock_state().working.clone()
    }

    /// Snapshot of the last-synchronized baseline. Read-only by
    /// contract: the baseline is only ever mutated by this client.
    pub fn baseline_lines(&self) -> Vec<CueLine> {
        self.lock_state().baseline.clone()
    }

    pub fn original_lines(&self) -> Option<Vec<CueLine>> {
        self.lock_state().original.clone()
    }

    /// Snapshot of the activity log, oldest entry first.
    pub fn activity_log(&self) -> Vec<ActivityEntry> {
        self.log.snapshot()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Host a new session. Returns the service's message; `"OK"` means
    /// the session started and polling is running. Any other message is
    /// handed back without touching local state, notably the
    /// session-already-running conflict, which callers must tell apart
    /// from a fatal failure by content.
    pub async fn start_server(
        &self,
        base_url: &str,
        session_key: &str,
        user_name: &str,
        file_name: &str,
    ) -> Result<String> {
        if session_key.trim().is_empty() {
            bail!("session key must not be empty");
        }
        if user_name.trim().is_empty() {
            bail!("user name must not be empty");
        }
        if file_name.trim().is_empty() {
            bail!("file name must not be empty");
        }

        let request = {
            let state = self.lock_state();
            StartRequest {
                session_id: session_key.to_string(),
                user_name: user_name.to_string(),
                file_name: file_name.to_string(),
                subtitle: to_wire_lines(&state.working),
                original_subtitle: state.original.as_deref().map(to_wire_lines).unwrap_or_default(),
            }
        };

        let response = self.transport.start(&request).await.context("Start request failed")?;
        if response.message != MSG_OK {
            return Ok(response.message);
        }

        let current = response.user.map(participant_from_wire).unwrap_or_else(|| Participant {
            user_name: user_name.to_string(),
            ip: String::new(),
            last_activity: Utc::now(),
        });

        {
            let mut state = self.lock_state();
            state.base_url = base_url.to_string();
            state.session_id = session_key.to_string();
            state.user_name = current.user_name.clone();
            state.file_name = file_name.to_string();
            state.participants = vec![current.clone()];
            state.current_user = Some(current);
            state.last_update_time = 0;
            state.baseline = state.working.clone();
        }
        self.log.clear();

        info!(session = session_key, user = user_name, "session started");
        self.start_polling();
        Ok(response.message)
    }

    /// Join an existing session. On a service rejection returns
    /// `(false, message)` with no local state changed; on success the
    /// working document and baseline are replaced with the server's
    /// copy, the participant set is adopted, and polling starts.
    pub async fn join(
        &self,
        base_url: &str,
        user_name: &str,
        session_key: &str,
    ) -> Result<(bool, String)> {
        if session_key.trim().is_empty() {
            bail!("session key must not be empty");
        }
        if user_name.trim().is_empty() {
            bail!("user name must not be empty");
        }

        let join_request = JoinRequest {
            session_id: session_key.to_string(),
            user_name: user_name.to_string(),
        };
        let response = self.transport.join(&join_request).await.context("Join request failed")?;
        if response.message != MSG_OK {
            return Ok((false, response.message));
        }

        // The service appends the newly joined user last; that ordering
        // determines who we are.
        let current = response
            .users
            .last()
            .cloned()
            .map(participant_from_wire)
            .ok_or_else(|| anyhow!("Join response contained no users"))?;

        // Pull everything before committing anything, so a failed pull
        // leaves no partial session behind.
        let subtitle_request = GetSubtitleRequest { session_id: session_key.to_string() };
        let subtitle = self
            .transport
            .get_subtitle(&subtitle_request)
            .await
            .context("GetSubtitle request failed")?;
        let original = self
            .transport
            .get_original_subtitle(&subtitle_request)
            .await
            .context("GetOriginalSubtitle request failed")?;

        let lines = from_wire_lines(&subtitle.subtitle);
        let original_lines = if original.subtitle.is_empty() {
            None
        } else {
            Some(from_wire_lines(&original.subtitle))
        };

        {
            let mut state = self.lock_state();
            state.base_url = base_url.to_string();
            state.session_id = session_key.to_string();
            state.user_name = current.user_name.clone();
            state.file_name = subtitle.file_name.clone();
            state.participants = response.users.into_iter().map(participant_from_wire).collect();
            state.current_user = Some(current);
            state.last_update_time = subtitle.update_time;
            state.baseline = lines.clone();
            state.working = lines;
            state.original = original_lines;
        }
        self.log.clear();

        info!(session = session_key, user = user_name, "joined session");
        self.start_polling();
        Ok((true, response.message))
    }

    /// Best-effort departure notification. Transport failures are
    /// swallowed; leaving must never block or fail local teardown.
    pub async fn leave(&self) {
        self.stop_polling();
        let request = {
            let state = self.lock_state();
            LeaveRequest {
                session_id: state.session_id.clone(),
                user_name: state.user_name.clone(),
            }
        };
        if let Err(error) = self.transport.leave(&request).await {
            warn!(%error, "Leave notification failed");
        }
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Replace the working document with the server's authoritative
    /// copy, advancing the update watermark. The baseline is untouched.
    pub async fn reload_subtitle(&self) -> Result<()> {
        let (lines, file_name, update_time) = self.fetch_document().await?;
        let mut state = self.lock_state();
        state.working = lines;
        state.file_name = file_name;
        state.last_update_time = update_time;
        Ok(())
    }

    /// Position-by-position diff of the baseline against the working
    /// copy; pushes an UpdateLine for every changed position in
    /// increasing index order. Returns the number of lines pushed.
    ///
    /// Only in-place edits are detected here; structural changes go
    /// through `insert_line`/`delete_lines`. A transport failure aborts
    /// the remaining lines in the batch; already-pushed lines stay
    /// pushed, the rest are re-detected on the next tick.
    pub async fn check_for_and_submit_updates(&self) -> Result<usize> {
        let changed: Vec<(usize, CueLine)> = {
            let state = self.lock_state();
            if state.working.len() != state.baseline.len() {
                warn!(
                    working = state.working.len(),
                    baseline = state.baseline.len(),
                    "document length changed outside insert/delete; diffing the overlap"
                );
            }
            let overlap = state.working.len().min(state.baseline.len());
            (0..overlap)
                .filter(|&i| line_changed(&state.baseline[i], &state.working[i]))
                .map(|i| (i, state.working[i].clone()))
                .collect()
        };

        let pushed = changed.len();
        for (index, line) in changed {
            self.update_line(index, &line).await?;
        }
        Ok(pushed)
    }

    /// Push one line's current times/text tagged with the current user,
    /// record an "update" activity entry, and notify synchronously.
    ///
    /// The baseline advances to the pushed value so the same change is
    /// not re-detected on the next diff.
    pub async fn update_line(&self, index: usize, line: &CueLine) -> Result<()> {
        let (session_id, user_name) = self.identity();
        let request = UpdateLineRequest {
            session_id,
            user_name: user_name.clone(),
            index: index as i32,
            sequence: WireSequence {
                start: line.start_ms as i64,
                end: line.end_ms as i64,
                text: textcodec::encode(&line.text),
            },
        };
        self.transport.update_line(&request).await.context("UpdateLine request failed")?;

        {
            let mut state = self.lock_state();
            if index < state.working.len() {
                state.working[index] = line.clone();
            }
            if index < state.baseline.len() {
                state.baseline[index] = line.clone();
            }
        }
        self.log.record(&user_name, index, UpdateAction::Update, Utc::now());
        self.listener.on_activity_changed();
        Ok(())
    }

    /// Apply a local edit to the working copy only. The next
    /// `check_for_and_submit_updates` detects and pushes it.
    pub fn edit_line(&self, index: usize, line: CueLine) -> Result<()> {
        let mut state = self.lock_state();
        if index >= state.working.len() {
            bail!("line index {index} out of range ({} lines)", state.working.len());
        }
        state.working[index] = line;
        Ok(())
    }

    /// Push a structural insert, mirror it into both local snapshots,
    /// and rebase the activity log.
    pub async fn insert_line(&self, index: usize, line: CueLine) -> Result<()> {
        let (session_id, user_name) = self.identity();
        let request = InsertLineRequest {
            session_id,
            user_name: user_name.clone(),
            index: index as i32,
            start: line.start_ms as i64,
            end: line.end_ms as i64,
            text: textcodec::encode(&line.text),
        };
        self.transport.insert_line(&request).await.context("InsertLine request failed")?;

        {
            let mut state = self.lock_state();
            let at = index.min(state.working.len());
            state.working.insert(at, line.clone());
            let at = index.min(state.baseline.len());
            state.baseline.insert(at, line);
        }
        self.log.shift_for_insert(index);
        info!(user = %user_name, index, "inserted line");
        self.listener.on_activity_changed();
        Ok(())
    }

    /// Push a structural delete for the given positions, mirror it into
    /// both local snapshots, and rebase the activity log.
    pub async fn delete_lines(&self, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let (session_id, user_name) = self.identity();
        let request = DeleteLinesRequest {
            session_id,
            user_name: user_name.clone(),
            indices: indices.iter().map(|&i| i as i32).collect(),
        };
        self.transport.delete_lines(&request).await.context("DeleteLines request failed")?;

        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        {
            let mut state = self.lock_state();
            // Highest first, so earlier removals don't shift the rest.
            for &index in sorted.iter().rev() {
                if index < state.working.len() {
                    state.working.remove(index);
                }
                if index < state.baseline.len() {
                    state.baseline.remove(index);
                }
            }
        }
        for &index in sorted.iter().rev() {
            self.log.shift_for_delete(index);
        }
        info!(user = %user_name, count = sorted.len(), "deleted lines");
        self.listener.on_activity_changed();
        Ok(())
    }

    /// Pull updates since the watermark. The watermark advances to the
    /// server-reported time even when no updates came back, so the same
    /// empty window is never fetched twice. Returns the decoded updates
    /// plus the service message and its reported line count; applying
    /// the updates is the caller's merge step.
    pub async fn get_updates(&self) -> Result<(Vec<PendingUpdate>, String, i32)> {
        let request = {
            let state = self.lock_state();
            GetUpdatesRequest {
                session_id: state.session_id.clone(),
                user_name: state.user_name.clone(),
                last_update_time: state.last_update_time,
            }
        };
        let response =
            self.transport.get_updates(&request).await.context("GetUpdates request failed")?;
        self.lock_state().last_update_time = response.new_update_time;

        let updates = response.updates.iter().map(pending_from_wire).collect();
        Ok((updates, response.message, response.number_of_lines))
    }

    /// Merge one pulled update into the local snapshots and the
    /// activity log. Updates with an unrecognized action are discarded.
    pub fn apply_remote_update(&self, update: &PendingUpdate) {
        let line =
            CueLine::new(update.start_ms as f64, update.end_ms as f64, update.text.clone());
        let at = entry_time(update.timestamp_ms);

        match update.action {
            UpdateAction::Update => {
                {
                    let mut state = self.lock_state();
                    if update.index < state.working.len() {
                        state.working[update.index] = line.clone();
                    }
                    if update.index < state.baseline.len() {
                        state.baseline[update.index] = line;
                    }
                }
                self.log.record(&update.user_name, update.index, UpdateAction::Update, at);
            }
            UpdateAction::Insert => {
                {
                    let mut state = self.lock_state();
                    let at_working = update.index.min(state.working.len());
                    state.working.insert(at_working, line.clone());
                    let at_baseline = update.index.min(state.baseline.len());
                    state.baseline.insert(at_baseline, line);
                }
                self.log.shift_for_insert(update.index);
                self.log.record(&update.user_name, update.index, UpdateAction::Insert, at);
            }
            UpdateAction::Delete => {
                {
                    let mut state = self.lock_state();
                    if update.index < state.working.len() {
                        state.working.remove(update.index);
                    }
                    if update.index < state.baseline.len() {
                        state.baseline.remove(update.index);
                    }
                }
                self.log.shift_for_delete(update.index);
            }
            UpdateAction::Other(ref label) => {
                debug!(label = %label, index = update.index, "discarding update with unrecognized action");
                return;
            }
        }
        self.listener.on_activity_changed();
    }

    /// Send a chat message and append it to the local chat log.
    pub async fn send_chat_message(&self, text: &str) -> Result<bool> {
        let (session_id, user_name) = self.identity();
        let request = SendMessageRequest {
            session_id,
            user_name: user_name.clone(),
            text: text.to_string(),
        };
        let accepted =
            self.transport.send_message(&request).await.context("SendMessage request failed")?;
        if accepted {
            self.lock_state().chat.push(ChatEntry { user_name, text: text.to_string() });
        }
        Ok(accepted)
    }

    // ── Reconnection ────────────────────────────────────────────────

    /// Re-establish a previously started session after connectivity
    /// loss. A session-already-running report is not a failure: the
    /// server-side session survived the disconnect, so this pivots to
    /// `rejoin` instead.
    pub async fn restart(&self) -> Result<ReconnectStatus> {
        match retry::run(&self.retry_policy, || self.restart_attempt()).await {
            RetryOutcome::Success(StartOutcome::Resumed(message)) => {
                Ok(ReconnectStatus::Resumed { message })
            }
            RetryOutcome::Success(StartOutcome::SessionConflict) => self.rejoin().await,
            RetryOutcome::Exhausted(error) => Err(error.context("Restart attempts exhausted")),
        }
    }

    async fn restart_attempt(&self) -> Attempt<StartOutcome> {
        let (base_url, session_id, user_name, file_name) = {
            let state = self.lock_state();
            (
                state.base_url.clone(),
                state.session_id.clone(),
                state.user_name.clone(),
                state.file_name.clone(),
            )
        };
        match self.start_server(&base_url, &session_id, &user_name, &file_name).await {
            Ok(message) if message == MSG_OK => Attempt::Success(StartOutcome::Resumed(message)),
            Ok(message) if message == MSG_SESSION_ALREADY_RUNNING => {
                Attempt::Success(StartOutcome::SessionConflict)
            }
            Ok(message) => Attempt::Transient(anyhow!("Start rejected: {message}")),
            Err(error) => Attempt::Transient(error),
        }
    }

    /// Rejoin the current session. On success the caller must treat the
    /// working document as replaced, since the join pulled a fresh copy.
    pub async fn rejoin(&self) -> Result<ReconnectStatus> {
        match retry::run(&self.retry_policy, || self.rejoin_attempt()).await {
            RetryOutcome::Success(message) => Ok(ReconnectStatus::ReloadRequired { message }),
            RetryOutcome::Exhausted(error) => Err(error.context("Rejoin attempts exhausted")),
        }
    }

    async fn rejoin_attempt(&self) -> Attempt<String> {
        let (base_url, session_id, user_name) = {
            let state = self.lock_state();
            (state.base_url.clone(), state.session_id.clone(), state.user_name.clone())
        };
        match self.join(&base_url, &user_name, &session_id).await {
            Ok((true, message)) => Attempt::Success(message),
            Ok((false, message)) => Attempt::Transient(anyhow!("Join rejected: {message}")),
            Err(error) => Attempt::Transient(error),
        }
    }

    // ── Polling ─────────────────────────────────────────────────────

    /// Start the poll timer; a no-op if it is already running. The
    /// interval is clamped to at least one second.
    pub fn start_polling(&self) {
        let mut task = self.lock_poll_task();
        if task.is_some() {
            return;
        }

        let listener = self.listener.clone();
        let interval = self.poll_interval.max(Duration::from_secs(1));
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; consume it so the
            // first notification fires a full interval from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                listener.on_poll_tick();
            }
        }));
    }

    /// Stop the poll timer; a no-op if it is not running.
    pub fn stop_polling(&self) {
        if let Some(task) = self.lock_poll_task().take() {
            task.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.lock_poll_task().is_some()
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn fetch_document(&self) -> Result<(Vec<CueLine>, String, i64)> {
        let request = GetSubtitleRequest { session_id: self.session_id() };
        let response =
            self.transport.get_subtitle(&request).await.context("GetSubtitle request failed")?;
        Ok((from_wire_lines(&response.subtitle), response.file_name, response.update_time))
    }

    fn identity(&self) -> (String, String) {
        let state = self.lock_state();
        (state.session_id.clone(), state.user_name.clone())
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }

    fn lock_poll_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll_task.lock().expect("poll task lock poisoned")
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn line_changed(before: &CueLine, after: &CueLine) -> bool {
    (before.start_ms - after.start_ms).abs() > TIME_TOLERANCE_MS
        || (before.end_ms - after.end_ms).abs() > TIME_TOLERANCE_MS
        || before.text != after.text
}

fn to_wire_lines(lines: &[CueLine]) -> Vec<WireLine> {
    lines.iter().enumerate().map(|(index, line)| line.to_wire(index)).collect()
}

fn from_wire_lines(lines: &[WireLine]) -> Vec<CueLine> {
    lines.iter().map(CueLine::from_wire).collect()
}

fn participant_from_wire(user: WireUser) -> Participant {
    Participant { user_name: user.user_name, ip: user.ip, last_activity: user.last_activity }
}

fn pending_from_wire(update: &WireUpdate) -> PendingUpdate {
    PendingUpdate {
        user_name: update.user_name.clone(),
        index: update.index.max(0) as usize,
        start_ms: update.start,
        end_ms: update.end,
        text: textcodec::decode(&update.text),
        action: UpdateAction::parse(&update.action),
        timestamp_ms: update.timestamp,
    }
}

fn entry_time(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now)
}
