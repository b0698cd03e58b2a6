//! Generation supervisor: single-flight streaming generation with race-free
//! interruption.
//!
//! One supervisor owns one conversation's `{phase, task slot, partial
//! buffer, history}`. All transitions (new input, stop command, decision
//! resolution) are serialized through an async transition lock; the
//! generation task itself only ever settles its own slot.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use scribe_ai::{Fragment, GenerationParams, GenerationSource, Turn};
use scribe_store::ConversationStore;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    events::{EventStream, OutboundEvent},
    history::History,
    interrupt::is_stop_command,
    phase::ConversationPhase,
};

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Generation call parameters
    pub generation: GenerationParams,
    /// Bounded wait for a cancelled task to acknowledge termination
    pub drain_timeout: Duration,
    /// How many trailing turns form the prompt context
    pub context_turns: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            generation: GenerationParams::default(),
            drain_timeout: Duration::from_millis(1500),
            context_turns: 10,
        }
    }
}

/// Handle to the one in-flight generation task
#[derive(Clone)]
struct ActiveTask {
    cancel: CancellationToken,
    generation: u64,
}

/// A parked decision waiting for the user's reply
struct PendingDecision {
    reply_tx: oneshot::Sender<String>,
}

struct Inner {
    conversation_id: String,
    config: SupervisorConfig,
    source: Arc<dyn GenerationSource>,
    store: Arc<dyn ConversationStore>,
    history: Arc<History>,

    phase: Mutex<ConversationPhase>,
    /// The single task slot. Set only while the transition lock is held;
    /// cleared only by the owning task's settlement (or force-detached after
    /// a drain timeout).
    active: Mutex<Option<ActiveTask>>,
    /// Accumulated text of the running (or just-cancelled) generation
    buffer: Mutex<String>,
    pending: Mutex<Option<PendingDecision>>,

    /// Monotonic id distinguishing a live task from a detached stale one
    generations: AtomicU64,
    /// Signalled every time a task settles its slot
    idle_notify: Notify,
    /// Serializes submit/interrupt/resolve transitions
    transition: tokio::sync::Mutex<()>,
}

impl Inner {
    /// Clear the slot if `generation` still owns it
    fn release_slot(&self, generation: u64) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|t| t.generation == generation) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Whether `generation` no longer owns the slot
    fn is_detached(&self, generation: u64) -> bool {
        !self
            .active
            .lock()
            .as_ref()
            .is_some_and(|t| t.generation == generation)
    }

    /// Clear the slot and set the phase in one step, if still the owner.
    /// Lock order is always active → phase.
    fn settle(&self, generation: u64, phase: ConversationPhase) -> bool {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(task) if task.generation == generation => {
                *self.phase.lock() = phase;
                *active = None;
                true
            }
            _ => false,
        }
    }

    /// Append to history and persist. Persistence failures degrade to
    /// memory-only operation.
    async fn push_turn(&self, turn: Turn) {
        self.history.append(turn.clone());
        if let Err(e) = self.store.append_turn(&self.conversation_id, &turn).await {
            tracing::warn!(
                conversation = %self.conversation_id,
                error = %e,
                "failed to persist turn; keeping it in memory only"
            );
        }
    }

    /// Fold the partial buffer into history as an assistant turn
    async fn fold_partial(&self) {
        let text = std::mem::take(&mut *self.buffer.lock());
        if text.is_empty() {
            return;
        }
        self.push_turn(Turn::assistant(text)).await;
    }
}

/// Supervises at most one generation task for one conversation
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        conversation_id: impl Into<String>,
        config: SupervisorConfig,
        source: Arc<dyn GenerationSource>,
        store: Arc<dyn ConversationStore>,
        history: Arc<History>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                conversation_id: conversation_id.into(),
                config,
                source,
                store,
                history,
                phase: Mutex::new(ConversationPhase::Idle),
                active: Mutex::new(None),
                buffer: Mutex::new(String::new()),
                pending: Mutex::new(None),
                generations: AtomicU64::new(0),
                idle_notify: Notify::new(),
                transition: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Current phase
    pub fn phase(&self) -> ConversationPhase {
        *self.inner.phase.lock()
    }

    /// Whether a generation task is in flight
    pub fn is_running(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Shared history handle
    pub fn history(&self) -> Arc<History> {
        Arc::clone(&self.inner.history)
    }

    /// Process one piece of user input: resolve a parked decision, treat a
    /// stop command, or start a (possibly preempting) generation.
    pub async fn handle_input(&self, text: &str) -> EventStream {
        let _guard = self.inner.transition.lock().await;

        if *self.inner.phase.lock() == ConversationPhase::AwaitingUser {
            return self.resolve_parked(text);
        }
        if is_stop_command(text) {
            return self.interrupt().await;
        }
        self.start_generation(text).await
    }

    /// Typed entry for explicit decision replies. Replying with nothing
    /// parked is protocol misuse; the phase is left untouched.
    pub async fn resolve_decision(&self, reply: &str) -> EventStream {
        let _guard = self.inner.transition.lock().await;

        let phase = *self.inner.phase.lock();
        if phase != ConversationPhase::AwaitingUser {
            return OutboundEvent::Error {
                message: format!("no pending decision to resolve (phase: {})", phase),
            }
            .into_stream();
        }
        self.resolve_parked(reply)
    }

    /// Park a decision slot and flip to `AwaitingUser`. The caller emits the
    /// prompt event and awaits the returned receiver.
    pub(crate) fn park_decision(&self) -> Result<oneshot::Receiver<String>> {
        let mut pending = self.inner.pending.lock();
        if pending.is_some() {
            return Err(Error::DecisionPending);
        }
        let (tx, rx) = oneshot::channel();
        *pending = Some(PendingDecision { reply_tx: tx });
        *self.inner.phase.lock() = ConversationPhase::AwaitingUser;
        Ok(rx)
    }

    fn resolve_parked(&self, reply: &str) -> EventStream {
        match self.inner.pending.lock().take() {
            Some(decision) => {
                *self.inner.phase.lock() = ConversationPhase::Executing;
                if decision.reply_tx.send(reply.to_string()).is_err() {
                    tracing::warn!(
                        conversation = %self.inner.conversation_id,
                        "decision consumer went away before the reply arrived"
                    );
                }
                OutboundEvent::Sync {
                    phase: ConversationPhase::Executing,
                }
                .into_stream()
            }
            None => OutboundEvent::Error {
                message: "awaiting a decision but nothing is parked".to_string(),
            }
            .into_stream(),
        }
    }

    /// Stop command: cancel and drain any running task, fold its partial
    /// output, acknowledge with a single `interrupted` event. A stop with
    /// nothing running acknowledges without touching any state.
    async fn interrupt(&self) -> EventStream {
        if !self.cancel_and_drain().await {
            return OutboundEvent::Interrupted.into_stream();
        }
        self.inner.fold_partial().await;
        *self.inner.phase.lock() = ConversationPhase::Interrupted;
        OutboundEvent::Interrupted.into_stream()
    }

    /// New instruction: preempt any running task (folding its partial output
    /// before the new task can emit anything), record the user turn, and
    /// start a fresh generation.
    async fn start_generation(&self, text: &str) -> EventStream {
        if self.cancel_and_drain().await {
            self.inner.fold_partial().await;
        }
        self.inner.push_turn(Turn::user(text)).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut active = self.inner.active.lock();
            debug_assert!(active.is_none(), "task slot must be free before reuse");
            *active = Some(ActiveTask {
                cancel: cancel.clone(),
                generation,
            });
            *self.inner.phase.lock() = ConversationPhase::Executing;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(run_generation(inner, cancel, generation, tx));

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    /// Cancel the running task (if any) and wait — bounded — for it to
    /// settle its slot. On timeout the stale task is detached: the slot is
    /// reclaimed and whatever the task produces later is discarded.
    ///
    /// Returns `true` if there was a task to cancel.
    async fn cancel_and_drain(&self) -> bool {
        let task = self.inner.active.lock().clone();
        let Some(task) = task else { return false };
        task.cancel.cancel();

        // Create the waiter before re-checking the slot so a settlement
        // between the two cannot be missed.
        let drained = self.inner.idle_notify.notified();
        if self.inner.active.lock().is_none() {
            return true;
        }

        if tokio::time::timeout(self.inner.config.drain_timeout, drained)
            .await
            .is_err()
        {
            tracing::warn!(
                conversation = %self.inner.conversation_id,
                timeout = ?self.inner.config.drain_timeout,
                "cancellation not acknowledged in time; detaching stale generation task"
            );
            self.inner.release_slot(task.generation);
        }
        true
    }
}

enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// The pull loop of one generation task.
///
/// Invariant: only this task settles its slot (natural completion, failure,
/// or cancellation acknowledgment); a submitter never overwrites it.
async fn run_generation(
    inner: Arc<Inner>,
    cancel: CancellationToken,
    generation: u64,
    tx: mpsc::UnboundedSender<OutboundEvent>,
) {
    let turns = inner.history.recent(inner.config.context_turns);
    let mut stream = match inner
        .source
        .generate(turns, &inner.config.generation, cancel.clone())
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            if cancel.is_cancelled() || inner.is_detached(generation) {
                let _ = tx.send(OutboundEvent::Cancelled);
                if inner.release_slot(generation) {
                    inner.idle_notify.notify_waiters();
                }
                return;
            }
            let _ = tx.send(OutboundEvent::Error {
                message: e.to_string(),
            });
            if inner.settle(generation, ConversationPhase::Idle) {
                inner.idle_notify.notify_waiters();
            }
            return;
        }
    };

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Outcome::Cancelled,
            fragment = stream.next() => match fragment {
                Some(Ok(Fragment::Token { text })) => {
                    // Buffer first, then emit: a fold observed by an
                    // interrupter always contains every chunk the client saw.
                    inner.buffer.lock().push_str(&text);
                    let _ = tx.send(OutboundEvent::Chunk { text });
                }
                Some(Ok(Fragment::Completion)) => break Outcome::Completed,
                Some(Err(e)) => break Outcome::Failed(e.to_string()),
                None => break Outcome::Failed(
                    "generation stream ended without completion".to_string(),
                ),
            },
        }
    };

    // Release the source before settling state.
    drop(stream);

    match outcome {
        Outcome::Completed => {
            let text = std::mem::take(&mut *inner.buffer.lock());
            if !text.is_empty() {
                inner.push_turn(Turn::assistant(text.clone())).await;
            }
            if inner.is_detached(generation) {
                let _ = tx.send(OutboundEvent::Cancelled);
                return;
            }
            let _ = tx.send(OutboundEvent::Complete { text });
            if inner.settle(generation, ConversationPhase::Completed) {
                inner.idle_notify.notify_waiters();
            }
        }
        Outcome::Failed(message) => {
            // Partial work is not lost on failure.
            inner.fold_partial().await;
            if inner.is_detached(generation) {
                let _ = tx.send(OutboundEvent::Cancelled);
                return;
            }
            let _ = tx.send(OutboundEvent::Error { message });
            if inner.settle(generation, ConversationPhase::Idle) {
                inner.idle_notify.notify_waiters();
            }
        }
        Outcome::Cancelled => {
            // The interrupter owns the fold and the next phase. Send the
            // terminal event before releasing the slot so it cannot trail
            // the successor's first chunk.
            let _ = tx.send(OutboundEvent::Cancelled);
            if inner.release_slot(generation) {
                inner.idle_notify.notify_waiters();
            }
        }
    }
}
