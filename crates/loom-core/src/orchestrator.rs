//! The batch loop: seed → variants → units, one unit at a time.
//!
//! A batch transforms the seed once per variant, then for every unit of that
//! variant allocates a label, persists a record, submits the prompt to the
//! image service and sleeps the pacing interval. A stop request is honored
//! after the sleep that follows the unit in flight.
//!
//! The run state is a single atomic. `Idle → Running` and `Running → Draining`
//! are compare-and-swap transitions, and a drop guard owned by the loop puts
//! the state back to `Idle` however the loop ends.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::db::RecordDb;
use crate::error::{LoomError, Result};
use crate::notify::{Notification, Notifier};
use crate::quota::QuotaPlan;
use crate::record::{GenerationRecord, NewRecord};
use crate::sequence::{format_label, today_prefix, VariantReservations};
use crate::submission::{SubmissionOutcome, SubmissionStage};
use crate::transform::{PromptTransformStage, TransformedPrompt};

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Draining = 2,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// When absent, a random prompt from the seed library is used.
    #[serde(default)]
    pub seed_prompt: Option<String>,
    #[serde(rename = "totalCount")]
    pub total: u32,
    #[serde(rename = "variantCount")]
    pub variants: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopping,
    NotRunning,
}

/// Tally of one finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub records_created: u32,
    pub stored: u32,
    pub failed_units: u32,
    pub failed_variants: u32,
    pub cancelled: bool,
}

/// Fields of a previously generated record to run through submission again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubmitRequest {
    #[serde(default)]
    pub seed_prompt: String,
    #[serde(default)]
    pub structured_prompt: String,
    pub submission_prompt: String,
}

// ---------------------------------------------------------------------------
// BatchOrchestrator
// ---------------------------------------------------------------------------

struct Inner {
    state: AtomicU8,
    db: Arc<RecordDb>,
    transform: PromptTransformStage,
    submission: SubmissionStage,
    notifier: Notifier,
    pacing: Duration,
    reservations: VariantReservations,
}

/// Resets the run state to `Idle` when dropped.
struct IdleGuard(Arc<Inner>);

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.0.state.store(RunState::Idle as u8, Ordering::SeqCst);
    }
}

/// Cheap to clone; all clones drive the same run state.
#[derive(Clone)]
pub struct BatchOrchestrator {
    inner: Arc<Inner>,
}

impl BatchOrchestrator {
    pub fn new(
        db: Arc<RecordDb>,
        transform: PromptTransformStage,
        submission: SubmissionStage,
        notifier: Notifier,
        pacing: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(RunState::Idle as u8),
                db,
                transform,
                submission,
                notifier,
                pacing,
                reservations: VariantReservations::new(),
            }),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() != RunState::Idle
    }

    /// `Idle → Running`. False when a batch is already active.
    pub fn try_start(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// `Running → Draining`. Returns at once; the loop drains the unit in
    /// flight and then ends.
    pub fn request_stop(&self) -> StopOutcome {
        let flipped = self
            .inner
            .state
            .compare_exchange(
                RunState::Running as u8,
                RunState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if flipped {
            info!("stop requested, draining current unit");
            self.inner
                .notifier
                .info("Stop requested; finishing the current image");
            StopOutcome::Stopping
        } else {
            debug!(state = %self.state(), "stop requested with no batch running");
            StopOutcome::NotRunning
        }
    }

    /// Validate `req` and run the batch on a background task.
    pub async fn start(&self, req: BatchRequest) -> Result<StartOutcome> {
        let (seed, plan) = self.prepare(&req).await?;
        let Some(guard) = self.claim() else {
            return Ok(StartOutcome::AlreadyRunning);
        };
        let this = self.clone();
        tokio::spawn(async move {
            this.drive(guard, seed, plan).await;
        });
        Ok(StartOutcome::Started)
    }

    /// Like [`start`](Self::start), but runs the batch to the end on the
    /// caller's task. `None` when another batch is already active.
    pub async fn run_batch(&self, req: BatchRequest) -> Result<Option<BatchSummary>> {
        let (seed, plan) = self.prepare(&req).await?;
        let Some(guard) = self.claim() else {
            return Ok(None);
        };
        Ok(Some(self.drive(guard, seed, plan).await))
    }

    /// Create a fresh record for `req` under today's prefix and submit it in
    /// the background. Allowed while a batch runs.
    ///
    /// A resubmit is a single operator action and is not paced: its
    /// submission may overlap the unit a running batch has in flight.
    pub async fn resubmit(&self, req: ResubmitRequest) -> Result<GenerationRecord> {
        let submission_prompt = req.submission_prompt.trim();
        if submission_prompt.is_empty() {
            return Err(LoomError::InvalidRequest(
                "submissionPrompt must not be empty".into(),
            ));
        }

        let submission_prompt = submission_prompt.to_string();
        let record = self
            .on_store(move |inner| {
                let prefix = today_prefix();
                let variant = inner.reservations.reserve(&inner.db, &prefix, 1)?;
                inner.db.create_record(NewRecord {
                    seed_prompt: req.seed_prompt,
                    structured_prompt: req.structured_prompt,
                    submission_prompt,
                    sequence_label: format_label(&prefix, variant, 1),
                })
            })
            .await?;
        info!(label = %record.sequence_label, record_id = %record.id, "resubmitting");

        let this = self.clone();
        let submitted = record.clone();
        tokio::spawn(async move {
            let outcome = this
                .inner
                .submission
                .submit(&submitted.submission_prompt, submitted.id)
                .await;
            this.report(&outcome, &submitted.sequence_label);
        });
        Ok(record)
    }

    async fn prepare(&self, req: &BatchRequest) -> Result<(String, QuotaPlan)> {
        let plan = QuotaPlan::new(req.total, req.variants)?;
        let seed = match req.seed_prompt.as_deref().map(str::trim) {
            Some(seed) if !seed.is_empty() => seed.to_string(),
            _ => {
                let seed = self.on_store(|inner| inner.db.random_seed()).await?;
                info!(seed_id = %seed.id, "using random seed prompt");
                seed.prompt
            }
        };
        Ok((seed, plan))
    }

    /// Run a synchronous store call on the blocking pool.
    async fn on_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&*inner))
            .await
            .map_err(|e| LoomError::Persistence(format!("store task failed: {e}")))?
    }

    fn claim(&self) -> Option<IdleGuard> {
        if self.try_start() {
            Some(IdleGuard(self.inner.clone()))
        } else {
            warn!(state = %self.state(), "start requested while a batch is active");
            self.inner.notifier.info("A process is already running");
            None
        }
    }

    fn draining(&self) -> bool {
        self.state() == RunState::Draining
    }

    async fn drive(&self, guard: IdleGuard, seed: String, plan: QuotaPlan) -> BatchSummary {
        let inner = &self.inner;
        let mut summary = BatchSummary::default();
        info!(
            total = plan.total,
            variants = plan.variants,
            units = ?plan.counts(),
            "batch started"
        );
        inner.notifier.broadcast(Notification::Started {
            variants: plan.variants,
            total: plan.total,
        });

        let prefix = today_prefix();
        let variants = plan.variants;
        let reserved = {
            let prefix = prefix.clone();
            self.on_store(move |inner| inner.reservations.reserve(&inner.db, &prefix, variants))
                .await
        };
        match reserved {
            Ok(first) => self.run_variants(&seed, &plan, &prefix, first, &mut summary).await,
            Err(e) => {
                error!(error = %e, "could not allocate sequence labels");
                inner.notifier.failed(format!("Could not allocate labels: {e}"));
            }
        }

        drop(guard);
        info!(
            records = summary.records_created,
            stored = summary.stored,
            cancelled = summary.cancelled,
            "batch finished"
        );
        inner.notifier.broadcast(Notification::Completed {
            records: summary.records_created,
        });
        summary
    }

    async fn run_variants(
        &self,
        seed: &str,
        plan: &QuotaPlan,
        prefix: &str,
        first_variant: u32,
        summary: &mut BatchSummary,
    ) {
        let inner = &self.inner;
        let mut last_label = String::new();

        for variant in 1..=plan.variants {
            if self.draining() {
                self.cancel(&last_label, summary);
                return;
            }
            let units = plan.units_for(variant);
            if units == 0 {
                debug!(variant, "variant has no units");
                continue;
            }

            let prompt = match inner.transform.transform(seed).await {
                Ok(prompt) => prompt,
                Err(e) => {
                    error!(variant, error = %e, "transform failed, skipping variant");
                    inner.notifier.failed(format!("Prompt {variant}: {e}"));
                    summary.failed_variants += 1;
                    continue;
                }
            };

            let variant_index = first_variant + variant - 1;
            for unit in 1..=units {
                let label = format_label(prefix, variant_index, unit);
                let progress = Notification::Progress {
                    variant,
                    unit,
                    units,
                    label: label.clone(),
                };
                self.run_unit(seed, &prompt, &label, progress, summary).await;
                last_label = label;

                tokio::time::sleep(inner.pacing).await;
                if self.draining() {
                    self.cancel(&last_label, summary);
                    return;
                }
            }
        }
    }

    /// Persist, announce and submit one unit. Failures are reported and
    /// counted; they never end the batch.
    async fn run_unit(
        &self,
        seed: &str,
        prompt: &TransformedPrompt,
        label: &str,
        progress: Notification,
        summary: &mut BatchSummary,
    ) {
        let inner = &self.inner;
        let new = NewRecord {
            seed_prompt: seed.to_string(),
            structured_prompt: prompt.structured.clone(),
            submission_prompt: prompt.submission.clone(),
            sequence_label: label.to_string(),
        };
        let record = match self.on_store(move |inner| inner.db.create_record(new)).await {
            Ok(record) => record,
            Err(e) => {
                error!(label, error = %e, "failed to persist record");
                inner.notifier.failed(format!("{label}: {e}"));
                summary.failed_units += 1;
                return;
            }
        };
        summary.records_created += 1;
        debug!(label, record_id = %record.id, "record created");
        inner.notifier.broadcast(progress);

        let outcome = inner.submission.submit(&prompt.submission, record.id).await;
        if outcome.is_stored() {
            summary.stored += 1;
        } else {
            summary.failed_units += 1;
        }
        self.report(&outcome, label);
    }

    fn report(&self, outcome: &SubmissionOutcome, label: &str) {
        let notifier = &self.inner.notifier;
        match outcome {
            SubmissionOutcome::Stored(record) => notifier.broadcast(Notification::RecordUpdated {
                id: record.id,
                label: label.to_string(),
            }),
            SubmissionOutcome::NoResult => {
                notifier.failed(format!("{label}: image service returned no result"))
            }
            SubmissionOutcome::NoAssetId { uri } => {
                notifier.failed(format!("{label}: no asset id in {uri}"))
            }
            SubmissionOutcome::RecordNotFound(id) => {
                notifier.failed(format!("{label}: {}", LoomError::RecordNotFound(*id)))
            }
            SubmissionOutcome::Failed(reason) => notifier.failed(format!(
                "{label}: {}",
                LoomError::Submission(reason.clone())
            )),
        }
    }

    fn cancel(&self, label: &str, summary: &mut BatchSummary) {
        info!(label, "batch cancelled");
        summary.cancelled = true;
        self.inner.notifier.broadcast(Notification::Cancelled {
            label: label.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::tests::FakeImagine;
    use crate::submission::GRID_SIZE;
    use async_trait::async_trait;
    use chat_agent::{ChatAgentError, ChatCompletion, ChatRequest};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::broadcast::Receiver;

    const PACING: Duration = Duration::from_secs(20);

    /// Answers every breakdown with "structured" and every condensation with
    /// "condensed"; the calls listed in `fail_calls` (0-based) error out.
    struct EchoLlm {
        calls: AtomicUsize,
        fail_calls: Vec<usize>,
    }

    impl EchoLlm {
        fn new() -> Arc<Self> {
            Self::failing(vec![])
        }

        fn failing(fail_calls: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_calls,
            })
        }
    }

    #[async_trait]
    impl ChatCompletion for EchoLlm {
        async fn complete(&self, request: ChatRequest) -> chat_agent::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&n) {
                return Err(ChatAgentError::Status {
                    code: 503,
                    body: "overloaded".into(),
                });
            }
            if request.messages[1].content.starts_with("Break down") {
                Ok("structured".into())
            } else {
                Ok("condensed".into())
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        db: Arc<RecordDb>,
        imagine: Arc<FakeImagine>,
        orch: BatchOrchestrator,
        events: Receiver<Notification>,
    }

    fn fixture_with(llm: Arc<EchoLlm>, imagine: Arc<FakeImagine>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(RecordDb::open(&dir.path().join("loom.db")).unwrap());
        let transform = PromptTransformStage::new(llm, "gpt-4", 100, "--ar 16:9", None);
        let submission =
            SubmissionStage::new(imagine.clone(), db.clone(), "https://cdn.test", None);
        let notifier = Notifier::new();
        let events = notifier.subscribe();
        let orch = BatchOrchestrator::new(db.clone(), transform, submission, notifier, PACING);
        Fixture {
            _dir: dir,
            db,
            imagine,
            orch,
            events,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EchoLlm::new(), FakeImagine::ok())
    }

    fn request(seed: &str, total: u32, variants: u32) -> BatchRequest {
        BatchRequest {
            seed_prompt: Some(seed.into()),
            total,
            variants,
        }
    }

    fn drain(events: &mut Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        loop {
            match events.try_recv() {
                Ok(n) => out.push(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return out,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn labels(db: &RecordDb) -> Vec<String> {
        let mut labels: Vec<String> = db
            .list_page(1, 100)
            .unwrap()
            .items
            .into_iter()
            .map(|r| r.sequence_label)
            .collect();
        labels.sort();
        labels
    }

    async fn wait_idle(orch: &BatchOrchestrator) {
        while orch.is_running() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_labels_every_unit() {
        let mut f = fixture();
        let summary = f.orch.run_batch(request("Gold", 5, 2)).await.unwrap().unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                records_created: 5,
                stored: 5,
                ..Default::default()
            }
        );
        let p = today_prefix();
        assert_eq!(
            labels(&f.db),
            vec![
                format!("{p}_1_1"),
                format!("{p}_1_2"),
                format!("{p}_2_1"),
                format!("{p}_2_2"),
                format!("{p}_2_3"),
            ]
        );
        let records = f.db.list_page(1, 100).unwrap().items;
        assert!(records.iter().all(|r| r.asset_refs.len() == GRID_SIZE));
        assert!(records
            .iter()
            .all(|r| r.submission_prompt == "condensed --ar 16:9" && r.seed_prompt == "Gold"));
        assert_eq!(f.orch.state(), RunState::Idle);

        let events = drain(&mut f.events);
        assert_eq!(events.first(), Some(&Notification::Started { variants: 2, total: 5 }));
        assert_eq!(events.last(), Some(&Notification::Completed { records: 5 }));
        let progress = events
            .iter()
            .filter(|n| matches!(n, Notification::Progress { .. }))
            .count();
        assert_eq!(progress, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_separates_units() {
        let f = fixture();
        let started = tokio::time::Instant::now();
        f.orch.run_batch(request("Gold", 3, 1)).await.unwrap();
        assert!(started.elapsed() >= PACING * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn variant_indices_continue_after_existing_labels() {
        let f = fixture();
        let p = today_prefix();
        for label in [format!("{p}_3_1"), format!("{p}_10_2"), format!("{p}_2_1")] {
            f.db.create_record(NewRecord {
                seed_prompt: "old".into(),
                structured_prompt: "old".into(),
                submission_prompt: "old".into(),
                sequence_label: label,
            })
            .unwrap();
        }

        f.orch.run_batch(request("Gold", 2, 2)).await.unwrap();

        let labels = labels(&f.db);
        assert!(labels.contains(&format!("{p}_11_1")), "{labels:?}");
        assert!(labels.contains(&format!("{p}_12_1")), "{labels:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drains_current_unit() {
        let mut f = fixture();
        assert_eq!(f.orch.start(request("Gold", 2, 1)).await.unwrap(), StartOutcome::Started);

        // Let unit 1 run up to its pacing sleep.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.orch.request_stop(), StopOutcome::Stopping);
        assert_eq!(f.orch.state(), RunState::Draining);
        wait_idle(&f.orch).await;

        let records = f.db.list_page(1, 10).unwrap().items;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asset_refs.len(), GRID_SIZE);
        assert_eq!(f.imagine.connects.load(Ordering::SeqCst), 1);

        let events = drain(&mut f.events);
        let p = today_prefix();
        assert!(events.contains(&Notification::Cancelled {
            label: format!("{p}_1_1")
        }));
        assert_eq!(events.last(), Some(&Notification::Completed { records: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_no_op() {
        let mut f = fixture();
        assert_eq!(f.orch.start(request("Gold", 1, 1)).await.unwrap(), StartOutcome::Started);
        assert_eq!(
            f.orch.start(request("Other", 1, 1)).await.unwrap(),
            StartOutcome::AlreadyRunning
        );
        wait_idle(&f.orch).await;

        assert_eq!(f.db.count_records().unwrap(), 1);
        let events = drain(&mut f.events);
        assert!(events.contains(&Notification::Info {
            message: "A process is already running".into()
        }));
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn transform_failure_skips_only_that_variant() {
        // Call 0 is variant 1's breakdown.
        let mut f = fixture_with(EchoLlm::failing(vec![0]), FakeImagine::ok());
        let summary = f.orch.run_batch(request("Gold", 4, 2)).await.unwrap().unwrap();

        assert_eq!(summary.failed_variants, 1);
        assert_eq!(summary.records_created, 2);
        let p = today_prefix();
        assert_eq!(labels(&f.db), vec![format!("{p}_2_1"), format!("{p}_2_2")]);
        assert!(drain(&mut f.events)
            .iter()
            .any(|n| matches!(n, Notification::Failed { message } if message.starts_with("Prompt 1:"))));
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_keeps_record_and_continues() {
        let f = fixture_with(EchoLlm::new(), FakeImagine::with_answer(Ok(None)));
        let summary = f.orch.run_batch(request("Gold", 2, 1)).await.unwrap().unwrap();

        assert_eq!(summary.records_created, 2);
        assert_eq!(summary.stored, 0);
        assert_eq!(summary.failed_units, 2);
        let records = f.db.list_page(1, 10).unwrap().items;
        assert!(records.iter().all(|r| r.asset_refs.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn skewed_plan_only_runs_last_variant() {
        let llm = EchoLlm::new();
        let f = fixture_with(llm.clone(), FakeImagine::ok());
        let summary = f.orch.run_batch(request("Gold", 2, 5)).await.unwrap().unwrap();

        assert_eq!(summary.records_created, 2);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2, "one transform for variant 5");
        let p = today_prefix();
        assert_eq!(labels(&f.db), vec![format!("{p}_5_1"), format!("{p}_5_2")]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_fails_only_that_unit() {
        let mut f = fixture();
        f.db.failing_creates.store(1, Ordering::SeqCst);
        let summary = f.orch.run_batch(request("Gold", 2, 1)).await.unwrap().unwrap();

        assert_eq!(summary.records_created, 1);
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.failed_units, 1);
        let p = today_prefix();
        assert_eq!(labels(&f.db), vec![format!("{p}_1_2")]);
        assert_eq!(f.imagine.connects.load(Ordering::SeqCst), 1);
        assert!(drain(&mut f.events).iter().any(|n| matches!(
            n,
            Notification::Failed { message } if message.starts_with(&format!("{p}_1_1:"))
        )));
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn resubmit_during_batch_takes_the_next_free_variant() {
        let f = fixture();
        assert_eq!(f.orch.start(request("Gold", 2, 2)).await.unwrap(), StartOutcome::Started);

        // Variant 1's only unit is written; variant 2 is reserved but not yet.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let record = f
            .orch
            .resubmit(ResubmitRequest {
                seed_prompt: "Gold".into(),
                structured_prompt: "structured".into(),
                submission_prompt: "condensed --ar 16:9".into(),
            })
            .await
            .unwrap();
        wait_idle(&f.orch).await;

        let p = today_prefix();
        assert_eq!(record.sequence_label, format!("{p}_3_1"));
        assert_eq!(
            labels(&f.db),
            vec![format!("{p}_1_1"), format!("{p}_2_1"), format!("{p}_3_1")]
        );
    }

    #[tokio::test]
    async fn stop_while_idle_changes_nothing() {
        let f = fixture();
        assert_eq!(f.orch.request_stop(), StopOutcome::NotRunning);
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn invalid_counts_are_rejected_before_starting() {
        let f = fixture();
        let err = f.orch.start(request("Gold", 10, 0)).await.unwrap_err();
        assert!(matches!(err, LoomError::InvalidRequest(_)), "{err:?}");
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn missing_seed_needs_a_library() {
        let f = fixture();
        let req = BatchRequest {
            seed_prompt: None,
            total: 1,
            variants: 1,
        };
        let err = f.orch.start(req).await.unwrap_err();
        assert!(matches!(err, LoomError::NoSeedPrompts), "{err:?}");
        assert_eq!(f.orch.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_seed_draws_from_library() {
        let f = fixture();
        f.db.add_seed("Quiet harbor at dawn").unwrap();
        let req = BatchRequest {
            seed_prompt: Some("   ".into()),
            total: 1,
            variants: 1,
        };
        f.orch.run_batch(req).await.unwrap().unwrap();

        let records = f.db.list_page(1, 10).unwrap().items;
        assert_eq!(records[0].seed_prompt, "Quiet harbor at dawn");
    }

    #[tokio::test(start_paused = true)]
    async fn resubmit_creates_fresh_label_and_stores_assets() {
        let mut f = fixture();
        f.orch.run_batch(request("Gold", 1, 1)).await.unwrap();
        drain(&mut f.events);

        let record = f
            .orch
            .resubmit(ResubmitRequest {
                seed_prompt: "Gold".into(),
                structured_prompt: "structured".into(),
                submission_prompt: "condensed --ar 16:9".into(),
            })
            .await
            .unwrap();
        assert_eq!(record.sequence_label, format!("{}_2_1", today_prefix()));

        let updated = f.events.recv().await.unwrap();
        assert_eq!(
            updated,
            Notification::RecordUpdated {
                id: record.id,
                label: record.sequence_label.clone()
            }
        );
        let stored = f.db.get_record(record.id).unwrap().unwrap();
        assert_eq!(stored.asset_refs.len(), GRID_SIZE);
    }

    #[tokio::test]
    async fn resubmit_needs_a_prompt() {
        let f = fixture();
        let err = f
            .orch
            .resubmit(ResubmitRequest {
                seed_prompt: "Gold".into(),
                structured_prompt: String::new(),
                submission_prompt: "  ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoomError::InvalidRequest(_)), "{err:?}");
        assert_eq!(f.db.count_records().unwrap(), 0);
    }

    #[test]
    fn batch_request_uses_wire_names() {
        let req: BatchRequest = serde_json::from_str(
            r#"{"seedPrompt":"Gold","totalCount":10,"variantCount":3}"#,
        )
        .unwrap();
        assert_eq!(req, request("Gold", 10, 3));

        let req: BatchRequest = serde_json::from_str(r#"{"totalCount":1,"variantCount":1}"#).unwrap();
        assert!(req.seed_prompt.is_none());
    }
}
