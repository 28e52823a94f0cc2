use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::core::cap::CapTracker;
use crate::core::mailer::Mailer;
use crate::core::pitch::PitchGenerator;
use crate::core::store::{LeadStore, SelectedLead};
use crate::core::sync::StateSync;
use crate::error::Error;

/// In-memory lifecycle of one lead during a run. Only `Sent` is ever
/// persisted; a failure at `Generating` or `Sending` reverts the lead to
/// `Unsent` so a future run picks it up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadState {
    Unsent,
    Generating,
    Generated,
    Sending,
    Sent,
}

pub fn can_transition(from: LeadState, to: LeadState) -> bool {
    match from {
        LeadState::Unsent => matches!(to, LeadState::Generating),
        LeadState::Generating => matches!(to, LeadState::Generated | LeadState::Unsent),
        LeadState::Generated => matches!(to, LeadState::Sending),
        LeadState::Sending => matches!(to, LeadState::Sent | LeadState::Unsent),
        LeadState::Sent => false,
    }
}

fn advance(from: LeadState, to: LeadState) -> LeadState {
    debug_assert!(
        can_transition(from, to),
        "illegal lead transition {from:?} -> {to:?}"
    );
    to
}

/// Outcome of a batch run. `sent` may be less than `selected`; a skipped
/// lead never fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub selected: usize,
    pub sent: usize,
    pub skipped: usize,
}

pub struct DispatchEngine {
    store: LeadStore,
    generator: PitchGenerator,
    mailer: Box<dyn Mailer>,
    sync: Option<Box<dyn StateSync>>,
    run: RunConfig,
    value_add: String,
    sender_name: String,
}

impl DispatchEngine {
    pub fn new(
        store: LeadStore,
        generator: PitchGenerator,
        mailer: Box<dyn Mailer>,
        sync: Option<Box<dyn StateSync>>,
        run: RunConfig,
        value_add: String,
        sender_name: String,
    ) -> Self {
        Self {
            store,
            generator,
            mailer,
            sync,
            run,
            value_add,
            sender_name,
        }
    }

    /// Drip mode: exactly one unsent lead, no cap check (the cap is a
    /// batch-mode safety net), any pipeline failure is fatal. Returns the
    /// pitched lead, or None when the queue is empty.
    pub async fn run_single(&self) -> Result<Option<SelectedLead>, Error> {
        let Some(selected) = self.store.select_unsent(1)?.into_iter().next() else {
            info!("no unsent leads remaining, nothing to do");
            return Ok(None);
        };
        self.dispatch_one(&selected).await?;
        self.push_snapshot(1).await;
        Ok(Some(selected))
    }

    /// Batch mode: up to `min(batch_size, cap_remaining)` leads in store
    /// order. A failing lead is logged and skipped; the run continues.
    pub async fn run_batch(&self) -> Result<BatchReport, Error> {
        let cap_remaining = CapTracker::new(&self.store).remaining(self.run.daily_cap)?;
        if cap_remaining == 0 {
            info!(daily_cap = self.run.daily_cap, "daily cap reached, ending run");
            return Ok(BatchReport::default());
        }

        let batch = self
            .store
            .select_unsent(self.run.batch_size.min(cap_remaining))?;
        if batch.is_empty() {
            info!("no unsent leads remaining, nothing to do");
            return Ok(BatchReport::default());
        }

        let mut report = BatchReport {
            selected: batch.len(),
            ..BatchReport::default()
        };
        for (i, selected) in batch.iter().enumerate() {
            match self.dispatch_one(selected).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.skipped += 1;
                    warn!(
                        company = %selected.lead.company_name,
                        error = %e,
                        "lead skipped, run continues"
                    );
                }
            }
            // Drip pause between sends, but not after the last one.
            if i + 1 < batch.len() {
                tokio::time::sleep(self.run.drip_delay).await;
            }
        }

        if report.sent > 0 {
            self.push_snapshot(report.sent).await;
        }
        Ok(report)
    }

    /// The shared per-lead pipeline: generate, send, mark. Nothing is
    /// persisted until the send succeeded, so a failure anywhere leaves the
    /// lead unsent.
    async fn dispatch_one(&self, selected: &SelectedLead) -> Result<(), Error> {
        let lead = &selected.lead;
        let mut state = advance(LeadState::Unsent, LeadState::Generating);
        debug!(?state, company = %lead.company_name, role = %lead.role, "pipeline start");
        let pitch = self
            .generator
            .generate(lead, &self.value_add, &self.sender_name)
            .await?;
        state = advance(state, LeadState::Generated);

        state = advance(state, LeadState::Sending);
        debug!(?state, subject = %pitch.subject, "pitch ready");
        self.mailer
            .send(&lead.contact_email, &pitch.subject, &pitch.body)
            .await?;

        self.store.mark_sent(selected.index, Utc::now())?;
        state = advance(state, LeadState::Sent);
        info!(?state, company = %lead.company_name, "lead dispatched");
        Ok(())
    }

    /// Push the snapshot once per run. Sync failure is logged and never
    /// changes the run outcome.
    async fn push_snapshot(&self, sent: usize) {
        let Some(sync) = &self.sync else {
            debug!("no sync target configured, snapshot stays local");
            return;
        };
        let message = format!("chore: update lead store ({sent} sent)");
        let result = match self.store.snapshot() {
            Ok(snapshot) => sync.push(&snapshot, &message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "state sync failed (non-fatal)");
        }
    }
}
