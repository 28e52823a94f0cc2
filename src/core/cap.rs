use chrono::{NaiveDate, Utc};

use crate::core::store::LeadStore;
use crate::error::Error;

/// Derives the remaining daily send quota from the store's `Sent Time`
/// column. Nothing is cached: the count survives across stateless scheduled
/// runs because it lives in the committed store, not in process state.
pub struct CapTracker<'a> {
    store: &'a LeadStore,
}

impl<'a> CapTracker<'a> {
    pub fn new(store: &'a LeadStore) -> Self {
        Self { store }
    }

    pub fn remaining(&self, limit: usize) -> Result<usize, Error> {
        self.remaining_on(limit, Utc::now().date_naive())
    }

    pub fn remaining_on(&self, limit: usize, date: NaiveDate) -> Result<usize, Error> {
        Ok(limit.saturating_sub(self.sent_on(date)?))
    }

    /// Count of leads whose timestamp falls on `date`, by string prefix
    /// against the `YYYY-MM-DD` head of the persisted timestamp.
    pub fn sent_on(&self, date: NaiveDate) -> Result<usize, Error> {
        let prefix = date.format("%Y-%m-%d").to_string();
        Ok(self
            .store
            .load_all()?
            .iter()
            .filter(|lead| lead.sent_time.trim().starts_with(&prefix))
            .count())
    }
}
