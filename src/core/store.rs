use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const SENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One outreach target, mapped 1:1 onto the CSV columns. Status and
/// timestamp stay as raw strings so a rewrite leaves untouched rows exactly
/// as they were read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(rename = "Company Name")]
    pub company_name: String,
    #[serde(rename = "Contact Email")]
    pub contact_email: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Context/JD", default)]
    pub context_jd: String,
    #[serde(rename = "Why I Love Them", default)]
    pub why_i_love_them: String,
    #[serde(rename = "Sent Status", default)]
    pub sent_status: String,
    #[serde(rename = "Sent Time", default)]
    pub sent_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentStatus {
    Unsent,
    Sent,
}

impl Lead {
    /// Empty and "no" (any case) mean unsent; anything else counts as sent.
    pub fn status(&self) -> SentStatus {
        match self.sent_status.trim().to_ascii_lowercase().as_str() {
            "" | "no" => SentStatus::Unsent,
            _ => SentStatus::Sent,
        }
    }
}

/// A lead plus its positional index in the store, carried from selection to
/// the eventual `mark_sent`. The index is only valid as long as no other
/// process rewrites the file in between.
#[derive(Debug, Clone)]
pub struct SelectedLead {
    pub index: usize,
    pub lead: Lead,
}

/// CSV-backed ordered lead set. Every operation re-reads the file, so quota
/// and selection stay correct across independent scheduled runs that share
/// the same store.
#[derive(Debug, Clone)]
pub struct LeadStore {
    path: PathBuf,
}

impl LeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> Result<Vec<Lead>, Error> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.unreadable(e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<Lead>, _>>()
            .map_err(|e| self.unreadable(e))
    }

    /// First `limit` unsent leads in stored order; fewer if the store runs
    /// out. Pure read.
    pub fn select_unsent(&self, limit: usize) -> Result<Vec<SelectedLead>, Error> {
        Ok(self
            .load_all()?
            .into_iter()
            .enumerate()
            .filter(|(_, lead)| lead.status() == SentStatus::Unsent)
            .take(limit)
            .map(|(index, lead)| SelectedLead { index, lead })
            .collect())
    }

    /// Flip one row to sent and rewrite the whole file. Not atomic across
    /// process interruption: a crash mid-write can truncate the store.
    pub fn mark_sent(&self, index: usize, timestamp: DateTime<Utc>) -> Result<(), Error> {
        let mut leads = self.load_all()?;
        let len = leads.len();
        let lead = leads
            .get_mut(index)
            .ok_or(Error::Range { index, len })?;
        lead.sent_status = "Yes".to_string();
        lead.sent_time = timestamp.format(SENT_TIME_FORMAT).to_string();

        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))?;
        for lead in &leads {
            writer
                .serialize(lead)
                .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))?;
        }
        writer
            .flush()
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Raw file contents, for the remote sync push.
    pub fn snapshot(&self) -> Result<String, Error> {
        std::fs::read_to_string(&self.path).map_err(|e| self.unreadable(e))
    }

    fn unreadable(&self, e: impl std::fmt::Display) -> Error {
        Error::NotFound(format!("{}: {e}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "Company Name,Contact Email,Role,Context/JD,Why I Love Them,Sent Status,Sent Time";

    fn store_with(rows: &[&str]) -> (tempfile::TempDir, LeadStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{HEADER}").unwrap();
        for row in rows {
            writeln!(f, "{row}").unwrap();
        }
        (dir, LeadStore::new(path))
    }

    #[test]
    fn select_unsent_keeps_store_order_and_skips_sent() {
        let (_dir, store) = store_with(&[
            "Acme,a@acme.io,Engineer,,,Yes,2025-01-02 09:00:00 UTC",
            "Beta,b@beta.io,Analyst,,,No,",
            "Gamma,c@gamma.io,PM,,,,",
            "Delta,d@delta.io,Designer,,,YES,2025-01-03 10:00:00 UTC",
            "Epsilon,e@eps.io,Engineer,,,nO,",
        ]);
        let picked = store.select_unsent(10).unwrap();
        let companies: Vec<&str> = picked.iter().map(|s| s.lead.company_name.as_str()).collect();
        assert_eq!(companies, ["Beta", "Gamma", "Epsilon"]);
        assert_eq!(picked[0].index, 1);
        assert_eq!(picked[1].index, 2);
        assert_eq!(picked[2].index, 4);
    }

    #[test]
    fn select_unsent_honors_limit() {
        let (_dir, store) = store_with(&[
            "Beta,b@beta.io,Analyst,,,No,",
            "Gamma,c@gamma.io,PM,,,,",
            "Epsilon,e@eps.io,Engineer,,,,",
        ]);
        assert_eq!(store.select_unsent(2).unwrap().len(), 2);
        assert_eq!(store.select_unsent(0).unwrap().len(), 0);
    }

    #[test]
    fn mark_sent_updates_only_the_target_row() {
        let (_dir, store) = store_with(&[
            "Acme,a@acme.io,Engineer,ships rockets,love the team,No,",
            "Beta,b@beta.io,Analyst,,,No,",
        ]);
        let before_raw = store.snapshot().unwrap();

        let now = Utc::now();
        store.mark_sent(1, now).unwrap();

        let after = store.load_all().unwrap();
        assert_eq!(after[1].sent_status, "Yes");
        assert!(
            after[1]
                .sent_time
                .starts_with(&now.format("%Y-%m-%d").to_string())
        );
        assert!(after[1].sent_time.ends_with(" UTC"));

        // Header and untouched rows come back byte for byte.
        let after_raw = store.snapshot().unwrap();
        let before_lines: Vec<&str> = before_raw.lines().collect();
        let after_lines: Vec<&str> = after_raw.lines().collect();
        assert_eq!(after_lines[0], before_lines[0]);
        assert_eq!(after_lines[1], before_lines[1]);
        assert_ne!(after_lines[2], before_lines[2]);
    }

    #[test]
    fn mark_sent_out_of_range_is_a_range_error() {
        let (_dir, store) = store_with(&["Acme,a@acme.io,Engineer,,,No,"]);
        let err = store.mark_sent(5, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Range { index: 5, len: 1 }));
        // The file must be untouched after the failed write.
        assert_eq!(store.load_all().unwrap().len(), 1);
        assert_eq!(store.load_all().unwrap()[0].sent_status, "No");
    }

    #[test]
    fn missing_file_is_a_not_found_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeadStore::new(dir.path().join("absent.csv"));
        assert!(matches!(store.load_all().unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn marked_lead_is_no_longer_selectable() {
        let (_dir, store) = store_with(&[
            "Acme,a@acme.io,Engineer,,,No,",
            "Beta,b@beta.io,Analyst,,,No,",
        ]);
        store.mark_sent(0, Utc::now()).unwrap();
        let picked = store.select_unsent(10).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].lead.company_name, "Beta");
        assert_eq!(picked[0].index, 1);
    }
}
