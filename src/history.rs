use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::animation::AnimationConfig;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct RenderRecord {
    pub render_id: String,
    pub prompt_summary: String,
    pub config: AnimationConfig,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
}

/// Recent successful renders, newest first. In memory only; a restart clears it.
#[derive(Debug)]
pub struct RenderHistory {
    capacity: usize,
    records: Mutex<VecDeque<RenderRecord>>,
}

impl RenderHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn record(&self, record: RenderRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push_front(record);
        records.truncate(self.capacity);
    }

    pub fn recent(&self, limit: usize) -> Vec<RenderRecord> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> RenderRecord {
        let config = AnimationConfig::default();
        RenderRecord {
            render_id: id.to_owned(),
            prompt_summary: config.summary(),
            config,
            video_url: format!("/static/{id}/placeholder.mp4"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn newest_first_and_bounded() {
        let history = RenderHistory::new(2);
        history.record(record("a"));
        history.record(record("b"));
        history.record(record("c"));

        let ids = history
            .recent(10)
            .into_iter()
            .map(|record| record.render_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["c".to_owned(), "b".to_owned()]);
        assert_eq!(history.recent(1).len(), 1);
    }
}
