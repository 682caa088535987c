use crate::error::SessionError;
use crate::random::{RandomSource, shuffle};
use prl_core::{Liking, RatingScale, StimulusCatalog, StimulusId};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Stimulus -> rating, built once the rating queue is exhausted.
pub type RatingLookup = HashMap<StimulusId, u8>;

/// One (group, stimulus) presentation in the rating stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingItem {
    pub group_id: String,
    pub group_label: String,
    pub liking: Liking,
    pub stimulus: StimulusId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    pub participant_id: String,
    pub session_label: String,
    pub group_id: String,
    pub group_label: String,
    pub liking: Liking,
    pub stimulus: StimulusId,
    pub rating: u8,
    pub timestamp_ms: u64,
}

/// Drives the rating stage: every catalog stimulus once, in random order.
#[derive(Debug, Clone)]
pub struct RatingSession {
    scale: RatingScale,
    queue: Vec<RatingItem>,
    index: usize,
    records: Vec<RatingRecord>,
    lookup: Option<RatingLookup>,
}

impl RatingSession {
    pub fn new<R>(catalog: &StimulusCatalog, scale: RatingScale, rng: &mut R) -> Self
    where
        R: RandomSource + ?Sized,
    {
        Self {
            scale,
            queue: Self::build_queue(catalog, rng),
            index: 0,
            records: Vec::new(),
            lookup: None,
        }
    }

    pub fn build_queue<R>(catalog: &StimulusCatalog, rng: &mut R) -> Vec<RatingItem>
    where
        R: RandomSource + ?Sized,
    {
        let items = catalog
            .pairs()
            .map(|(g, s)| RatingItem {
                group_id: g.id.clone(),
                group_label: g.label.clone(),
                liking: g.liking,
                stimulus: s.clone(),
            })
            .collect();
        shuffle(rng, items)
    }

    /// Starts a fresh pass over the catalog. Earlier records are kept and
    /// the lookup is rebuilt from all of them when this pass completes.
    pub fn restart<R>(&mut self, catalog: &StimulusCatalog, rng: &mut R)
    where
        R: RandomSource + ?Sized,
    {
        self.queue = Self::build_queue(catalog, rng);
        self.index = 0;
        self.lookup = None;
    }

    pub fn current(&self) -> Option<&RatingItem> {
        self.queue.get(self.index)
    }

    /// (items rated, queue length)
    pub fn progress(&self) -> (usize, usize) {
        (self.index.min(self.queue.len()), self.queue.len())
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.queue.len()
    }

    /// Records a rating for the current item and advances.
    ///
    /// Returns `Ok(false)` without touching state once the queue is
    /// exhausted.
    pub fn submit(
        &mut self,
        value: u8,
        participant_id: &str,
        session_label: &str,
        timestamp_ms: u64,
    ) -> Result<bool, SessionError> {
        let Some(item) = self.queue.get(self.index) else {
            debug!(value, "rating submitted past end of queue; ignored");
            return Ok(false);
        };
        if !self.scale.contains(value) {
            return Err(SessionError::RatingOutOfRange {
                value,
                min: self.scale.min,
                max: self.scale.max,
            });
        }

        self.records.push(RatingRecord {
            participant_id: participant_id.to_string(),
            session_label: session_label.to_string(),
            group_id: item.group_id.clone(),
            group_label: item.group_label.clone(),
            liking: item.liking,
            stimulus: item.stimulus.clone(),
            rating: value,
            timestamp_ms,
        });
        self.index += 1;

        if self.is_complete() {
            let lookup: RatingLookup = self
                .records
                .iter()
                .map(|r| (r.stimulus.clone(), r.rating))
                .collect();
            info!(ratings = self.records.len(), stimuli = lookup.len(), "rating stage complete");
            self.lookup = Some(lookup);
        }
        Ok(true)
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    /// Present only after the queue has been completed.
    pub fn lookup(&self) -> Option<&RatingLookup> {
        self.lookup.as_ref()
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }
}
