//! ExpectationStore - ordering and dispatch of registered expectations.
//!
//! Expectations are kept sorted by descending priority, then by creation
//! order. Each one owns a [`MatcherSlot`] so re-registering an expectation
//! with an unchanged request definition doesn't recompile its matcher.

use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::log::{MatchLog, MatchLogEvent, MatchLogType};
use crate::matchers::{MatcherContext, MatcherSlot, RequestMatcher};
use crate::metrics;
use crate::model::{Expectation, HttpRequest, RequestDefinition};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const STORE_LABEL: &str = "default";

#[derive(Debug)]
struct Entry {
    expectation: Arc<Expectation>,
    slot: MatcherSlot,
}

/// Holds expectations and finds the one a request should be served by.
#[derive(Debug)]
pub struct ExpectationStore {
    ctx: MatcherContext,
    entries: RwLock<Vec<Entry>>,
    sequence: AtomicU64,
}

impl ExpectationStore {
    pub fn new(config: MatcherConfig, log: Arc<dyn MatchLog>) -> Self {
        Self {
            ctx: MatcherContext::new(config, log),
            entries: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.ctx.config
    }

    /// Register `expectation`, replacing any stored expectation with the same
    /// id. A replacement keeps its original position among equal priorities.
    pub fn add(&self, expectation: Expectation) -> Result<Arc<Expectation>, MatcherError> {
        let mut entries = self.entries.write();
        let stored = match entries
            .iter_mut()
            .find(|entry| entry.expectation.id == expectation.id)
        {
            Some(entry) => {
                let created = entry.expectation.created;
                let updated = Arc::new(expectation.with_created(created));
                let rebuilt = entry.slot.update(updated.clone())?;
                entry.expectation = updated.clone();
                debug!(id = %updated.id, rebuilt, "expectation updated");
                self.ctx.log.log_event(
                    MatchLogEvent::new(
                        MatchLogType::UpdatedExpectation,
                        format!("updated expectation {}", updated.id),
                    )
                    .with_expectation_id(Some(&updated.id)),
                );
                updated
            }
            None => {
                let created = self.sequence.fetch_add(1, Ordering::Relaxed);
                let added = Arc::new(expectation.with_created(created));
                let slot = MatcherSlot::new(self.ctx.clone(), added.clone())?;
                entries.push(Entry {
                    expectation: added.clone(),
                    slot,
                });
                self.ctx.log.log_event(
                    MatchLogEvent::new(
                        MatchLogType::CreatedExpectation,
                        format!("creating expectation {}", added.id),
                    )
                    .with_expectation_id(Some(&added.id)),
                );
                added
            }
        };

        self.evict_oldest(&mut entries);
        entries.sort_by(|a, b| {
            b.expectation
                .priority
                .cmp(&a.expectation.priority)
                .then(a.expectation.created.cmp(&b.expectation.created))
        });
        metrics::set_active_expectations(entries.len());
        Ok(stored)
    }

    fn evict_oldest(&self, entries: &mut Vec<Entry>) {
        while entries.len() > self.ctx.config.max_expectations {
            let Some((index, _)) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| entry.expectation.created)
            else {
                return;
            };
            let evicted = entries.remove(index);
            info!("Expectation {} evicted, store is full", evicted.expectation.id);
            self.log_removed(&evicted.expectation);
        }
    }

    /// The highest ranked active expectation matching `request`, with one of
    /// its remaining uses consumed. Expectations found exhausted or expired
    /// along the way are removed.
    pub fn first_matching_expectation(&self, request: &HttpRequest) -> Option<Arc<Expectation>> {
        let mut matched = None;
        let mut inactive = Vec::new();
        {
            let entries = self.entries.read();
            for entry in entries.iter() {
                if !entry.expectation.is_active() {
                    inactive.push(entry.expectation.id.clone());
                    continue;
                }
                let mut diff = self.ctx.new_difference();
                if entry.slot.matches(Some(&mut diff), request) {
                    // another request may have consumed the last use
                    if !entry.expectation.times.decrement() {
                        inactive.push(entry.expectation.id.clone());
                        continue;
                    }
                    if !entry.expectation.is_active() {
                        inactive.push(entry.expectation.id.clone());
                    }
                    matched = Some(entry.expectation.clone());
                    break;
                }
            }
        }

        if !inactive.is_empty() {
            self.remove_where(|expectation| inactive.contains(&expectation.id));
        }
        match &matched {
            Some(expectation) => metrics::record_match(expectation.action_kind()),
            None => metrics::record_no_match(STORE_LABEL),
        }
        matched
    }

    /// Remove every expectation whose request definition matches `definition`.
    /// `None` removes everything.
    pub fn clear(&self, definition: Option<&RequestDefinition>) -> Result<(), MatcherError> {
        let Some(definition) = definition else {
            self.reset();
            return Ok(());
        };
        let filter = self.control_plane_matcher(definition)?;
        let removed =
            self.remove_where(|expectation| filter.matches(None, &expectation.http_request));
        self.ctx.log.log_event(MatchLogEvent::new(
            MatchLogType::Cleared,
            format!("cleared {removed} expectations that match request definition"),
        ));
        Ok(())
    }

    pub fn clear_by_id(&self, id: &str) -> Result<(), MatcherError> {
        match self.remove_where(|expectation| expectation.id == id) {
            0 => Err(MatcherError::ExpectationNotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    pub fn reset(&self) {
        let count = {
            let mut entries = self.entries.write();
            let count = entries.len();
            entries.clear();
            count
        };
        metrics::set_active_expectations(0);
        info!("Expectation store reset, {} expectations removed", count);
        self.ctx.log.log_event(MatchLogEvent::new(
            MatchLogType::Cleared,
            "resetting all expectations",
        ));
    }

    /// Active expectations in match order, optionally only those whose
    /// request definition matches `definition`.
    pub fn retrieve_active_expectations(
        &self,
        definition: Option<&RequestDefinition>,
    ) -> Result<Vec<Arc<Expectation>>, MatcherError> {
        let filter = definition
            .map(|definition| self.control_plane_matcher(definition))
            .transpose()?;
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .map(|entry| &entry.expectation)
            .filter(|expectation| expectation.is_active())
            .filter(|expectation| {
                filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(None, &expectation.http_request))
            })
            .cloned()
            .collect())
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    fn control_plane_matcher(
        &self,
        definition: &RequestDefinition,
    ) -> Result<RequestMatcher, MatcherError> {
        RequestMatcher::build(
            &MatcherContext::control_plane(self.ctx.config),
            Some(definition),
        )
    }

    fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Expectation) -> bool,
    {
        let removed: Vec<Entry> = {
            let mut entries = self.entries.write();
            let (removed, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut *entries)
                .into_iter()
                .partition(|entry| predicate(&entry.expectation));
            *entries = kept;
            metrics::set_active_expectations(entries.len());
            removed
        };
        for entry in &removed {
            info!("Expectation {} removed", entry.expectation.id);
            self.log_removed(&entry.expectation);
        }
        removed.len()
    }

    fn log_removed(&self, expectation: &Expectation) {
        self.ctx.log.log_event(
            MatchLogEvent::new(
                MatchLogType::RemovedExpectation,
                format!("removed expectation {}", expectation.id),
            )
            .with_expectation_id(Some(&expectation.id)),
        );
    }
}
