//! Multi-hit matching: gap matching with amplitude-based splitting of
//! temporally overlapping events.

use std::fmt::Write as _;

use eventform_core::{Cluster, Event};
use tracing::debug;

use super::{Matcher, MatcherBase};
use crate::clustering::ClusterQueue;

/// Configuration for [`MultiHitMatcher`].
#[derive(Debug, Clone, Copy)]
pub struct MultiHitMatcherConfig {
    /// Latency bound for the readiness rule.
    pub maximum_latency: u64,
    /// First plane selected for matching.
    pub plane_a: u8,
    /// Second plane selected for matching.
    pub plane_b: u8,
    /// Largest time gap between an event and the next cluster for the
    /// cluster to still extend the event.
    pub minimum_time_gap: u64,
    /// Coordinate span above which a finalized event is presumed to
    /// contain several physical events and is split.
    pub maximum_coord_span: u16,
    /// Coordinate gap used to re-segment each side of an oversized
    /// event.
    pub minimum_coord_gap: u16,
    /// Expected plane-B/plane-A amplitude ratio for sub-cluster pairing.
    pub coefficient: f64,
    /// Absolute amplitude tolerance around the expected ratio.
    pub allowance: f64,
}

impl Default for MultiHitMatcherConfig {
    fn default() -> Self {
        Self {
            maximum_latency: 500,
            plane_a: 0,
            plane_b: 1,
            minimum_time_gap: 70,
            maximum_coord_span: 20,
            minimum_coord_gap: 5,
            coefficient: 1.0,
            allowance: 50.0,
        }
    }
}

/// Gap matching plus resolution of temporally overlapping multi-hit
/// events.
///
/// Events are grown exactly as in [`crate::matching::GapMatcher`]. If at
/// finalize time either side's coordinate span exceeds
/// `maximum_coord_span`, the event is presumed to contain several
/// physically distinct detections: each side is re-segmented by
/// coordinate gap, and side-A segments are paired 1:1 with side-B
/// segments whose summed amplitude matches within
/// `coefficient`/`allowance`. Any segment matching more than one partner
/// makes the split ambiguous, and the whole oversized event is dropped
/// rather than guessed at. Ambiguous drops are counted, never raised.
#[derive(Debug)]
pub struct MultiHitMatcher {
    base: MatcherBase,
    minimum_time_gap: u64,
    maximum_coord_span: u16,
    minimum_coord_gap: u16,
    coefficient: f64,
    allowance: f64,

    /// Cumulative number of oversized events dropped as ambiguous.
    pub stats_ambiguous_splits: usize,
}

impl MultiHitMatcher {
    /// Creates a multi-hit matcher.
    #[must_use]
    pub fn new(config: MultiHitMatcherConfig) -> Self {
        Self {
            base: MatcherBase::new(config.maximum_latency, config.plane_a, config.plane_b),
            minimum_time_gap: config.minimum_time_gap,
            maximum_coord_span: config.maximum_coord_span,
            minimum_coord_gap: config.minimum_coord_gap,
            coefficient: config.coefficient,
            allowance: config.allowance,
            stats_ambiguous_splits: 0,
        }
    }

    /// Shared matcher state, exposed for inspection in tests and
    /// diagnostics.
    #[must_use]
    pub fn base(&self) -> &MatcherBase {
        &self.base
    }

    fn finalize_event(&mut self, event: Event) {
        if event.cluster_a.coord_span() <= self.maximum_coord_span
            && event.cluster_b.coord_span() <= self.maximum_coord_span
        {
            self.base.stash_event(event);
        } else {
            debug!(
                span_a = event.cluster_a.coord_span(),
                span_b = event.cluster_b.coord_span(),
                "oversized event, attempting split"
            );
            self.split_and_stash(event);
        }
    }

    /// Re-segments both sides of an oversized event and pairs the
    /// segments by amplitude.
    fn split_and_stash(&mut self, mut event: Event) {
        let parts_a = split_by_coord_gap(&mut event.cluster_a, self.minimum_coord_gap);
        let parts_b = split_by_coord_gap(&mut event.cluster_b, self.minimum_coord_gap);

        // pair each A segment with the B segments of matching amplitude
        let mut partner_of_a: Vec<Option<usize>> = vec![None; parts_a.len()];
        for (i, part_a) in parts_a.iter().enumerate() {
            for (j, part_b) in parts_b.iter().enumerate() {
                if self.amplitudes_match(part_a, part_b) {
                    if partner_of_a[i].is_some() {
                        debug!("segment on plane A matches several on plane B, dropping split");
                        self.stats_ambiguous_splits += 1;
                        return;
                    }
                    partner_of_a[i] = Some(j);
                }
            }
        }

        // a B segment claimed twice is just as ambiguous
        let mut claims = vec![0usize; parts_b.len()];
        for &partner in partner_of_a.iter().flatten() {
            claims[partner] += 1;
            if claims[partner] > 1 {
                debug!("segment on plane B matches several on plane A, dropping split");
                self.stats_ambiguous_splits += 1;
                return;
            }
        }

        let mut parts_a: Vec<Option<Cluster>> = parts_a.into_iter().map(Some).collect();
        let mut parts_b: Vec<Option<Cluster>> = parts_b.into_iter().map(Some).collect();
        for (i, partner) in partner_of_a.iter().enumerate() {
            let Some(j) = *partner else {
                continue;
            };
            let (Some(mut part_a), Some(mut part_b)) = (parts_a[i].take(), parts_b[j].take())
            else {
                continue;
            };
            let mut sub_event = Event::new(self.base.plane_a, self.base.plane_b);
            sub_event.merge(&mut part_a);
            sub_event.merge(&mut part_b);
            self.base.stash_event(sub_event);
        }
    }

    fn amplitudes_match(&self, part_a: &Cluster, part_b: &Cluster) -> bool {
        let scaled = part_a.weight_sum() * self.coefficient;
        scaled >= part_b.weight_sum() - self.allowance
            && scaled <= part_b.weight_sum() + self.allowance
    }
}

/// Splits a cluster into segments separated by more than
/// `minimum_coord_gap` in coordinate, consuming the source.
fn split_by_coord_gap(cluster: &mut Cluster, minimum_coord_gap: u16) -> Vec<Cluster> {
    cluster.hits.sort_by_key(|hit| hit.coordinate);

    let mut segments = Vec::new();
    let mut segment = Cluster::new();
    let mut last_coord = 0u16;
    for &hit in &cluster.hits {
        if !segment.is_empty() && hit.coordinate - last_coord > minimum_coord_gap {
            segments.push(std::mem::take(&mut segment));
        }
        last_coord = hit.coordinate;
        segment.insert(hit);
    }
    if !segment.is_empty() {
        segments.push(segment);
    }
    cluster.clear();
    segments
}

impl Matcher for MultiHitMatcher {
    fn insert(&mut self, cluster: Cluster) {
        self.base.insert(cluster);
    }

    fn insert_plane(&mut self, plane: u8, clusters: &mut ClusterQueue) {
        self.base.insert_plane(plane, clusters);
    }

    fn match_clusters(&mut self, flush: bool) {
        self.base.sort_unmatched();
        debug!(
            unmatched = self.base.unmatched_clusters.len(),
            flush, "matching"
        );

        let mut event = Event::new(self.base.plane_a, self.base.plane_b);
        loop {
            let Some(front) = self.base.unmatched_clusters.front() else {
                break;
            };
            if !flush && !self.base.ready_to_be_matched(front) {
                break;
            }
            if !event.is_empty() && event.time_gap(front) > self.minimum_time_gap {
                let finished = std::mem::replace(
                    &mut event,
                    Event::new(self.base.plane_a, self.base.plane_b),
                );
                self.finalize_event(finished);
            }
            let Some(mut cluster) = self.base.unmatched_clusters.pop_front() else {
                break;
            };
            event.merge(&mut cluster);
        }

        if !event.is_empty() {
            if flush {
                self.finalize_event(event);
            } else {
                self.base.requeue_clusters(&mut event);
            }
        }
    }

    fn matched_events(&mut self) -> &mut Vec<Event> {
        &mut self.base.matched_events
    }

    fn stats_event_count(&self) -> usize {
        self.base.stats_event_count
    }

    fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }

    fn config(&self, prepend: &str) -> String {
        let mut out = String::from("MultiHitMatcher:\n");
        out.push_str(&self.base.config(prepend));
        let _ = writeln!(out, "{prepend}minimum_time_gap={}", self.minimum_time_gap);
        let _ = writeln!(
            out,
            "{prepend}maximum_coord_span={}",
            self.maximum_coord_span
        );
        let _ = writeln!(out, "{prepend}minimum_coord_gap={}", self.minimum_coord_gap);
        let _ = writeln!(
            out,
            "{prepend}coefficient={} allowance={}",
            self.coefficient, self.allowance
        );
        out
    }

    fn status(&self, prepend: &str, verbose: bool) -> String {
        let mut out = self.base.status(prepend, verbose);
        let _ = writeln!(
            out,
            "{prepend}ambiguous splits dropped: {}",
            self.stats_ambiguous_splits
        );
        out
    }
}
