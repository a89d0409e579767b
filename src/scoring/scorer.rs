use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::core::types::{DocId, Number};

/// How a query token matched a field's token, best-of across every
/// matched token in the field (spec.md §4.6 signal (c)). Ranked
/// `Exact > Prefix > Typo > Infix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Infix,
    Typo,
    Prefix,
    Exact,
}

/// Result of the proximity/matched-segment computation ported from the
/// original implementation's `match_score()` (`matchscore.h`): the widest
/// count of distinct query tokens found together, and the tightest span
/// (in token positions) a window achieving that count required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProximityResult {
    pub max_match: u32,
    pub min_displacement: u32,
}

/// Compute the best matched-token window over `token_positions`, one
/// sorted position list per distinct query token (empty if that token
/// did not occur in this field value at all). `window` is the span (in
/// token positions) a sliding window covers before it stops admitting
/// new occurrences (the original's default is 5 positions) — tokens
/// that never land in a shared `window`-sized span together cannot
/// contribute to each other's `max_match`, so scattered occurrences
/// score a lower match count than clustered ones even when every token
/// occurs somewhere in the field.
///
/// Ported from the original implementation's `match_score()`
/// (`matchscore.h`): a min-heap yields positions in sorted order: each
/// iteration slides the window to start at the oldest position still
/// queued, admits every not-yet-queued position within `window` of that
/// start, and scores the resulting "in view" set before evicting the
/// window's oldest entry and repeating. `word_pos_sum` tracks which
/// token list currently has a position in view (0 means none — token
/// positions are 1-based, so 0 is an unambiguous sentinel).
pub fn compute_proximity(token_positions: &[Vec<u32>], window: usize) -> ProximityResult {
    let present: Vec<&Vec<u32>> = token_positions.iter().filter(|p| !p.is_empty()).collect();
    if present.is_empty() {
        return ProximityResult::default();
    }

    let mut pointers = vec![0usize; present.len()];
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    for (list_idx, list) in present.iter().enumerate() {
        heap.push(Reverse((list[0], list_idx)));
    }

    let pull_next = |heap: &mut BinaryHeap<Reverse<(u32, usize)>>,
                     pointers: &mut [usize],
                     window_queue: &mut VecDeque<(u32, usize)>,
                     word_pos_sum: &mut [u32]| {
        let Reverse((position, list_idx)) = heap.pop().expect("caller only calls pull_next when heap is non-empty");
        window_queue.push_back((position, list_idx));
        word_pos_sum[list_idx] = position;
        pointers[list_idx] += 1;
        if pointers[list_idx] < present[list_idx].len() {
            heap.push(Reverse((present[list_idx][pointers[list_idx]], list_idx)));
        }
    };

    let mut window_queue: VecDeque<(u32, usize)> = VecDeque::new();
    let mut word_pos_sum: Vec<u32> = vec![0; present.len()];

    let mut max_match = 1u32;
    let mut min_displacement = u32::MAX;

    loop {
        if window_queue.is_empty() {
            pull_next(&mut heap, &mut pointers, &mut window_queue, &mut word_pos_sum);
        }

        let start_pos = window_queue.front().unwrap().0;
        while let Some(&Reverse((next_pos, _))) = heap.peek() {
            if next_pos >= start_pos + window as u32 {
                break;
            }
            pull_next(&mut heap, &mut pointers, &mut window_queue, &mut word_pos_sum);
        }

        let mut num_match = 0u32;
        let mut displacement = 0u32;
        let mut prev_pos = 0u32;
        for &pos in &word_pos_sum {
            if pos != 0 {
                num_match += 1;
                if prev_pos == 0 {
                    prev_pos = pos;
                } else {
                    displacement += pos.abs_diff(prev_pos);
                    prev_pos = pos;
                }
            }
        }

        if num_match >= max_match {
            max_match = num_match;
            if displacement != 0 && displacement < min_displacement {
                min_displacement = displacement;
            }
        }

        let (evicted_pos, evicted_idx) = window_queue.pop_front().unwrap();
        word_pos_sum[evicted_idx] -= evicted_pos;

        if heap.is_empty() {
            break;
        }
    }

    if min_displacement == u32::MAX {
        min_displacement = 0;
    }

    ProximityResult { max_match, min_displacement }
}

/// The full signal tuple a single document contributes for one matched
/// field, compared in strict lexicographic priority a through f
/// (spec.md §4.6):
///   (a) tokens_matched        — more is better
///   (b) proximity             — tighter matched-token window is better
///   (c) match_kind            — exact > prefix > typo > infix
///   (d) field_priority        — earlier in `query_by` is better
///   (e) default_sort_value    — higher is better
///   (f) seq_id                — lower is better (stable final tie-break)
#[derive(Debug, Clone, Copy)]
pub struct ScoreSignals {
    pub tokens_matched: u32,
    pub proximity: ProximityResult,
    pub match_kind: MatchKind,
    pub field_priority: u32,
    pub default_sort_value: Number,
    pub seq_id: DocId,
}

impl ScoreSignals {
    /// `Ordering::Less` means `self` ranks ahead of `other`. Sorting a
    /// slice of `ScoreSignals` with this comparator yields best-first
    /// order directly.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        Ordering::Equal
            .then_with(|| other.tokens_matched.cmp(&self.tokens_matched))
            .then_with(|| other.proximity.max_match.cmp(&self.proximity.max_match))
            .then_with(|| self.proximity.min_displacement.cmp(&other.proximity.min_displacement))
            .then_with(|| other.match_kind.cmp(&self.match_kind))
            .then_with(|| self.field_priority.cmp(&other.field_priority))
            .then_with(|| {
                other
                    .default_sort_value
                    .partial_cmp(&self.default_sort_value)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.seq_id.cmp(&other.seq_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_rewards_tokens_clustered_within_the_window() {
        // Both tokens land in a single window=5 span, so both count.
        let tight = compute_proximity(&[vec![10], vec![11]], 5);
        assert_eq!(tight.max_match, 2);

        // 10 and 50 never share a window=5 span, so they never co-occur
        // in view together — only one token is ever "in window" at a time.
        let scattered = compute_proximity(&[vec![10], vec![50]], 5);
        assert_eq!(scattered.max_match, 1);
    }

    #[test]
    fn proximity_prefers_tighter_span_among_equally_matched_windows() {
        let tight = compute_proximity(&[vec![10], vec![11]], 5);
        let looser = compute_proximity(&[vec![10], vec![14]], 5);
        assert_eq!(tight.max_match, 2);
        assert_eq!(looser.max_match, 2);
        assert!(tight.min_displacement < looser.min_displacement);
    }

    #[test]
    fn proximity_reports_max_match_as_present_token_count() {
        let result = compute_proximity(&[vec![1, 2], vec![], vec![3]], 5);
        assert_eq!(result.max_match, 2);
    }

    #[test]
    fn rank_cmp_orders_more_tokens_matched_first() {
        let seq_id = DocId::new(1);
        let better = ScoreSignals {
            tokens_matched: 3,
            proximity: ProximityResult::default(),
            match_kind: MatchKind::Exact,
            field_priority: 0,
            default_sort_value: Number::Int(0),
            seq_id,
        };
        let worse = ScoreSignals { tokens_matched: 1, ..better };
        assert_eq!(better.rank_cmp(&worse), Ordering::Less);
    }

    #[test]
    fn rank_cmp_falls_back_to_seq_id_ascending() {
        let base = ScoreSignals {
            tokens_matched: 1,
            proximity: ProximityResult::default(),
            match_kind: MatchKind::Exact,
            field_priority: 0,
            default_sort_value: Number::Int(0),
            seq_id: DocId::new(5),
        };
        let later = ScoreSignals { seq_id: DocId::new(10), ..base };
        assert_eq!(base.rank_cmp(&later), Ordering::Less);
    }
}
