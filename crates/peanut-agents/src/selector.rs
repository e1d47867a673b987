//! Smooth weighted round-robin selection.
//!
//! The Nginx algorithm: every selection adds each agent's weight to
//! its accumulated `current_weight`, picks the maximum, then subtracts
//! the total weight from the winner. The emitted sequence matches the
//! weight ratios without long runs of one agent.

#[derive(Debug, Clone)]
struct Slot {
    agent_id: String,
    weight: i64,
    current_weight: i64,
}

/// In-process selection state over the current online set.
///
/// Callers hold this behind a mutex; selection itself is a handful of
/// integer operations.
#[derive(Debug, Clone, Default)]
pub(crate) struct WeightedSelector {
    slots: Vec<Slot>,
}

impl WeightedSelector {
    /// Build a selector over `(agent_id, weight)` pairs, keeping the
    /// given first-seen order for tie-breaking.
    pub(crate) fn new(agents: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            slots: agents
                .into_iter()
                .map(|(agent_id, weight)| Slot {
                    agent_id,
                    weight: i64::from(weight),
                    current_weight: 0,
                })
                .collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pick the next agent id.
    pub(crate) fn select(&mut self) -> Option<&str> {
        if self.slots.is_empty() {
            return None;
        }

        let total: i64 = self.slots.iter().map(|s| s.weight).sum();
        for slot in &mut self.slots {
            slot.current_weight += slot.weight;
        }

        let mut best = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.current_weight > self.slots[best].current_weight {
                best = index;
            }
        }

        self.slots[best].current_weight -= total;
        Some(&self.slots[best].agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn selector(weights: &[(&str, u32)]) -> WeightedSelector {
        WeightedSelector::new(
            weights
                .iter()
                .map(|(id, w)| ((*id).to_string(), *w)),
        )
    }

    #[test]
    fn test_empty_set() {
        let mut sel = WeightedSelector::default();
        assert!(sel.is_empty());
        assert!(sel.select().is_none());
    }

    #[test]
    fn test_single_agent() {
        let mut sel = selector(&[("only", 7)]);
        for _ in 0..5 {
            assert_eq!(sel.select(), Some("only"));
        }
    }

    #[test]
    fn test_shares_converge_to_weights() {
        let mut sel = selector(&[("a", 5), ("b", 3), ("c", 2)]);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..1000 {
            let id = sel.select().unwrap().to_string();
            *counts.entry(id).or_default() += 1;
        }

        // 5:3:2 over a multiple of the cycle length is exact.
        assert_eq!(counts["a"], 500);
        assert_eq!(counts["b"], 300);
        assert_eq!(counts["c"], 200);
    }

    #[test]
    fn test_no_long_runs() {
        let mut sel = selector(&[("a", 5), ("b", 3), ("c", 2)]);
        let picks: Vec<String> = (0..100).map(|_| sel.select().unwrap().to_string()).collect();

        // The smooth variant interleaves: the dominant agent never
        // appears more than twice in a row at these weights.
        let mut longest_run = 1;
        let mut run = 1;
        for pair in picks.windows(2) {
            if pair[0] == pair[1] {
                run += 1;
                longest_run = longest_run.max(run);
            } else {
                run = 1;
            }
        }
        assert!(longest_run <= 2, "longest run was {longest_run}");
    }

    #[test]
    fn test_known_sequence() {
        // The classic nginx example: weights 5/1/1 produce
        // a a b a c a a, keeping the heavy agent interleaved.
        let mut sel = selector(&[("a", 5), ("b", 1), ("c", 1)]);
        let picks: Vec<&str> = (0..7).map(|_| sel.select().unwrap()).collect();
        assert_eq!(picks, ["a", "a", "b", "a", "c", "a", "a"]);
    }

    #[test]
    fn test_ties_break_by_first_seen_order() {
        let mut sel = selector(&[("first", 1), ("second", 1)]);
        assert_eq!(sel.select(), Some("first"));
        assert_eq!(sel.select(), Some("second"));
        assert_eq!(sel.select(), Some("first"));
    }
}
