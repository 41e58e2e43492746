//! Turning ranked groups into per-level index keys.
//!
//! Given groups sorted by score, level `n` of the **reduced** encoding drops
//! the `n` lowest-scoring groups (tail drop):
//!
//! ```text
//! groups:  [g0, g1, g2, g3]          (g0 highest mean weight)
//! R0 = g0#g1#g2#g3   most specific, smallest buckets
//! R1 = g0#g1#g2
//! R2 = g0#g1
//! R3 = g0            coarsest, largest buckets
//! ```
//!
//! The **top** encoding keeps the `n` highest-scoring groups instead.

use super::{hash32, Group, HashCode, HashLevel, EMPTY_LABEL, GROUP_SEPARATOR};

#[derive(Debug, Clone)]
pub struct GroupEncoder {
    groups: Vec<Group>,
}

impl GroupEncoder {
    /// `groups` must already be sorted by descending mean weight.
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn join(&self, keep: usize) -> String {
        if self.groups.is_empty() {
            return EMPTY_LABEL.to_string();
        }
        self.groups[..keep.clamp(1, self.groups.len())]
            .iter()
            .map(|g| g.label.as_str())
            .collect::<Vec<_>>()
            .join(GROUP_SEPARATOR)
    }

    /// Label of every group except the `n` lowest-scoring ones.
    ///
    /// Falls back to the top group alone when `n >= group_count()`.
    pub fn reduced_label(&self, n: usize) -> String {
        self.join(self.groups.len().saturating_sub(n))
    }

    pub fn reduced_hash(&self, n: usize) -> i32 {
        hash32(&self.reduced_label(n))
    }

    /// Group labels of [`GroupEncoder::reduced_label`] as separate tokens.
    pub fn reduced_tokens(&self, n: usize) -> Vec<String> {
        split_tokens(&self.reduced_label(n))
    }

    /// Label of the `n` highest-scoring groups (at least one).
    pub fn top_label(&self, n: usize) -> String {
        self.join(n)
    }

    pub fn top_hash(&self, n: usize) -> i32 {
        hash32(&self.top_label(n))
    }

    /// Reduced encoding over `depth` levels.
    ///
    /// Level `L` drops the `L` lowest groups, except the last level, which
    /// always keeps the top group alone.
    pub fn encode(&self, depth: usize) -> HashCode {
        let levels = (0..depth)
            .map(|level| {
                let n = if level + 1 == depth {
                    self.groups.len()
                } else {
                    level
                };
                HashLevel::new(self.reduced_label(n))
            })
            .collect();
        HashCode::new(levels)
    }
}

/// Split a `#`-joined label into group tokens.
pub(crate) fn split_tokens(label: &str) -> Vec<String> {
    label
        .split(GROUP_SEPARATOR)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
