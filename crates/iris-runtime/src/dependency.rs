//! Arm dependency graph.
//!
//! Relations between arms come from three attributes:
//!
//! | Relation | Rule |
//! |---|---|
//! | upstream | the other arm's downstream hashtag appears in this arm's notes |
//! | downstream | this arm's downstream hashtag appears in the other arm's notes |
//! | opposing | both arms are opposing and their locations oppose |
//!
//! Lists hold names only; peers are looked up in the sweep snapshot, and a
//! name missing from the snapshot is treated as unsafe by the caller.

use crate::gate_arm::ArmSnapshot;

/// Neighbour lists of one arm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub opposing: Vec<String>,
    pub downstream: Vec<String>,
    pub upstream: Vec<String>,
}

impl Dependencies {
    /// Scan every other active arm and collect relations to `this`.
    pub fn build<'a>(
        this: &ArmSnapshot,
        peers: impl IntoIterator<Item = &'a ArmSnapshot>,
    ) -> Self {
        let mut deps = Self::default();
        for other in peers {
            if other.name == this.name || !other.active {
                continue;
            }
            if other
                .downstream
                .as_deref()
                .is_some_and(|tag| has_hashtag(this.notes.as_deref(), tag))
            {
                deps.upstream.push(other.name.clone());
            }
            if this
                .downstream
                .as_deref()
                .is_some_and(|tag| has_hashtag(other.notes.as_deref(), tag))
            {
                deps.downstream.push(other.name.clone());
            }
            if this.opposing && other.opposing && this.geo_loc.opposes(&other.geo_loc) {
                deps.opposing.push(other.name.clone());
            }
        }
        deps
    }

    pub fn clear(&mut self) {
        self.opposing.clear();
        self.downstream.clear();
        self.upstream.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.opposing.is_empty() && self.downstream.is_empty() && self.upstream.is_empty()
    }
}

/// Normalize a hashtag: leading `#` stripped, lowercase.  Blank tags match
/// nothing.
fn normalize(tag: &str) -> Option<String> {
    let t = tag.trim().trim_start_matches('#');
    if t.is_empty() {
        None
    } else {
        Some(t.to_ascii_lowercase())
    }
}

/// Test whether `notes` contains `#tag` as a whole word (case-insensitive).
pub fn has_hashtag(notes: Option<&str>, tag: &str) -> bool {
    let (Some(notes), Some(tag)) = (notes, normalize(tag)) else {
        return false;
    };
    notes
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '#'))
        .filter_map(|word| word.strip_prefix('#'))
        .any(|word| word.eq_ignore_ascii_case(&tag))
}
