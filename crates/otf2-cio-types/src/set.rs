use std::cmp::Ordering;
use std::collections::BTreeSet;

use facet::Facet;

use crate::VertexId;

/// Whether a [`CioSet`] is still accumulating I/O events or has been
/// closed by a synchronization.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SetState {
    Open,
    Close,
}

/// A Concurrent I/O Set (or, before merging, a per-process fragment of
/// one): a maximal group of I/O events bounded by two synchronization
/// points.
///
/// Equality and ordering are defined by `members` alone (spec: used for
/// deduplication and canonicalization of merge results), so `start_event`,
/// `end_event`, `origin`, and `state` are deliberately excluded from the
/// derived comparisons below.
#[derive(Facet, Debug, Clone)]
pub struct CioSet {
    pub start_event: VertexId,
    pub end_event: Option<VertexId>,
    /// The event that caused this set to close on the process that
    /// discovered it; distinct from `end_event` once the close is shared
    /// with other processes via `root_event`.
    pub origin: Option<VertexId>,
    pub state: SetState,
    pub members: BTreeSet<VertexId>,
}

impl CioSet {
    /// Opens a new, empty set starting at `start_event`.
    pub fn open(start_event: VertexId) -> Self {
        Self {
            start_event,
            end_event: None,
            origin: None,
            state: SetState::Open,
            members: BTreeSet::new(),
        }
    }

    pub fn insert_member(&mut self, member: VertexId) {
        debug_assert!(self.is_open(), "cannot add members to a closed CioSet");
        self.members.insert(member);
    }

    /// Closes the set: `end_event` becomes `Some`, `origin` records the
    /// event that drove the close on this process.
    pub fn close(&mut self, end_event: VertexId, origin: VertexId) {
        self.end_event = Some(end_event);
        self.origin = Some(origin);
        self.state = SetState::Close;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SetState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SetState::Close)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Builds the merge candidate for a set of component fragments: the
    /// minimum start event, and the union of their members. The result is
    /// left Open; the merge engine closes it once it has picked an
    /// end-event.
    pub fn from_fragments<'a>(fragments: impl IntoIterator<Item = &'a CioSet>) -> Self {
        let mut start_event: Option<VertexId> = None;
        let mut members = BTreeSet::new();
        for fragment in fragments {
            members.extend(fragment.members.iter().copied());
            start_event = Some(match start_event {
                Some(current) => current.min(fragment.start_event),
                None => fragment.start_event,
            });
        }
        Self {
            start_event: start_event.expect("from_fragments requires at least one fragment"),
            end_event: None,
            origin: None,
            state: SetState::Open,
            members,
        }
    }
}

impl PartialEq for CioSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for CioSet {}

impl PartialOrd for CioSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CioSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.members.cmp(&other.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(n: u32) -> VertexId {
        VertexId::from_index(n)
    }

    #[test]
    fn equality_ignores_start_and_end() {
        let mut a = CioSet::open(vid(0));
        a.insert_member(vid(1));
        a.close(vid(2), vid(2));

        let mut b = CioSet::open(vid(99));
        b.insert_member(vid(1));
        b.close(vid(50), vid(50));

        assert_eq!(a, b);
    }

    #[test]
    fn from_fragments_takes_min_start_and_union_members() {
        let mut a = CioSet::open(vid(5));
        a.insert_member(vid(6));
        a.insert_member(vid(7));

        let mut b = CioSet::open(vid(2));
        b.insert_member(vid(7));
        b.insert_member(vid(8));

        let merged = CioSet::from_fragments([&a, &b]);
        assert_eq!(merged.start_event, vid(2));
        assert_eq!(
            merged.members,
            BTreeSet::from([vid(6), vid(7), vid(8)])
        );
        assert!(merged.is_open());
    }
}
