// Vote domain types - pure, no storage access
use std::fmt;

/// A single user's stance on a target. Stored as +1 / -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    pub fn value(&self) -> i64 {
        match self {
            Vote::Like => 1,
            Vote::Dislike => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Vote::Like),
            -1 => Some(Vote::Dislike),
            _ => None,
        }
    }
}

/// Something that can be voted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    pub fn id(&self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => *id,
        }
    }

    pub(crate) fn vote_table(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_votes",
            VoteTarget::Comment(_) => "comment_votes",
        }
    }

    pub(crate) fn key_column(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }

    pub(crate) fn target_table(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "posts",
            VoteTarget::Comment(_) => "comments",
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTarget::Post(id) => write!(f, "post {}", id),
            VoteTarget::Comment(id) => write!(f, "comment {}", id),
        }
    }
}

/// The storage write needed to move from one vote state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert(Vote),
    Update(Vote),
    Delete,
}

impl VoteChange {
    /// Vote state once this change is applied.
    pub fn result(&self) -> Option<Vote> {
        match self {
            VoteChange::Insert(v) | VoteChange::Update(v) => Some(*v),
            VoteChange::Delete => None,
        }
    }
}

/// Toggle semantics: repeating the current vote clears it, the opposite vote flips it.
pub fn transition(current: Option<Vote>, action: Vote) -> VoteChange {
    match current {
        None => VoteChange::Insert(action),
        Some(existing) if existing == action => VoteChange::Delete,
        Some(_) => VoteChange::Update(action),
    }
}

/// Aggregates for one target, derived from the vote rows at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteStats {
    pub likes: i64,
    pub dislikes: i64,
    pub caller_vote: Option<Vote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use Vote::*;
        assert_eq!(transition(None, Like), VoteChange::Insert(Like));
        assert_eq!(transition(None, Dislike), VoteChange::Insert(Dislike));
        assert_eq!(transition(Some(Like), Like), VoteChange::Delete);
        assert_eq!(transition(Some(Like), Dislike), VoteChange::Update(Dislike));
        assert_eq!(transition(Some(Dislike), Like), VoteChange::Update(Like));
        assert_eq!(transition(Some(Dislike), Dislike), VoteChange::Delete);
    }

    #[test]
    fn same_action_twice_returns_to_no_vote() {
        for action in [Vote::Like, Vote::Dislike] {
            let once = transition(None, action).result();
            assert_eq!(transition(once, action).result(), None);
        }
    }

    #[test]
    fn opposite_action_never_passes_through_no_vote() {
        let liked = Some(Vote::Like);
        assert_eq!(transition(liked, Vote::Dislike).result(), Some(Vote::Dislike));
    }

    #[test]
    fn stored_values() {
        assert_eq!(Vote::Like.value(), 1);
        assert_eq!(Vote::Dislike.value(), -1);
        assert_eq!(Vote::from_value(-1), Some(Vote::Dislike));
        assert_eq!(Vote::from_value(0), None);
    }

    #[test]
    fn target_naming() {
        assert_eq!(VoteTarget::Post(3).to_string(), "post 3");
        assert_eq!(VoteTarget::Comment(9).id(), 9);
        assert_eq!(VoteTarget::Comment(9).vote_table(), "comment_votes");
    }
}
