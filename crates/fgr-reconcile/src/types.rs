use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User identifier (`uid` / `to_uid` / `friend_uid` columns).
pub type Uid = String;

/// Primary key of a `friend_group` row.
pub type GroupId = i64;

/// Primary key of a `friend` row.
pub type EdgeId = i64;

/// Soft-delete capability shared by every row kind.
///
/// A missing flag (`NULL` in the store) counts as "not deleted".
pub trait SoftDelete {
    fn deleted_flag(&self) -> Option<bool>;

    fn is_active(&self) -> bool {
        !self.deleted_flag().unwrap_or(false)
    }
}

/// One `friend_group` row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: GroupId,
    pub uid: Uid,
    pub name: String,
    pub is_default: bool,
    pub is_deleted: Option<bool>,
    pub version: Option<i64>,
}

impl GroupRow {
    pub fn new(id: GroupId, uid: impl Into<Uid>, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            id,
            uid: uid.into(),
            name: name.into(),
            is_default,
            is_deleted: Some(false),
            version: None,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = Some(true);
        self
    }

    /// Active and flagged default.
    pub fn is_active_default(&self) -> bool {
        self.is_default && self.is_active()
    }
}

impl SoftDelete for GroupRow {
    fn deleted_flag(&self) -> Option<bool> {
        self.is_deleted
    }
}

/// One `friend_group_member` row: `uid` placed `friend_uid` into `group_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub group_id: GroupId,
    pub uid: Uid,
    pub friend_uid: Uid,
    pub is_deleted: Option<bool>,
}

impl MembershipRow {
    pub fn new(group_id: GroupId, uid: impl Into<Uid>, friend_uid: impl Into<Uid>) -> Self {
        Self {
            group_id,
            uid: uid.into(),
            friend_uid: friend_uid.into(),
            is_deleted: Some(false),
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = Some(true);
        self
    }
}

impl SoftDelete for MembershipRow {
    fn deleted_flag(&self) -> Option<bool> {
        self.is_deleted
    }
}

/// One `friend` row (directed edge owner -> counterpart).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: EdgeId,
    pub uid: Uid,
    pub to_uid: Uid,
    pub friend_group_id: Option<GroupId>,
    pub is_deleted: Option<bool>,
    pub version: Option<i64>,
}

impl EdgeRow {
    pub fn new(id: EdgeId, uid: impl Into<Uid>, to_uid: impl Into<Uid>) -> Self {
        Self {
            id,
            uid: uid.into(),
            to_uid: to_uid.into(),
            friend_group_id: None,
            is_deleted: Some(false),
            version: None,
        }
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.friend_group_id = Some(group_id);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = Some(true);
        self
    }

    /// Stored group with `NULL` folded to 0, the way the diff compares it.
    pub fn current_group(&self) -> GroupId {
        self.friend_group_id.unwrap_or(0)
    }
}

impl SoftDelete for EdgeRow {
    fn deleted_flag(&self) -> Option<bool> {
        self.is_deleted
    }
}

/// Which edges are eligible for the change set, by soft-delete state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeScope {
    #[default]
    All,
    ActiveOnly,
    DeletedOnly,
}

impl EdgeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeScope::All => "all",
            EdgeScope::ActiveOnly => "active_only",
            EdgeScope::DeletedOnly => "deleted_only",
        }
    }

    fn admits(&self, edge: &EdgeRow) -> bool {
        match self {
            EdgeScope::All => true,
            EdgeScope::ActiveOnly => edge.is_active(),
            EdgeScope::DeletedOnly => !edge.is_active(),
        }
    }
}

/// Narrowing filters applied before the diff.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    pub scope: EdgeScope,
    /// Counterparts that are system accounts and never regrouped.
    pub excluded_counterparts: BTreeSet<Uid>,
}

impl EdgeFilter {
    pub fn new(scope: EdgeScope) -> Self {
        Self {
            scope,
            excluded_counterparts: BTreeSet::new(),
        }
    }

    pub fn excluding<I, S>(mut self, counterparts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Uid>,
    {
        self.excluded_counterparts
            .extend(counterparts.into_iter().map(Into::into));
        self
    }

    pub fn admits(&self, edge: &EdgeRow) -> bool {
        self.scope.admits(edge) && !self.excluded_counterparts.contains(&edge.to_uid)
    }
}
