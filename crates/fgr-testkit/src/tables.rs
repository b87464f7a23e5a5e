use fgr_reconcile::{EdgeId, EdgeRow, GroupId, GroupRow, MembershipRow, Uid};

/// Row storage for [`crate::MemoryStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tables {
    pub users: Vec<Uid>,
    pub groups: Vec<GroupRow>,
    pub memberships: Vec<MembershipRow>,
    pub edges: Vec<EdgeRow>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, uid: &str) -> Self {
        self.users.push(uid.to_string());
        self
    }

    pub fn group(mut self, row: GroupRow) -> Self {
        self.groups.push(row);
        self
    }

    pub fn member(mut self, row: MembershipRow) -> Self {
        self.memberships.push(row);
        self
    }

    pub fn edge(mut self, row: EdgeRow) -> Self {
        self.edges.push(row);
        self
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<&EdgeRow> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn group_by_id(&self, id: GroupId) -> Option<&GroupRow> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_named(&self, uid: &str, name: &str) -> Option<&GroupRow> {
        self.groups.iter().find(|g| g.uid == uid && g.name == name)
    }

    /// Next id a bigserial column would hand out.
    pub(crate) fn next_group_id(&self) -> GroupId {
        self.groups.iter().map(|g| g.id).max().unwrap_or(0) + 1
    }
}
