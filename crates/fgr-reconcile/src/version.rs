use crate::{ChangeSet, EdgeId, GroupId, ProvisionPlan, Uid};
use serde::Serialize;
use std::fmt;

/// Contiguous range `[start, start + len)` granted by one allocator call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VersionBlock {
    start: i64,
    len: u64,
}

impl VersionBlock {
    /// Build from the allocator's post-increment value: `start = end - count + 1`.
    pub fn from_end(end: i64, count: u64) -> Result<Self, BlockError> {
        if count == 0 {
            return Err(BlockError::Empty);
        }
        let span = i64::try_from(count).map_err(|_| BlockError::Overflow { end, count })?;
        let start = end
            .checked_sub(span)
            .and_then(|v| v.checked_add(1))
            .ok_or(BlockError::Overflow { end, count })?;
        Ok(Self { start, len: count })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Last value in the block (inclusive).
    pub fn last(&self) -> i64 {
        self.start + self.len as i64 - 1
    }

    pub fn contains(&self, v: i64) -> bool {
        v >= self.start && v <= self.last()
    }

    pub fn values(&self) -> impl Iterator<Item = i64> {
        let start = self.start;
        (0..self.len as i64).map(move |i| start + i)
    }
}

impl fmt::Display for VersionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.last())
    }
}

/// Version assignment refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockError {
    /// A block of zero values was requested; callers must skip the reservation instead.
    Empty,
    /// `end - count + 1` does not fit in i64.
    Overflow { end: i64, count: u64 },
    /// Rows and reserved values disagree in number.
    SizeMismatch { rows: usize, reserved: u64 },
    /// Two rows share an ordering key, so the assignment order is not total.
    DuplicateKey,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::Empty => write!(f, "version block must hold at least one value"),
            BlockError::Overflow { end, count } => {
                write!(f, "version block overflow: end={end} count={count}")
            }
            BlockError::SizeMismatch { rows, reserved } => write!(
                f,
                "version block size mismatch: rows={rows} reserved={reserved}"
            ),
            BlockError::DuplicateKey => {
                write!(f, "duplicate ordering key: version assignment would not be total")
            }
        }
    }
}

impl std::error::Error for BlockError {}

/// Sort `rows` by `key` and bind `start + i` to the i-th row.
///
/// Keys must be unique and the block must be exactly as large as `rows`.
pub fn assign_versions<T, K, F>(
    mut rows: Vec<T>,
    key: F,
    block: &VersionBlock,
) -> Result<Vec<(T, i64)>, BlockError>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    if rows.len() as u64 != block.len() {
        return Err(BlockError::SizeMismatch {
            rows: rows.len(),
            reserved: block.len(),
        });
    }
    rows.sort_by(|a, b| key(a).cmp(&key(b)));
    if rows.windows(2).any(|w| key(&w[0]) == key(&w[1])) {
        return Err(BlockError::DuplicateKey);
    }
    Ok(rows.into_iter().zip(block.values()).collect())
}

/// Edge update ready to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeWrite {
    pub edge_id: EdgeId,
    /// Value the diff saw (`NULL` folded to 0). The write only lands if it still matches.
    pub expected: GroupId,
    pub target: GroupId,
    pub version: i64,
}

/// Default group to insert (or resurrect on the `(uid, name)` key).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInsert {
    pub uid: Uid,
    pub version: i64,
}

/// Existing default group to refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRefresh {
    pub group_id: GroupId,
    pub version: i64,
}

/// Edge writes in `edge_id` order.
pub fn edge_writes(changes: &ChangeSet, block: &VersionBlock) -> Result<Vec<EdgeWrite>, BlockError> {
    if !changes.awaiting_default.is_empty() {
        return Err(BlockError::SizeMismatch {
            rows: changes.to_update(),
            reserved: block.len(),
        });
    }
    let assigned = assign_versions(changes.changes.clone(), |c| c.edge_id, block)?;
    Ok(assigned
        .into_iter()
        .map(|(c, version)| EdgeWrite {
            edge_id: c.edge_id,
            expected: c.current,
            target: c.target,
            version,
        })
        .collect())
}

/// Inserts for owners missing a default, in uid order.
pub fn group_inserts(plan: &ProvisionPlan, block: &VersionBlock) -> Result<Vec<GroupInsert>, BlockError> {
    let assigned = assign_versions(plan.missing_owners.clone(), |uid| uid.clone(), block)?;
    Ok(assigned
        .into_iter()
        .map(|(uid, version)| GroupInsert { uid, version })
        .collect())
}

/// Refreshes for existing defaults, in id order.
pub fn group_refreshes(plan: &ProvisionPlan, block: &VersionBlock) -> Result<Vec<GroupRefresh>, BlockError> {
    let assigned = assign_versions(plan.existing_groups.clone(), |id| *id, block)?;
    Ok(assigned
        .into_iter()
        .map(|(group_id, version)| GroupRefresh { group_id, version })
        .collect())
}
