use std::fmt;

/// Which write a row count belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyTarget {
    GroupInsert,
    GroupRefresh,
    EdgeUpdate,
}

impl ApplyTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyTarget::GroupInsert => "group_insert",
            ApplyTarget::GroupRefresh => "group_refresh",
            ApplyTarget::EdgeUpdate => "edge_update",
        }
    }
}

/// A write touched a different number of rows than versions were reserved
/// for it. The unit of work is rolled back; the reserved block is abandoned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyMismatch {
    pub target: ApplyTarget,
    pub reserved: u64,
    pub affected: u64,
}

impl ApplyMismatch {
    /// `Ok` when the counts agree.
    pub fn check(target: ApplyTarget, reserved: usize, affected: u64) -> Result<(), ApplyMismatch> {
        let reserved = reserved as u64;
        if reserved == affected {
            Ok(())
        } else {
            Err(ApplyMismatch {
                target,
                reserved,
                affected,
            })
        }
    }
}

impl fmt::Display for ApplyMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "APPLY_MISMATCH target={} reserved={} affected={}",
            self.target.as_str(),
            self.reserved,
            self.affected
        )
    }
}

impl std::error::Error for ApplyMismatch {}
