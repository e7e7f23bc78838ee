//! core::changes
//!
//! Change records: the workspace view of working-tree status.

use std::fmt;

use serde::Serialize;

use crate::git::FileState;

/// Closed set of change kinds.
///
/// Index and working-tree variants of the same kind collapse to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChanged,
    Ignored,
    Conflicted,
    None,
}

impl ChangeKind {
    /// Whether a path of this kind is staged by a workspace commit.
    pub fn is_committable(self) -> bool {
        !matches!(
            self,
            ChangeKind::Ignored | ChangeKind::Conflicted | ChangeKind::None
        )
    }

    /// Short label used in status listings.
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::TypeChanged => "typechange",
            ChangeKind::Ignored => "ignored",
            ChangeKind::Conflicted => "conflicted",
            ChangeKind::None => "unchanged",
        }
    }
}

impl From<FileState> for ChangeKind {
    fn from(state: FileState) -> Self {
        match state {
            FileState::NewInIndex | FileState::NewInWorkdir => ChangeKind::Added,
            FileState::ModifiedInIndex | FileState::ModifiedInWorkdir => ChangeKind::Modified,
            FileState::DeletedFromIndex | FileState::DeletedFromWorkdir => ChangeKind::Deleted,
            FileState::RenamedInIndex | FileState::RenamedInWorkdir => ChangeKind::Renamed,
            FileState::TypeChangeInIndex | FileState::TypeChangeInWorkdir => {
                ChangeKind::TypeChanged
            }
            FileState::Ignored => ChangeKind::Ignored,
            FileState::Conflicted => ChangeKind::Conflicted,
            FileState::Unaltered => ChangeKind::None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One changed path in one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub workspace: String,
    pub module: String,
    /// Path relative to the module's working tree
    pub path: String,
    pub kind: ChangeKind,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}  [{}] {}", self.kind, self.module, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_workdir_collapse() {
        assert_eq!(ChangeKind::from(FileState::NewInIndex), ChangeKind::Added);
        assert_eq!(ChangeKind::from(FileState::NewInWorkdir), ChangeKind::Added);
        assert_eq!(
            ChangeKind::from(FileState::TypeChangeInIndex),
            ChangeKind::from(FileState::TypeChangeInWorkdir)
        );
        assert_eq!(
            ChangeKind::from(FileState::RenamedInWorkdir),
            ChangeKind::Renamed
        );
    }

    #[test]
    fn committable_kinds() {
        assert!(ChangeKind::Added.is_committable());
        assert!(ChangeKind::Deleted.is_committable());
        assert!(!ChangeKind::Ignored.is_committable());
        assert!(!ChangeKind::Conflicted.is_committable());
        assert!(!ChangeKind::None.is_committable());
    }

    #[test]
    fn record_display() {
        let record = ChangeRecord {
            workspace: "product".to_string(),
            module: "framework".to_string(),
            path: "src/lib.rs".to_string(),
            kind: ChangeKind::Modified,
        };
        let line = record.to_string();
        assert!(line.contains("modified"));
        assert!(line.ends_with("[framework] src/lib.rs"));
    }
}
