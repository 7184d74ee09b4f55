use serde::{Deserialize, Serialize};

use super::aspect::AspectValue;
use super::ScopeId;

/// Commands accepted by the Command Pipeline for the Scope aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScopeCommand {
    CreateScope {
        title: String,
        parent_id: Option<ScopeId>,
        description: Option<String>,
        canonical_alias: Option<String>,
    },
    RenameScope {
        id: ScopeId,
        title: String,
    },
    SetDescription {
        id: ScopeId,
        description: Option<String>,
    },
    ReparentScope {
        id: ScopeId,
        new_parent_id: Option<ScopeId>,
    },
    SetAspect {
        id: ScopeId,
        key: String,
        values: Vec<AspectValue>,
    },
    RemoveAspect {
        id: ScopeId,
        key: String,
    },
    AddAlias {
        id: ScopeId,
        name: String,
    },
    RemoveAlias {
        id: ScopeId,
        name: String,
    },
    SetCanonicalAlias {
        id: ScopeId,
        name: String,
    },
    ArchiveScope {
        id: ScopeId,
    },
    UnarchiveScope {
        id: ScopeId,
    },
}

impl ScopeCommand {
    /// The aggregate this command targets, or `None` for `CreateScope` which
    /// targets a not-yet-allocated id (the Command Pipeline mints one).
    pub fn target(&self) -> Option<ScopeId> {
        match self {
            ScopeCommand::CreateScope { .. } => None,
            ScopeCommand::RenameScope { id, .. }
            | ScopeCommand::SetDescription { id, .. }
            | ScopeCommand::ReparentScope { id, .. }
            | ScopeCommand::SetAspect { id, .. }
            | ScopeCommand::RemoveAspect { id, .. }
            | ScopeCommand::AddAlias { id, .. }
            | ScopeCommand::RemoveAlias { id, .. }
            | ScopeCommand::SetCanonicalAlias { id, .. }
            | ScopeCommand::ArchiveScope { id }
            | ScopeCommand::UnarchiveScope { id } => Some(*id),
        }
    }
}
