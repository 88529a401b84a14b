//! Client-side permission gating
//!
//! Permissions arrive from the API as `resource:action` strings. Either half
//! may be `*`, and the `manage` action implies every other action on the same
//! resource. The server stays authoritative; this only decides what to offer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Actions that can be performed on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Manage => "manage",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionDenied {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Missing permission {resource}:{action}")]
    Missing { resource: String, action: Action },
}

pub type PermissionResult = Result<(), PermissionDenied>;

/// The permissions held by the current user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: HashSet<(String, String)>,
}

impl PermissionSet {
    /// Build from `resource:action` names. Malformed names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let grants = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref().trim();
                match name.split_once(':') {
                    Some((resource, action)) if !resource.is_empty() && !action.is_empty() => {
                        Some((resource.to_lowercase(), action.to_lowercase()))
                    }
                    _ => {
                        tracing::warn!(permission = name, "Ignoring malformed permission");
                        None
                    }
                }
            })
            .collect();
        Self { grants }
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn allows(&self, resource: &str, action: Action) -> bool {
        let resource = resource.to_lowercase();
        [resource.as_str(), "*"].iter().any(|r| {
            [action.as_str(), Action::Manage.as_str(), "*"]
                .iter()
                .any(|a| self.grants.contains(&((*r).to_string(), (*a).to_string())))
        })
    }

    pub fn check(&self, resource: &str, action: Action) -> PermissionResult {
        if self.allows(resource, action) {
            Ok(())
        } else {
            Err(PermissionDenied::Missing {
                resource: resource.to_string(),
                action,
            })
        }
    }
}
