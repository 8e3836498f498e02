//! Authorization checks for session mutations

use std::fmt;
use std::str::FromStr;

use super::error::ServiceError;

/// Capability required by a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    ObjectsBookmark,
    ObjectsPublish,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectsBookmark => "objects:bookmark",
            Self::ObjectsPublish => "objects:publish",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a user inside one project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!(
                "Invalid role '{}'. Valid options: owner, admin, member, viewer",
                s
            )),
        }
    }
}

impl ProjectRole {
    fn scopes(&self) -> &'static [Scope] {
        match self {
            Self::Owner | Self::Admin | Self::Member => {
                &[Scope::ObjectsBookmark, Scope::ObjectsPublish]
            }
            Self::Viewer => &[],
        }
    }
}

/// The user performing a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: ProjectRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ProjectRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Grants or denies a scope to an actor within a project
pub trait AccessControl: Send + Sync {
    /// `ServiceError::Forbidden` on denial
    fn check(&self, actor: &Actor, project_id: &str, scope: Scope) -> Result<(), ServiceError>;
}

/// Static role to scope table
#[derive(Debug, Default)]
pub struct ScopeAccessControl;

impl AccessControl for ScopeAccessControl {
    fn check(&self, actor: &Actor, project_id: &str, scope: Scope) -> Result<(), ServiceError> {
        if actor.role.scopes().contains(&scope) {
            return Ok(());
        }
        tracing::warn!(
            actor = %actor.id,
            role = ?actor.role,
            project_id,
            scope = %scope,
            "Access denied"
        );
        Err(ServiceError::forbidden(
            "FORBIDDEN",
            format!("missing scope {} on project {}", scope, project_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_can_bookmark_and_publish() {
        let actor = Actor::new("alice", ProjectRole::Member);
        let access = ScopeAccessControl;
        assert!(access.check(&actor, "p", Scope::ObjectsBookmark).is_ok());
        assert!(access.check(&actor, "p", Scope::ObjectsPublish).is_ok());
    }

    #[test]
    fn test_viewer_is_forbidden() {
        let actor = Actor::new("bob", ProjectRole::Viewer);
        let err = ScopeAccessControl
            .check(&actor, "p", Scope::ObjectsPublish)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden { .. }));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Owner".parse::<ProjectRole>(), Ok(ProjectRole::Owner));
        assert_eq!("admin".parse::<ProjectRole>(), Ok(ProjectRole::Admin));
        assert!("guest".parse::<ProjectRole>().is_err());
        assert_eq!(Scope::ObjectsBookmark.to_string(), "objects:bookmark");
    }
}
