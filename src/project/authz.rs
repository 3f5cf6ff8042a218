use std::sync::Arc;

use super::error::{ProjectResult, ProjectStoreExt};
use crate::store::Store;
use crate::types::{Project, ProjectRole, User};

/// A caller's effective standing on one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRole {
    SystemAdmin,
    ProjectAdmin,
    Member,
    None,
}

impl ResolvedRole {
    pub fn is_none(self) -> bool {
        self == ResolvedRole::None
    }
}

/// Single place where project permission decisions are made.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn Store>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn is_system_admin(&self, user_id: i64) -> ProjectResult<bool> {
        self.store
            .is_system_admin(user_id)
            .or_internal("Failed to check admin role")
    }

    /// Returns the explicit role row for the user, if any.
    pub fn explicit_role(&self, user_id: i64, project_id: i64) -> ProjectResult<Option<ProjectRole>> {
        let roles = self
            .store
            .get_user_project_roles(user_id, project_id)
            .or_internal("Failed to get user's project role")?;
        Ok(roles.first().copied())
    }

    /// System admin overrides every explicit role.
    pub fn resolve_role(&self, user_id: i64, project_id: i64) -> ProjectResult<ResolvedRole> {
        if self.is_system_admin(user_id)? {
            return Ok(ResolvedRole::SystemAdmin);
        }

        Ok(match self.explicit_role(user_id, project_id)? {
            Some(ProjectRole::ProjectAdmin) => ResolvedRole::ProjectAdmin,
            Some(ProjectRole::Developer | ProjectRole::Guest) => ResolvedRole::Member,
            None => ResolvedRole::None,
        })
    }

    /// True if the user holds any role on the project, regardless of visibility.
    pub fn is_member(&self, user_id: i64, project_id: i64) -> ProjectResult<bool> {
        Ok(!self.resolve_role(user_id, project_id)?.is_none())
    }

    pub fn can_read(&self, caller: Option<&User>, project: &Project) -> ProjectResult<bool> {
        if project.public {
            return Ok(true);
        }
        match caller {
            Some(user) => self.is_member(user.id, project.id),
            None => Ok(false),
        }
    }

    pub fn can_administer(&self, user_id: i64, project_id: i64) -> ProjectResult<bool> {
        Ok(matches!(
            self.resolve_role(user_id, project_id)?,
            ResolvedRole::SystemAdmin | ResolvedRole::ProjectAdmin
        ))
    }

    pub fn can_create_project(&self, user_id: i64, only_admin: bool) -> ProjectResult<bool> {
        if !only_admin {
            return Ok(true);
        }
        self.is_system_admin(user_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{NewProject, ProjectMember};

    struct Fixture {
        _temp: TempDir,
        store: Arc<dyn Store>,
        authz: Authorizer,
        admin: User,
        owner: User,
        guest: User,
        stranger: User,
        project: Project,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let sqlite = SqliteStore::new(temp.path().join("test.db")).unwrap();
        sqlite.initialize().unwrap();
        let store: Arc<dyn Store> = Arc::new(sqlite);

        let admin = store.create_user("admin", true).unwrap();
        let owner = store.create_user("owner", false).unwrap();
        let guest = store.create_user("guest", false).unwrap();
        let stranger = store.create_user("stranger", false).unwrap();

        let id = store
            .create_project(&NewProject {
                owner_id: owner.id,
                name: "alpha".to_string(),
                public: false,
                created_at: Utc::now(),
            })
            .unwrap();
        store
            .upsert_project_member(&ProjectMember {
                project_id: id,
                user_id: guest.id,
                role: ProjectRole::Guest,
                created_at: Utc::now(),
            })
            .unwrap();
        let project = store.get_project(id).unwrap().unwrap();

        Fixture {
            _temp: temp,
            authz: Authorizer::new(store.clone()),
            store,
            admin,
            owner,
            guest,
            stranger,
            project,
        }
    }

    #[test]
    fn test_resolve_role() {
        let f = fixture();
        let pid = f.project.id;
        assert_eq!(
            f.authz.resolve_role(f.admin.id, pid).unwrap(),
            ResolvedRole::SystemAdmin
        );
        assert_eq!(
            f.authz.resolve_role(f.owner.id, pid).unwrap(),
            ResolvedRole::ProjectAdmin
        );
        assert_eq!(
            f.authz.resolve_role(f.guest.id, pid).unwrap(),
            ResolvedRole::Member
        );
        assert_eq!(
            f.authz.resolve_role(f.stranger.id, pid).unwrap(),
            ResolvedRole::None
        );
    }

    #[test]
    fn test_system_admin_overrides_explicit_role() {
        let f = fixture();
        f.store
            .upsert_project_member(&ProjectMember {
                project_id: f.project.id,
                user_id: f.admin.id,
                role: ProjectRole::Guest,
                created_at: Utc::now(),
            })
            .unwrap();
        assert!(f.authz.can_administer(f.admin.id, f.project.id).unwrap());
    }

    #[test]
    fn test_can_read_private_project() {
        let f = fixture();
        assert!(!f.authz.can_read(None, &f.project).unwrap());
        assert!(!f.authz.can_read(Some(&f.stranger), &f.project).unwrap());
        assert!(f.authz.can_read(Some(&f.guest), &f.project).unwrap());
        assert!(f.authz.can_read(Some(&f.admin), &f.project).unwrap());
    }

    #[test]
    fn test_can_read_public_project_anonymously() {
        let f = fixture();
        let public = Project {
            public: true,
            ..f.project.clone()
        };
        assert!(f.authz.can_read(None, &public).unwrap());
        assert!(!f.authz.is_member(f.stranger.id, public.id).unwrap());
    }

    #[test]
    fn test_can_administer() {
        let f = fixture();
        assert!(f.authz.can_administer(f.owner.id, f.project.id).unwrap());
        assert!(!f.authz.can_administer(f.guest.id, f.project.id).unwrap());
        assert!(!f.authz.can_administer(f.stranger.id, f.project.id).unwrap());
    }

    #[test]
    fn test_can_create_project() {
        let f = fixture();
        assert!(f.authz.can_create_project(f.stranger.id, false).unwrap());
        assert!(!f.authz.can_create_project(f.stranger.id, true).unwrap());
        assert!(f.authz.can_create_project(f.admin.id, true).unwrap());
    }
}
