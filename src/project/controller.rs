use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::audit::{AuditLogger, AuditOperation, project_entry};
use super::authz::Authorizer;
use super::error::{ProjectError, ProjectResult, ProjectStoreExt};
use super::validation::validate_project_name;
use crate::error::Error;
use crate::store::Store;
use crate::types::*;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Process-wide rules injected at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectPolicy {
    pub only_admin_create_project: bool,
}

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    /// Oversized pages are clamped rather than rejected.
    pub fn new(page: i64, page_size: i64) -> ProjectResult<Self> {
        if page < 1 {
            return Err(ProjectError::BadRequest("invalid page".to_string()));
        }
        if page_size < 1 {
            return Err(ProjectError::BadRequest("invalid page_size".to_string()));
        }
        if page_size > MAX_PAGE_SIZE {
            tracing::warn!("page_size {page_size} exceeds {MAX_PAGE_SIZE}, clamping");
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        if page_size.checked_mul(page - 1).is_none() {
            return Err(ProjectError::BadRequest("invalid page".to_string()));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        self.page_size.saturating_mul(self.page - 1)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results together with the total across all pages.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub name: Option<String>,
    pub public_only: bool,
}

/// Access log filter; timestamps are unix seconds and both bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AccessLogFilter {
    pub username: Option<String>,
    pub repository: Option<String>,
    pub operation: Option<String>,
    pub begin_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
}

fn parse_bound(secs: Option<i64>, field: &str) -> ProjectResult<Option<DateTime<Utc>>> {
    secs.map(|s| {
        DateTime::from_timestamp(s, 0)
            .ok_or_else(|| ProjectError::BadRequest(format!("invalid {field}")))
    })
    .transpose()
}

pub struct ProjectController {
    store: Arc<dyn Store>,
    authz: Authorizer,
    audit: AuditLogger,
    policy: ProjectPolicy,
}

impl ProjectController {
    pub fn new(store: Arc<dyn Store>, audit: AuditLogger, policy: ProjectPolicy) -> Self {
        Self {
            authz: Authorizer::new(store.clone()),
            store,
            audit,
            policy,
        }
    }

    fn load_project(&self, id: i64) -> ProjectResult<Project> {
        self.store
            .get_project(id)
            .map_err(|e| {
                tracing::error!("failed to get project {id}: {e}");
                ProjectError::Internal("Failed to get project")
            })?
            .ok_or_else(|| ProjectError::NotFound(format!("project does not exist, id: {id}")))
    }

    fn repo_count(&self, project: &Project) -> ProjectResult<i64> {
        self.store
            .count_repositories_for_project(&project.name)
            .map_err(|e| {
                tracing::error!("failed to get repositories of project {}: {e}", project.name);
                ProjectError::Internal("Failed to count repositories")
            })
    }

    fn view(
        &self,
        project: Project,
        role: Option<ProjectRole>,
        is_sysadmin: bool,
    ) -> ProjectResult<ProjectView> {
        let repo_count = self.repo_count(&project)?;
        Ok(ProjectView {
            togglable: is_sysadmin || role == Some(ProjectRole::ProjectAdmin),
            role,
            repo_count,
            project,
        })
    }

    /// Creates a project owned by `caller` and returns its id.
    pub fn create(&self, caller: &User, name: &str, public: bool) -> ProjectResult<i64> {
        if !self
            .authz
            .can_create_project(caller.id, self.policy.only_admin_create_project)?
        {
            tracing::warn!(user_id = caller.id, "Only system admin can create project");
            return Err(ProjectError::Forbidden(
                "Only system admin can create project".to_string(),
            ));
        }

        validate_project_name(name)?;

        if self
            .store
            .project_exists(name)
            .or_internal("Failed to check project existence")?
        {
            return Err(ProjectError::Conflict(format!(
                "project {name} already exists"
            )));
        }

        let new_project = NewProject {
            owner_id: caller.id,
            name: name.to_string(),
            public,
            created_at: Utc::now(),
        };
        let id = match self.store.create_project(&new_project) {
            Ok(id) => id,
            Err(Error::AlreadyExists) => {
                return Err(ProjectError::Conflict(format!(
                    "project {name} already exists"
                )));
            }
            Err(e) => {
                tracing::error!("Failed to add project {name}: {e}");
                return Err(ProjectError::Internal("Failed to add project"));
            }
        };

        let project = Project {
            id,
            name: new_project.name,
            owner_id: new_project.owner_id,
            public,
            created_at: new_project.created_at,
            updated_at: new_project.created_at,
        };
        self.audit
            .record(project_entry(caller, &project, AuditOperation::Create));

        tracing::info!(project_id = id, user_id = caller.id, "Created project {name}");
        Ok(id)
    }

    /// Checks that a project name is visible to the caller without returning it.
    /// Public projects are revealed to anyone; everything else requires a caller.
    pub fn probe(&self, caller: Option<&User>, name: Option<&str>) -> ProjectResult<()> {
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProjectError::BadRequest("project_name is needed".to_string()))?;

        let project = self
            .store
            .get_project_by_name(name)
            .or_internal("Failed to get project by name")?;

        if project.as_ref().is_some_and(|p| p.public) {
            return Ok(());
        }

        if caller.is_none() {
            return Err(ProjectError::Unauthorized);
        }

        match project {
            Some(_) => Ok(()),
            None => Err(ProjectError::NotFound(format!(
                "project does not exist, name: {name}"
            ))),
        }
    }

    pub fn get(&self, caller: Option<&User>, id: i64) -> ProjectResult<ProjectView> {
        let project = self.load_project(id)?;

        if !self.authz.can_read(caller, &project)? {
            return Err(ProjectError::Unauthorized);
        }

        match caller {
            Some(user) => {
                let is_sysadmin = self.authz.is_system_admin(user.id)?;
                let role = self.authz.explicit_role(user.id, project.id)?;
                self.view(project, role, is_sysadmin)
            }
            None => self.view(project, None, false),
        }
    }

    /// Deletes a project that has no repositories and no policies left.
    pub fn delete(&self, caller: &User, id: i64) -> ProjectResult<()> {
        if id == 0 {
            return Err(ProjectError::BadRequest("project ID is required".to_string()));
        }

        let project = self.load_project(id)?;

        if !self.authz.can_administer(caller.id, id)? {
            tracing::warn!(
                user_id = caller.id,
                project_id = id,
                "User does not have project admin role"
            );
            return Err(ProjectError::Forbidden(
                "project admin role required".to_string(),
            ));
        }

        if self.repo_count(&project)? > 0 {
            return Err(ProjectError::PreconditionFailed(
                "project contains repositories, can not be deleted".to_string(),
            ));
        }

        let policies = self.store.count_policies_for_project(id).map_err(|e| {
            tracing::error!(
                "failed to check whether project {} contains any policy: {e}",
                project.name
            );
            ProjectError::Internal("Failed to count policies")
        })?;
        if policies > 0 {
            return Err(ProjectError::PreconditionFailed(
                "project contains policies, can not be deleted".to_string(),
            ));
        }

        match self.store.delete_project(id) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ProjectError::NotFound(format!(
                    "project does not exist, id: {id}"
                )));
            }
            Err(Error::HasDependents(kind)) => {
                return Err(ProjectError::PreconditionFailed(format!(
                    "project contains {kind}, can not be deleted"
                )));
            }
            Err(e) => {
                tracing::error!("failed to delete project {id}: {e}");
                return Err(ProjectError::Internal("Failed to delete project"));
            }
        }

        self.audit
            .record(project_entry(caller, &project, AuditOperation::Delete));

        tracing::info!(project_id = id, user_id = caller.id, "Deleted project {}", project.name);
        Ok(())
    }

    pub fn list(
        &self,
        caller: Option<&User>,
        filter: &ListFilter,
        page: Page,
    ) -> ProjectResult<Paged<ProjectView>> {
        let name = filter.name.as_deref().filter(|n| !n.is_empty());
        let (limit, offset) = (page.page_size, page.offset());

        if filter.public_only {
            let query = ProjectQuery {
                name: name.map(str::to_string),
                public_only: true,
            };
            let total = self
                .store
                .count_projects(&query)
                .or_internal("Failed to get total of projects")?;
            let projects = self
                .store
                .list_projects(&query, limit, offset)
                .or_internal("Failed to get projects")?;

            let items = projects
                .into_iter()
                .map(|p| self.view(p, None, false))
                .collect::<ProjectResult<Vec<_>>>()?;
            return Ok(Paged { items, total, page });
        }

        let user = caller.ok_or(ProjectError::Unauthorized)?;
        let is_sysadmin = self.authz.is_system_admin(user.id)?;

        let (total, projects) = if is_sysadmin {
            let query = ProjectQuery {
                name: name.map(str::to_string),
                public_only: false,
            };
            let total = self
                .store
                .count_projects(&query)
                .or_internal("Failed to get total of projects")?;
            let projects = self
                .store
                .list_projects(&query, limit, offset)
                .or_internal("Failed to get projects")?;
            (total, projects)
        } else {
            let total = self
                .store
                .count_user_relevant_projects(user.id, name)
                .or_internal("Failed to get total of projects")?;
            let projects = self
                .store
                .list_user_relevant_projects(user.id, name, limit, offset)
                .or_internal("Failed to get projects")?;
            (total, projects)
        };

        let items = projects
            .into_iter()
            .map(|p| {
                let role = self.authz.explicit_role(user.id, p.id)?;
                self.view(p, role, is_sysadmin)
            })
            .collect::<ProjectResult<Vec<_>>>()?;

        Ok(Paged { items, total, page })
    }

    /// Flips the public flag. Deliberately not recorded in the access log.
    pub fn toggle_visibility(&self, caller: &User, id: i64, public: bool) -> ProjectResult<()> {
        self.load_project(id)?;

        if !self.authz.can_administer(caller.id, id)? {
            tracing::warn!(
                user_id = caller.id,
                project_id = id,
                "User does not have project admin role"
            );
            return Err(ProjectError::Forbidden(
                "project admin role required".to_string(),
            ));
        }

        match self.store.toggle_project_public(id, public) {
            Ok(()) => Ok(()),
            Err(Error::NotFound) => Err(ProjectError::NotFound(format!(
                "project does not exist, id: {id}"
            ))),
            Err(e) => {
                tracing::error!("Error while updating project, project id: {id}, error: {e}");
                Err(ProjectError::Internal("Failed to update project"))
            }
        }
    }

    pub fn filter_access_log(
        &self,
        caller: &User,
        id: i64,
        filter: &AccessLogFilter,
        page: Page,
    ) -> ProjectResult<Paged<AccessLog>> {
        self.load_project(id)?;

        if !self.authz.is_member(caller.id, id)? {
            tracing::warn!(
                user_id = caller.id,
                project_id = id,
                "User does not have permission to read access log"
            );
            return Err(ProjectError::Forbidden(
                "project membership required".to_string(),
            ));
        }

        let query = AccessLogQuery {
            project_id: id,
            username: filter.username.clone(),
            repo_name: filter.repository.clone(),
            operation: filter.operation.clone(),
            begin_time: parse_bound(filter.begin_timestamp, "begin_timestamp")?,
            end_time: parse_bound(filter.end_timestamp, "end_timestamp")?,
        };

        let total = self
            .store
            .count_access_logs(&query)
            .or_internal("Failed to get total of access log")?;
        let items = self
            .store
            .list_access_logs(&query, page.page_size, page.offset())
            .or_internal("Failed to get access log")?;

        Ok(Paged { items, total, page })
    }

    pub fn list_members(&self, caller: &User, id: i64) -> ProjectResult<Vec<ProjectMember>> {
        self.load_project(id)?;

        if !self.authz.is_member(caller.id, id)? {
            return Err(ProjectError::Forbidden(
                "project membership required".to_string(),
            ));
        }

        self.store
            .list_project_members(id)
            .or_internal("Failed to list project members")
    }

    /// Assigns `role` to `user_id`, replacing any role the user already had.
    pub fn add_member(
        &self,
        caller: &User,
        id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> ProjectResult<ProjectMember> {
        self.load_project(id)?;

        if !self.authz.can_administer(caller.id, id)? {
            return Err(ProjectError::Forbidden(
                "project admin role required".to_string(),
            ));
        }

        self.store
            .get_user(user_id)
            .or_internal("Failed to get user")?
            .ok_or_else(|| ProjectError::NotFound(format!("user does not exist, id: {user_id}")))?;

        let member = ProjectMember {
            project_id: id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        self.store
            .upsert_project_member(&member)
            .or_internal("Failed to add project member")?;

        Ok(member)
    }

    pub fn remove_member(&self, caller: &User, id: i64, user_id: i64) -> ProjectResult<()> {
        self.load_project(id)?;

        if !self.authz.can_administer(caller.id, id)? {
            return Err(ProjectError::Forbidden(
                "project admin role required".to_string(),
            ));
        }

        if !self
            .store
            .delete_project_member(id, user_id)
            .or_internal("Failed to remove project member")?
        {
            return Err(ProjectError::NotFound(format!(
                "user {user_id} is not a member of project {id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::store::SqliteStore;

    struct Harness {
        _temp: TempDir,
        store: Arc<dyn Store>,
        controller: ProjectController,
        audit_rx: mpsc::Receiver<AccessLog>,
        admin: User,
        alice: User,
        bob: User,
    }

    fn harness(policy: ProjectPolicy) -> Harness {
        let temp = TempDir::new().unwrap();
        let sqlite = SqliteStore::new(temp.path().join("test.db")).unwrap();
        sqlite.initialize().unwrap();
        let store: Arc<dyn Store> = Arc::new(sqlite);

        let admin = store.create_user("admin", true).unwrap();
        let alice = store.create_user("alice", false).unwrap();
        let bob = store.create_user("bob", false).unwrap();

        let (audit, audit_rx) = AuditLogger::channel(64);
        let controller = ProjectController::new(store.clone(), audit, policy);

        Harness {
            _temp: temp,
            store,
            controller,
            audit_rx,
            admin,
            alice,
            bob,
        }
    }

    fn add_role(h: &Harness, project_id: i64, user: &User, role: ProjectRole) {
        h.controller
            .add_member(&h.admin, project_id, user.id, role)
            .unwrap();
    }

    #[test]
    fn test_only_admin_policy_blocks_regular_users() {
        let mut h = harness(ProjectPolicy {
            only_admin_create_project: true,
        });

        let result = h.controller.create(&h.alice, "team-alpha", false);
        assert!(matches!(result, Err(ProjectError::Forbidden(_))));

        let id = h.controller.create(&h.admin, "team-alpha", false).unwrap();
        assert!(id > 0);

        let view = h.controller.get(Some(&h.admin), id).unwrap();
        assert!(!view.project.public);
        assert_eq!(view.project.owner_id, h.admin.id);

        let entry = h.audit_rx.try_recv().unwrap();
        assert_eq!(entry.operation, "create");
        assert_eq!(entry.username, "admin");
        assert_eq!(entry.repo_name, "team-alpha/");
        assert!(h.audit_rx.try_recv().is_err());
    }

    #[test]
    fn test_create_rejects_invalid_and_duplicate_names() {
        let h = harness(ProjectPolicy::default());

        assert!(matches!(
            h.controller.create(&h.alice, "Team", false),
            Err(ProjectError::InvalidArgument(_))
        ));
        assert!(matches!(
            h.controller.create(&h.alice, "a", false),
            Err(ProjectError::InvalidArgument(_))
        ));

        h.controller.create(&h.alice, "alpha", false).unwrap();
        assert!(matches!(
            h.controller.create(&h.bob, "alpha", true),
            Err(ProjectError::Conflict(_))
        ));
    }

    #[test]
    fn test_concurrent_creates_yield_one_conflict() {
        let h = harness(ProjectPolicy::default());
        let controller = &h.controller;
        let (alice, bob) = (&h.alice, &h.bob);

        let results: Vec<ProjectResult<i64>> = std::thread::scope(|s| {
            let a = s.spawn(|| controller.create(alice, "race", false));
            let b = s.spawn(|| controller.create(bob, "race", false));
            vec![a.join().unwrap(), b.join().unwrap()]
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ProjectError::Conflict(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);

        let query = ProjectQuery {
            name: Some("race".to_string()),
            public_only: false,
        };
        assert_eq!(h.store.count_projects(&query).unwrap(), 1);
    }

    #[test]
    fn test_get_private_project_access() {
        let h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "private", false).unwrap();

        assert!(matches!(
            h.controller.get(None, id),
            Err(ProjectError::Unauthorized)
        ));
        assert!(matches!(
            h.controller.get(Some(&h.bob), id),
            Err(ProjectError::Unauthorized)
        ));

        add_role(&h, id, &h.bob, ProjectRole::Guest);
        let view = h.controller.get(Some(&h.bob), id).unwrap();
        assert_eq!(view.role, Some(ProjectRole::Guest));
        assert!(!view.togglable);

        let owner_view = h.controller.get(Some(&h.alice), id).unwrap();
        assert_eq!(owner_view.role, Some(ProjectRole::ProjectAdmin));
        assert!(owner_view.togglable);

        assert!(matches!(
            h.controller.get(None, 9999),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_public_project_anonymously() {
        let h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "open", true).unwrap();
        h.store.create_repository(id, "open/web").unwrap();

        let view = h.controller.get(None, id).unwrap();
        assert_eq!(view.role, None);
        assert!(!view.togglable);
        assert_eq!(view.repo_count, 1);
    }

    #[test]
    fn test_probe() {
        let h = harness(ProjectPolicy::default());
        h.controller.create(&h.alice, "open", true).unwrap();
        h.controller.create(&h.alice, "closed", false).unwrap();

        assert!(matches!(
            h.controller.probe(None, None),
            Err(ProjectError::BadRequest(_))
        ));
        assert!(matches!(
            h.controller.probe(None, Some("")),
            Err(ProjectError::BadRequest(_))
        ));
        assert!(h.controller.probe(None, Some("open")).is_ok());
        assert!(matches!(
            h.controller.probe(None, Some("closed")),
            Err(ProjectError::Unauthorized)
        ));
        assert!(matches!(
            h.controller.probe(None, Some("missing")),
            Err(ProjectError::Unauthorized)
        ));
        assert!(h.controller.probe(Some(&h.bob), Some("closed")).is_ok());
        assert!(matches!(
            h.controller.probe(Some(&h.bob), Some("missing")),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_blocked_by_repository() {
        let mut h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "busy", false).unwrap();
        h.audit_rx.try_recv().unwrap();
        h.store.create_repository(id, "busy/api").unwrap();

        match h.controller.delete(&h.alice, id) {
            Err(ProjectError::PreconditionFailed(msg)) => assert!(msg.contains("repositories")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(h.store.get_project(id).unwrap().is_some());
        assert!(h.audit_rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_blocked_by_policy() {
        let h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "replicated", false).unwrap();
        h.store.create_policy(id, "nightly").unwrap();

        match h.controller.delete(&h.admin, id) {
            Err(ProjectError::PreconditionFailed(msg)) => assert!(msg.contains("policies")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_delete_requires_admin_and_logs() {
        let mut h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "doomed", false).unwrap();
        h.audit_rx.try_recv().unwrap();
        add_role(&h, id, &h.bob, ProjectRole::Developer);

        assert!(matches!(
            h.controller.delete(&h.bob, id),
            Err(ProjectError::Forbidden(_))
        ));
        assert!(matches!(
            h.controller.delete(&h.alice, 0),
            Err(ProjectError::BadRequest(_))
        ));

        h.controller.delete(&h.alice, id).unwrap();
        assert!(h.store.get_project(id).unwrap().is_none());

        let entry = h.audit_rx.try_recv().unwrap();
        assert_eq!(entry.operation, "delete");
        assert_eq!(entry.project_id, id);
        assert_eq!(entry.username, "alice");

        assert!(matches!(
            h.controller.delete(&h.alice, id),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_public_only_needs_no_identity() {
        let h = harness(ProjectPolicy::default());
        h.controller.create(&h.alice, "pub-one", true).unwrap();
        h.controller.create(&h.alice, "priv-one", false).unwrap();
        h.controller.create(&h.bob, "pub-two", true).unwrap();

        let filter = ListFilter {
            name: None,
            public_only: true,
        };
        let page = h.controller.list(None, &filter, Page::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|v| v.project.public));
        assert!(page.items.iter().all(|v| v.role.is_none() && !v.togglable));
    }

    #[test]
    fn test_list_requires_identity_outside_public_mode() {
        let h = harness(ProjectPolicy::default());
        assert!(matches!(
            h.controller.list(None, &ListFilter::default(), Page::default()),
            Err(ProjectError::Unauthorized)
        ));
    }

    #[test]
    fn test_list_user_relevant_projects() {
        let h = harness(ProjectPolicy::default());
        let mine = h.controller.create(&h.alice, "alice-proj", false).unwrap();
        let shared = h.controller.create(&h.bob, "bob-proj", false).unwrap();
        h.controller.create(&h.bob, "bob-secret", false).unwrap();
        add_role(&h, shared, &h.alice, ProjectRole::Guest);

        let page = h
            .controller
            .list(Some(&h.alice), &ListFilter::default(), Page::default())
            .unwrap();
        assert_eq!(page.total, 2);

        let by_id: Vec<(i64, bool)> = page
            .items
            .iter()
            .map(|v| (v.project.id, v.togglable))
            .collect();
        assert!(by_id.contains(&(mine, true)));
        assert!(by_id.contains(&(shared, false)));
    }

    #[test]
    fn test_sysadmin_paging_covers_every_project() {
        let h = harness(ProjectPolicy::default());
        for i in 0..25 {
            let name = format!("proj-{i:02}");
            h.controller.create(&h.alice, &name, i % 2 == 0).unwrap();
        }
        h.controller.create(&h.bob, "unrelated", false).unwrap();

        let filter = ListFilter {
            name: Some("proj".to_string()),
            public_only: false,
        };
        let first = h
            .controller
            .list(Some(&h.admin), &filter, Page::new(1, 10).unwrap())
            .unwrap();
        assert_eq!(first.total, 25);
        assert_eq!(first.items.len(), 10);
        assert!(first.items.iter().all(|v| v.togglable));

        let mut paged = HashSet::new();
        for page in 1..=3 {
            let result = h
                .controller
                .list(Some(&h.admin), &filter, Page::new(page, 10).unwrap())
                .unwrap();
            assert_eq!(result.total, 25);
            paged.extend(result.items.into_iter().map(|v| v.project.id));
        }

        let all = h
            .controller
            .list(Some(&h.admin), &filter, Page::new(1, 25).unwrap())
            .unwrap();
        let single: HashSet<i64> = all.items.into_iter().map(|v| v.project.id).collect();
        assert_eq!(paged.len(), 25);
        assert_eq!(paged, single);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let h = harness(ProjectPolicy::default());
        h.controller.create(&h.alice, "only-one", true).unwrap();

        let result = h
            .controller
            .list(None, &ListFilter::default(), Page::new(i64::MAX, 1).unwrap())
            .unwrap();
        assert_eq!(result.total, 1);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_toggle_visibility() {
        let mut h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "flip", false).unwrap();
        h.audit_rx.try_recv().unwrap();
        add_role(&h, id, &h.bob, ProjectRole::Developer);

        assert!(matches!(
            h.controller.toggle_visibility(&h.bob, id, true),
            Err(ProjectError::Forbidden(_))
        ));
        assert!(!h.controller.get(Some(&h.alice), id).unwrap().project.public);

        h.controller.toggle_visibility(&h.alice, id, true).unwrap();
        assert!(h.controller.get(None, id).unwrap().project.public);
        assert!(h.audit_rx.try_recv().is_err());

        assert!(matches!(
            h.controller.toggle_visibility(&h.alice, 9999, true),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_filter_access_log() {
        let h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "logged", true).unwrap();
        for (secs, op) in [(1_000, "create"), (2_000, "push"), (3_000, "pull")] {
            h.store
                .append_access_log(&AccessLog {
                    id: 0,
                    username: "alice".to_string(),
                    project_id: id,
                    repo_name: "logged/web".to_string(),
                    repo_tag: "latest".to_string(),
                    operation: op.to_string(),
                    op_time: DateTime::from_timestamp(secs, 0).unwrap(),
                })
                .unwrap();
        }

        let filter = AccessLogFilter {
            begin_timestamp: Some(2_000),
            end_timestamp: Some(3_000),
            ..AccessLogFilter::default()
        };
        let page = h
            .controller
            .filter_access_log(&h.alice, id, &filter, Page::new(1, 1).unwrap())
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].operation, "pull");

        // Public visibility does not open the access log to non-members.
        assert!(matches!(
            h.controller
                .filter_access_log(&h.bob, id, &filter, Page::default()),
            Err(ProjectError::Forbidden(_))
        ));
    }

    #[test]
    fn test_member_management() {
        let h = harness(ProjectPolicy::default());
        let id = h.controller.create(&h.alice, "team", false).unwrap();

        assert!(matches!(
            h.controller
                .add_member(&h.bob, id, h.bob.id, ProjectRole::ProjectAdmin),
            Err(ProjectError::Forbidden(_))
        ));
        assert!(matches!(
            h.controller.add_member(&h.alice, id, 4242, ProjectRole::Guest),
            Err(ProjectError::NotFound(_))
        ));

        h.controller
            .add_member(&h.alice, id, h.bob.id, ProjectRole::Guest)
            .unwrap();
        let members = h.controller.list_members(&h.bob, id).unwrap();
        assert_eq!(members.len(), 2);

        h.controller.remove_member(&h.alice, id, h.bob.id).unwrap();
        assert!(matches!(
            h.controller.list_members(&h.bob, id),
            Err(ProjectError::Forbidden(_))
        ));
        assert!(matches!(
            h.controller.remove_member(&h.alice, id, h.bob.id),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_page_validation() {
        assert!(matches!(Page::new(0, 10), Err(ProjectError::BadRequest(_))));
        assert!(matches!(Page::new(1, 0), Err(ProjectError::BadRequest(_))));
        assert_eq!(Page::new(3, 500).unwrap().page_size, MAX_PAGE_SIZE);
        assert_eq!(Page::new(3, 10).unwrap().offset(), 20);
        assert!(matches!(Page::new(i64::MAX, 10), Err(ProjectError::BadRequest(_))));
        assert!(matches!(Page::new(i64::MAX, 1000), Err(ProjectError::BadRequest(_))));
        assert_eq!(Page::new(i64::MAX, 1).unwrap().offset(), i64::MAX - 1);
    }
}
