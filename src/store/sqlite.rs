use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.owner_id, p.public, p.created_at, p.updated_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";
const ACCESS_LOG_FILTER: &str = "project_id = ?1
    AND (?2 IS NULL OR username = ?2)
    AND (?3 IS NULL OR instr(repo_name, ?3) > 0)
    AND (?4 IS NULL OR operation = ?4)
    AND (?5 IS NULL OR op_time >= ?5)
    AND (?6 IS NULL OR op_time <= ?6)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        tracing::error!("Invalid timestamp in database: {}", secs);
        Utc::now()
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        sysadmin: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        public: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn role_from_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ProjectRole> {
    let id: i64 = row.get(idx)?;
    ProjectRole::from_id(id).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, id))
}

fn access_log_from_row(row: &Row<'_>) -> rusqlite::Result<AccessLog> {
    Ok(AccessLog {
        id: row.get(0)?,
        username: row.get(1)?,
        project_id: row.get(2)?,
        repo_name: row.get(3)?,
        repo_tag: row.get(4)?,
        operation: row.get(5)?,
        op_time: parse_timestamp(row.get(6)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, username: &str, sysadmin: bool) -> Result<User> {
        let created_at = Utc::now();
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO users (username, sysadmin, created_at) VALUES (?1, ?2, ?3)",
            params![username, sysadmin, format_datetime(&created_at)],
        );

        match result {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                sysadmin,
                created_at,
            }),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, username, sysadmin, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, username, sysadmin, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, sysadmin, created_at FROM users ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit, offset], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_users(&self) -> Result<i64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    fn is_system_admin(&self, user_id: i64) -> Result<bool> {
        let sysadmin: Option<bool> = self
            .conn()
            .query_row(
                "SELECT sysadmin FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sysadmin.unwrap_or(false))
    }

    fn has_system_admin(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE sysadmin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?1"),
                params![id],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: i64) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Project operations

    fn create_project(&self, project: &NewProject) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created_at = format_datetime(&project.created_at);

        let inserted = tx.execute(
            "INSERT INTO projects (name, owner_id, public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![project.name, project.owner_id, project.public, created_at],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(Error::AlreadyExists),
            Err(e) => return Err(Error::from(e)),
        }
        let id = tx.last_insert_rowid();

        // The owner administers the project from the start.
        tx.execute(
            "INSERT INTO project_members (project_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                project.owner_id,
                ProjectRole::ProjectAdmin.id(),
                created_at
            ],
        )?;

        tx.commit()?;
        Ok(id)
    }

    fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.name = ?1"),
                params![name],
                project_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn project_exists(&self, name: &str) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_projects(&self, query: &ProjectQuery, limit: i64, offset: i64) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p
             WHERE (?1 IS NULL OR instr(p.name, ?1) > 0) AND (?2 = 0 OR p.public = 1)
             ORDER BY p.name LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt.query_map(
            params![query.name.as_deref(), query.public_only, limit, offset],
            project_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_projects(&self, query: &ProjectQuery) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM projects p
             WHERE (?1 IS NULL OR instr(p.name, ?1) > 0) AND (?2 = 0 OR p.public = 1)",
            params![query.name.as_deref(), query.public_only],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_user_relevant_projects(
        &self,
        user_id: i64,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p
             JOIN project_members pm ON pm.project_id = p.id
             WHERE pm.user_id = ?1 AND (?2 IS NULL OR instr(p.name, ?2) > 0)
             ORDER BY p.name LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt.query_map(params![user_id, name, limit, offset], project_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_user_relevant_projects(&self, user_id: i64, name: Option<&str>) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM projects p
             JOIN project_members pm ON pm.project_id = p.id
             WHERE pm.user_id = ?1 AND (?2 IS NULL OR instr(p.name, ?2) > 0)",
            params![user_id, name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn toggle_project_public(&self, id: i64, public: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE projects SET public = ?1, updated_at = ?2 WHERE id = ?3",
            params![public, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_project(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let repos: i64 = tx.query_row(
            "SELECT COUNT(*) FROM repositories WHERE project_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if repos > 0 {
            return Err(Error::HasDependents("repositories"));
        }

        let policies: i64 = tx.query_row(
            "SELECT COUNT(*) FROM replication_policies WHERE project_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if policies > 0 {
            return Err(Error::HasDependents("policies"));
        }

        let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // Project member operations

    fn upsert_project_member(&self, member: &ProjectMember) -> Result<()> {
        self.conn().execute(
            "INSERT INTO project_members (project_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, user_id) DO UPDATE SET role = excluded.role",
            params![
                member.project_id,
                member.user_id,
                member.role.id(),
                format_datetime(&member.created_at),
            ],
        )?;
        Ok(())
    }

    fn delete_project_member(&self, project_id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM project_members WHERE project_id = ?1 AND user_id = ?2",
            params![project_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn get_user_project_roles(&self, user_id: i64, project_id: i64) -> Result<Vec<ProjectRole>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT role FROM project_members WHERE user_id = ?1 AND project_id = ?2",
        )?;

        let rows = stmt.query_map(params![user_id, project_id], |row| {
            role_from_column(row, 0)
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_project_members(&self, project_id: i64) -> Result<Vec<ProjectMember>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT project_id, user_id, role, created_at
             FROM project_members WHERE project_id = ?1 ORDER BY user_id",
        )?;

        let rows = stmt.query_map(params![project_id], |row| {
            Ok(ProjectMember {
                project_id: row.get(0)?,
                user_id: row.get(1)?,
                role: role_from_column(row, 2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Dependent resources

    fn create_repository(&self, project_id: i64, name: &str) -> Result<Repository> {
        let created_at = Utc::now();
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO repositories (project_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![project_id, name, format_datetime(&created_at)],
        );

        match result {
            Ok(_) => Ok(Repository {
                id: conn.last_insert_rowid(),
                project_id,
                name: name.to_string(),
                created_at,
            }),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn delete_repository(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_repositories_for_project(&self, project_name: &str) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM repositories r
             JOIN projects p ON p.id = r.project_id
             WHERE p.name = ?1",
            params![project_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn create_policy(&self, project_id: i64, name: &str) -> Result<ReplicationPolicy> {
        let created_at = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO replication_policies (project_id, name, enabled, created_at)
             VALUES (?1, ?2, 1, ?3)",
            params![project_id, name, format_datetime(&created_at)],
        )?;

        Ok(ReplicationPolicy {
            id: conn.last_insert_rowid(),
            project_id,
            name: name.to_string(),
            enabled: true,
            created_at,
        })
    }

    fn count_policies_for_project(&self, project_id: i64) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM replication_policies WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Access log operations

    fn append_access_log(&self, log: &AccessLog) -> Result<()> {
        self.conn().execute(
            "INSERT INTO access_logs (username, project_id, repo_name, repo_tag, operation, op_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.username,
                log.project_id,
                log.repo_name,
                log.repo_tag,
                log.operation,
                log.op_time.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn list_access_logs(
        &self,
        query: &AccessLogQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, username, project_id, repo_name, repo_tag, operation, op_time
             FROM access_logs WHERE {ACCESS_LOG_FILTER}
             ORDER BY op_time DESC, id DESC LIMIT ?7 OFFSET ?8"
        ))?;

        let rows = stmt.query_map(
            params![
                query.project_id,
                query.username.as_deref(),
                query.repo_name.as_deref(),
                query.operation.as_deref(),
                query.begin_time.map(|t| t.timestamp()),
                query.end_time.map(|t| t.timestamp()),
                limit,
                offset,
            ],
            access_log_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_access_logs(&self, query: &AccessLogQuery) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM access_logs WHERE {ACCESS_LOG_FILTER}"),
            params![
                query.project_id,
                query.username.as_deref(),
                query.repo_name.as_deref(),
                query.operation.as_deref(),
                query.begin_time.map(|t| t.timestamp()),
                query.end_time.map(|t| t.timestamp()),
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
