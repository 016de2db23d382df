//! Shared fixture: a file-backed `SQLite` database with the full catalogue
//! and a `roles` entity layer built on the command traits.

#![allow(dead_code, missing_docs)]

use chronicle_core::{AuditContext, ChangeEvent, NewChangeEvent, OpContext};
use chronicle_db::{
    ChangeEventRecorder, ChangeEventStore, Command, CreateCommand, DbError, DbPool, DeleteCommand,
    Dialect, PoolManager, Result, SchemaManager, SqlTx, SqlValue, Sqlite, Tx, UpdateCommand,
};
use chronicle_settings::{DatabaseSettings, PoolsSettings};
use serde::{Deserialize, Serialize};

pub struct Harness {
    pub pools: PoolManager<Sqlite>,
    pub core: DbPool<Sqlite>,
    pub store: ChangeEventStore<Sqlite>,
    pub audit: AuditContext,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_pools(PoolsSettings::default())
    }

    pub fn with_pools(pools: PoolsSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = DatabaseSettings::sqlite(dir.path().join("chronicle.db").to_str().unwrap());
        let manager = PoolManager::<Sqlite>::new(db, pools);
        let core = (*manager.core().unwrap()).clone();
        SchemaManager::<Sqlite>::new(core.clone())
            .unwrap()
            .create_all_tables()
            .unwrap();
        Self {
            pools: manager,
            store: ChangeEventStore::new(core.clone()),
            core,
            audit: AuditContext::new("user-42", "node-a", "req-1", "192.168.0.10"),
            dir,
        }
    }

    pub fn roles<'a>(&'a self, recorder: &'a dyn ChangeEventRecorder) -> Roles<'a> {
        Roles {
            harness: self,
            recorder,
            ctx: OpContext::new(),
        }
    }

    pub fn role_count(&self) -> i64 {
        self.core
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM roles", [], |r| r.get(0))
            .unwrap()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub label: String,
    pub permissions: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewRole {
    pub label: String,
    pub permissions: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoleChanges {
    pub label: String,
}

/// Per-call factory for role commands.
pub struct Roles<'a> {
    harness: &'a Harness,
    recorder: &'a dyn ChangeEventRecorder,
    ctx: OpContext,
}

impl<'a> Roles<'a> {
    pub fn with_context(mut self, ctx: OpContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn create(&self, label: &str) -> RoleCommand<'a, NewRole> {
        self.command(
            String::new(),
            NewRole {
                label: label.to_string(),
                permissions: vec!["content:read".to_string()],
            },
        )
    }

    pub fn update(&self, id: &str, label: &str) -> RoleCommand<'a, RoleChanges> {
        self.command(
            id.to_string(),
            RoleChanges {
                label: label.to_string(),
            },
        )
    }

    pub fn delete(&self, id: &str) -> RoleCommand<'a, ()> {
        self.command(id.to_string(), ())
    }

    fn command<P>(&self, id: String, params: P) -> RoleCommand<'a, P> {
        RoleCommand {
            harness: self.harness,
            recorder: self.recorder,
            ctx: self.ctx.clone(),
            id,
            params,
        }
    }
}

pub struct RoleCommand<'a, P> {
    harness: &'a Harness,
    recorder: &'a dyn ChangeEventRecorder,
    ctx: OpContext,
    id: String,
    params: P,
}

impl<P> Command for RoleCommand<'_, P> {
    type Backend = Sqlite;

    fn context(&self) -> &OpContext {
        &self.ctx
    }

    fn audit_context(&self) -> &AuditContext {
        &self.harness.audit
    }

    fn connection(&self) -> &DbPool<Sqlite> {
        &self.harness.core
    }

    fn recorder(&self) -> &dyn ChangeEventRecorder {
        self.recorder
    }

    fn table_name(&self) -> &str {
        "roles"
    }
}

fn read_role(tx: &mut Tx<'_, Sqlite>, id: &str) -> Result<Role> {
    let row = SqlTx::query_opt(
        tx,
        "SELECT id, label, permissions FROM roles WHERE id = ?1",
        &[id.into()],
    )?
    .ok_or_else(|| DbError::not_found("role", id))?;
    Ok(Role {
        id: row.text(0)?,
        label: row.text(1)?,
        permissions: serde_json::from_str(&row.text(2)?)?,
    })
}

impl CreateCommand for RoleCommand<'_, NewRole> {
    type Entity = Role;
    type Params = NewRole;

    fn params(&self) -> &NewRole {
        &self.params
    }

    fn execute(&self, tx: &mut Tx<'_, Sqlite>) -> Result<Role> {
        let role = Role {
            id: Dialect::Sqlite.new_id(),
            label: self.params.label.clone(),
            permissions: self.params.permissions.clone(),
        };
        let _ = SqlTx::execute(
            tx,
            "INSERT INTO roles (id, label, permissions) VALUES (?1, ?2, ?3)",
            &[
                role.id.as_str().into(),
                role.label.as_str().into(),
                SqlValue::Text(serde_json::to_string(&role.permissions)?),
            ],
        )?;
        Ok(role)
    }

    fn get_id(&self, entity: &Role) -> String {
        entity.id.clone()
    }
}

impl UpdateCommand for RoleCommand<'_, RoleChanges> {
    type Entity = Role;
    type Params = RoleChanges;

    fn params(&self) -> &RoleChanges {
        &self.params
    }

    fn get_id(&self) -> &str {
        &self.id
    }

    fn get_before(&self, tx: &mut Tx<'_, Sqlite>) -> Result<Role> {
        read_role(tx, &self.id)
    }

    fn execute(&self, tx: &mut Tx<'_, Sqlite>) -> Result<()> {
        let _ = SqlTx::execute(
            tx,
            "UPDATE roles SET label = ?1 WHERE id = ?2",
            &[self.params.label.as_str().into(), self.id.as_str().into()],
        )?;
        Ok(())
    }
}

impl DeleteCommand for RoleCommand<'_, ()> {
    type Entity = Role;

    fn get_id(&self) -> &str {
        &self.id
    }

    fn get_before(&self, tx: &mut Tx<'_, Sqlite>) -> Result<Role> {
        read_role(tx, &self.id)
    }

    fn execute(&self, tx: &mut Tx<'_, Sqlite>) -> Result<()> {
        let _ = SqlTx::execute(tx, "DELETE FROM roles WHERE id = ?1", &[self.id.as_str().into()])?;
        Ok(())
    }
}

/// Recorder that always fails.
pub struct UnavailableRecorder;

impl ChangeEventRecorder for UnavailableRecorder {
    fn record_change_event(&self, _event: &NewChangeEvent) -> Result<ChangeEvent> {
        Err(DbError::Config("change log unavailable".to_string()))
    }
}
