//! Row-level security for tenant tables.
//!
//! `PostgreSQL` only: policies compare `tenant_id` with the
//! `app.current_tenant_id` setting made by each tenant transaction, and
//! FORCE applies them to the table owner as well. Completions follow the
//! visibility of their schedule. On other backends this migration is a
//! no-op.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }
        let db = manager.get_connection();
        db.execute_unprepared(ENABLE_RLS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }
        let db = manager.get_connection();
        db.execute_unprepared(DISABLE_RLS_SQL).await?;
        Ok(())
    }
}

const ENABLE_RLS_SQL: &str = r"
ALTER TABLE locations ENABLE ROW LEVEL SECURITY;
ALTER TABLE assets ENABLE ROW LEVEL SECURITY;
ALTER TABLE pm_schedules ENABLE ROW LEVEL SECURITY;
ALTER TABLE pm_completions ENABLE ROW LEVEL SECURITY;

ALTER TABLE locations FORCE ROW LEVEL SECURITY;
ALTER TABLE assets FORCE ROW LEVEL SECURITY;
ALTER TABLE pm_schedules FORCE ROW LEVEL SECURITY;
ALTER TABLE pm_completions FORCE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON locations
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID)
    WITH CHECK (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON assets
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID)
    WITH CHECK (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON pm_schedules
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID)
    WITH CHECK (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON pm_completions
    USING (EXISTS (SELECT 1 FROM pm_schedules s WHERE s.id = pm_completions.schedule_id))
    WITH CHECK (EXISTS (SELECT 1 FROM pm_schedules s WHERE s.id = pm_completions.schedule_id));
";

const DISABLE_RLS_SQL: &str = r"
DROP POLICY IF EXISTS tenant_isolation ON pm_completions;
DROP POLICY IF EXISTS tenant_isolation ON pm_schedules;
DROP POLICY IF EXISTS tenant_isolation ON assets;
DROP POLICY IF EXISTS tenant_isolation ON locations;

ALTER TABLE pm_completions NO FORCE ROW LEVEL SECURITY;
ALTER TABLE pm_schedules NO FORCE ROW LEVEL SECURITY;
ALTER TABLE assets NO FORCE ROW LEVEL SECURITY;
ALTER TABLE locations NO FORCE ROW LEVEL SECURITY;

ALTER TABLE pm_completions DISABLE ROW LEVEL SECURITY;
ALTER TABLE pm_schedules DISABLE ROW LEVEL SECURITY;
ALTER TABLE assets DISABLE ROW LEVEL SECURITY;
ALTER TABLE locations DISABLE ROW LEVEL SECURITY;
";
