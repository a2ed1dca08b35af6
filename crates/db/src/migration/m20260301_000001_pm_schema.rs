//! Preventive-maintenance schema.
//!
//! Plain SQL that runs unchanged on `PostgreSQL` and SQLite. Timestamps and
//! ids are supplied by the application, so no database defaults are used.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SCHEMA_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
-- ============================================================
-- LOCATIONS
-- ============================================================
CREATE TABLE locations (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name VARCHAR(200) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);

CREATE INDEX idx_locations_tenant ON locations(tenant_id) WHERE deleted_at IS NULL;

-- ============================================================
-- ASSETS
-- ============================================================
CREATE TABLE assets (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    location_id UUID REFERENCES locations(id),
    name VARCHAR(200) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);

CREATE INDEX idx_assets_tenant ON assets(tenant_id) WHERE deleted_at IS NULL;

-- ============================================================
-- PM SCHEDULES
-- ============================================================
CREATE TABLE pm_schedules (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    template_id UUID,
    name VARCHAR(200) NOT NULL,
    description TEXT,
    asset_id UUID REFERENCES assets(id),
    location_id UUID REFERENCES locations(id),
    frequency VARCHAR(16) NOT NULL,
    day_of_week SMALLINT,
    day_of_month SMALLINT,
    month_of_year SMALLINT,
    assigned_to UUID,
    vendor_id UUID,
    estimated_cost NUMERIC(14, 2),
    next_due_date DATE NOT NULL,
    is_active BOOLEAN NOT NULL,
    work_order_date DATE,
    work_order_ticket_id UUID,
    work_order_claimed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ,
    CONSTRAINT chk_pm_schedules_single_target CHECK ((asset_id IS NULL) <> (location_id IS NULL)),
    CONSTRAINT chk_pm_schedules_frequency CHECK (frequency IN (
        'daily', 'weekly', 'biweekly', 'monthly', 'quarterly', 'semi_annually', 'annually'
    )),
    CONSTRAINT chk_pm_schedules_day_of_week CHECK (day_of_week BETWEEN 0 AND 6),
    CONSTRAINT chk_pm_schedules_day_of_month CHECK (day_of_month BETWEEN 1 AND 31),
    CONSTRAINT chk_pm_schedules_month_of_year CHECK (month_of_year BETWEEN 1 AND 12),
    CONSTRAINT chk_pm_schedules_cost CHECK (estimated_cost >= 0),
    CONSTRAINT chk_pm_schedules_work_order_claim CHECK (
        (work_order_date IS NULL) = (work_order_claimed_at IS NULL)
    )
);

-- Due-list and calendar scans
CREATE INDEX idx_pm_schedules_due ON pm_schedules(tenant_id, next_due_date)
    WHERE deleted_at IS NULL AND is_active;

-- ============================================================
-- PM COMPLETIONS (append-only, scoped through pm_schedules)
-- ============================================================
CREATE TABLE pm_completions (
    id UUID PRIMARY KEY,
    schedule_id UUID NOT NULL REFERENCES pm_schedules(id),
    ticket_id UUID NOT NULL,
    scheduled_date DATE NOT NULL,
    completed_date DATE NOT NULL,
    completed_by UUID NOT NULL,
    checklist_results JSONB,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

-- One completion per occurrence; serializes concurrent completions
CREATE UNIQUE INDEX uq_pm_completions_occurrence ON pm_completions(schedule_id, scheduled_date);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS pm_completions;
DROP TABLE IF EXISTS pm_schedules;
DROP TABLE IF EXISTS assets;
DROP TABLE IF EXISTS locations;
";
