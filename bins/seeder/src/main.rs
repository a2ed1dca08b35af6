//! Development seeder for Upkeep.
//!
//! Seeds a demo tenant with locations, assets and PM schedules, then runs
//! one ticket-generation pass so the due occurrences carry work orders.
//! Work orders are minted locally; no ticket service is contacted.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::Duration;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use upkeep_core::maintenance::{
    CreateScheduleInput, PmScheduler, WorkOrderCreator, WorkOrderError, WorkOrderRequest,
};
use upkeep_core::recurrence::RecurrenceRule;
use upkeep_db::{AssetRepository, LocationRepository, ScheduleRepository, connect_with};
use upkeep_shared::types::{AssetId, LocationId, TenantId, TicketId, UserId};
use upkeep_shared::{AppConfig, TenantContext};

/// Demo tenant (consistent across runs).
const DEMO_TENANT_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0001;
/// Demo technician assigned to the seeded schedules.
const DEMO_TECHNICIAN_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0002;

/// Issues ticket ids without an external ticket service.
struct LocalTickets;

#[async_trait::async_trait]
impl WorkOrderCreator for LocalTickets {
    async fn create_work_order(
        &self,
        _ctx: &TenantContext,
        request: WorkOrderRequest,
    ) -> Result<TicketId, WorkOrderError> {
        let ticket_id = TicketId::new();
        info!(%ticket_id, title = %request.title, "issued local work order");
        Ok(ticket_id)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upkeep=debug,seeder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let today = config.scheduling.today()?;

    let db = connect_with(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let timeout = config.database.operation_timeout();
    let ctx = TenantContext::new(TenantId::from_uuid(Uuid::from_u128(DEMO_TENANT_ID)))
        .with_actor(UserId::from_uuid(Uuid::from_u128(DEMO_TECHNICIAN_ID)));

    let locations = LocationRepository::new(db.clone(), timeout);
    if locations.count(&ctx).await? > 0 {
        warn!(tenant_id = %ctx.tenant_id()?, "demo tenant already seeded, skipping");
        return Ok(());
    }

    info!("Seeding locations and assets...");
    let plant = locations.create(&ctx, "North Plant").await?;
    let plant_id = LocationId::from_uuid(plant.id);
    let roof = locations.create(&ctx, "Main Building Roof").await?;

    let assets = AssetRepository::new(db.clone(), timeout);
    let boiler = assets.create(&ctx, "Boiler 1", Some(plant_id)).await?;
    let chiller = assets.create(&ctx, "Chiller 2", Some(plant_id)).await?;
    let generator = assets.create(&ctx, "Standby Generator", None).await?;

    let scheduler = PmScheduler::new(ScheduleRepository::new(db, timeout), LocalTickets)
        .with_claim_lease(config.scheduling.claim_lease());
    let technician = ctx.actor();

    info!("Seeding PM schedules...");
    let plans = [
        (
            "Boiler burner inspection",
            Some(AssetId::from_uuid(boiler.id)),
            None,
            RecurrenceRule::weekly(3),
        ),
        (
            "Chiller filter change",
            Some(AssetId::from_uuid(chiller.id)),
            None,
            RecurrenceRule::monthly(1),
        ),
        (
            "Generator load test",
            Some(AssetId::from_uuid(generator.id)),
            None,
            RecurrenceRule::quarterly(15),
        ),
        (
            "Roof drain walk",
            None,
            Some(LocationId::from_uuid(roof.id)),
            RecurrenceRule::semi_annually(31),
        ),
        ("Plant safety audit", None, Some(plant_id), RecurrenceRule::annually(2, 29)),
    ];

    for (name, asset_id, location_id, rule) in plans {
        let input = CreateScheduleInput {
            template_id: None,
            name: name.to_string(),
            description: None,
            asset_id,
            location_id,
            frequency: rule.frequency,
            day_of_week: rule.day_of_week,
            day_of_month: rule.day_of_month,
            month_of_year: rule.month_of_year,
            assigned_to: technician,
            vendor_id: None,
            estimated_cost: Some(dec!(150.00)),
            start_date: Some(today - Duration::days(14)),
        };
        let schedule = scheduler.create_schedule(&ctx, input, today).await?;
        info!(schedule_id = %schedule.id, next_due_date = %schedule.next_due_date, name, "seeded PM schedule");
    }

    info!("Generating work orders for due occurrences...");
    let report = scheduler.generate_tickets(&ctx, today).await?;
    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        "Seeding complete"
    );

    Ok(())
}
