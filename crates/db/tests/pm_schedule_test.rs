//! PM scheduling end to end: service, schedule repository and SQLite.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use upkeep_core::maintenance::{
    CreateScheduleInput, MarkCompletedInput, OccurrenceStatus, PmError, PmScheduler, SchedulePatch,
    ScheduleStore, ScheduleTarget, StoreError, UpdateScheduleInput, WorkOrderClaim,
};
use upkeep_core::recurrence::{Frequency, RecurrenceRule};
use upkeep_db::{AssetRepository, LocationRepository, ScheduleRepository};
use upkeep_shared::TenantContext;
use upkeep_shared::types::{AssetId, LocationId, TicketId, UserId};

mod common;

use common::{TIMEOUT, TicketDesk, date, setup, tenant};

struct Harness {
    scheduler: PmScheduler<ScheduleRepository, TicketDesk>,
    desk: TicketDesk,
    ctx: TenantContext,
    asset: AssetId,
    location: LocationId,
}

impl Harness {
    async fn new() -> Self {
        Self::with_desk(TicketDesk::default()).await
    }

    async fn with_desk(desk: TicketDesk) -> Self {
        let db = setup().await;
        let ctx = tenant();
        let location = LocationRepository::new(db.clone(), TIMEOUT)
            .create(&ctx, "North Plant")
            .await
            .unwrap();
        let asset = AssetRepository::new(db.clone(), TIMEOUT)
            .create(&ctx, "Boiler 1", Some(LocationId::from_uuid(location.id)))
            .await
            .unwrap();

        Self {
            scheduler: PmScheduler::new(ScheduleRepository::new(db, TIMEOUT), desk.clone()),
            desk,
            ctx,
            asset: AssetId::from_uuid(asset.id),
            location: LocationId::from_uuid(location.id),
        }
    }

    fn input(&self, name: &str, rule: RecurrenceRule, start: chrono::NaiveDate) -> CreateScheduleInput {
        CreateScheduleInput {
            template_id: None,
            name: name.to_string(),
            description: Some("Inspect burners and flue".to_string()),
            asset_id: Some(self.asset),
            location_id: None,
            frequency: rule.frequency,
            day_of_week: rule.day_of_week,
            day_of_month: rule.day_of_month,
            month_of_year: rule.month_of_year,
            assigned_to: None,
            vendor_id: None,
            estimated_cost: None,
            start_date: Some(start),
        }
    }

    fn complete(&self, id: upkeep_shared::types::ScheduleId, on: chrono::NaiveDate) -> MarkCompletedInput {
        MarkCompletedInput {
            schedule_id: id,
            scheduled_date: Some(on),
            ticket_id: None,
            completed_by: UserId::new(),
            completed_date: on,
            checklist_results: None,
            notes: Some("All good".to_string()),
        }
    }
}

#[tokio::test]
async fn test_weekly_schedule_lifecycle() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(
            &h.ctx,
            h.input("Boiler inspection", RecurrenceRule::weekly(3), date(2025, 1, 6)),
            date(2025, 1, 6),
        )
        .await
        .unwrap();
    assert_eq!(schedule.next_due_date, date(2025, 1, 8));
    assert_eq!(schedule.target, ScheduleTarget::Asset(h.asset));
    assert!(schedule.is_active);

    let report = h.scheduler.generate_tickets(&h.ctx, date(2025, 1, 8)).await.unwrap();
    assert_eq!(report.created.len(), 1);
    let ticket = report.created[0].ticket_id;
    assert_eq!(h.desk.requests()[0].title, "PM: Boiler inspection (2025-01-08)");

    let again = h.scheduler.generate_tickets(&h.ctx, date(2025, 1, 8)).await.unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.skipped, vec![schedule.id]);

    let mut input = h.complete(schedule.id, date(2025, 1, 8));
    input.scheduled_date = None;
    let outcome = h.scheduler.mark_completed(&h.ctx, input).await.unwrap();
    assert_eq!(outcome.completion.ticket_id, ticket);
    assert_eq!(outcome.completion.scheduled_date, date(2025, 1, 8));
    assert_eq!(outcome.schedule.next_due_date, date(2025, 1, 15));
    assert!(outcome.schedule.work_order.is_none());
    assert_eq!(h.desk.requests().len(), 1);

    let history = h.scheduler.list_completions(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].notes.as_deref(), Some("All good"));
}

#[tokio::test]
async fn test_repeated_completion_is_a_conflict() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Filters", RecurrenceRule::daily(), date(2025, 3, 1)), date(2025, 3, 1))
        .await
        .unwrap();

    h.scheduler
        .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 3, 1)))
        .await
        .unwrap();
    let err = h
        .scheduler
        .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 3, 1)))
        .await
        .unwrap_err();

    assert!(matches!(err, PmError::AlreadyCompleted { .. }));
    let current = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(current.next_due_date, date(2025, 3, 2));
}

#[tokio::test]
async fn test_concurrent_completions_record_one_occurrence() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Pumps", RecurrenceRule::monthly(5), date(2025, 1, 1)), date(2025, 1, 1))
        .await
        .unwrap();
    let due = schedule.next_due_date;

    let (first, second) = tokio::join!(
        h.scheduler.mark_completed(&h.ctx, h.complete(schedule.id, due)),
        h.scheduler.mark_completed(&h.ctx, h.complete(schedule.id, due)),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(loser.is_conflict(), "unexpected error: {loser:?}");

    let history = h.scheduler.list_completions(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(h.desk.requests().len(), 1);
    let current = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(current.next_due_date, date(2025, 2, 5));
}

#[tokio::test]
async fn test_store_rejects_completion_when_due_date_moved() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Belts", RecurrenceRule::daily(), date(2025, 5, 1)), date(2025, 5, 1))
        .await
        .unwrap();

    let store = h.scheduler.store();
    let stale = upkeep_core::maintenance::NewCompletion {
        schedule_id: schedule.id,
        ticket_id: TicketId::new(),
        scheduled_date: date(2025, 4, 30),
        completed_date: date(2025, 5, 1),
        completed_by: UserId::new(),
        checklist_results: None,
        notes: None,
    };
    let err = store
        .record_completion(&h.ctx, stale, date(2025, 5, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    assert!(store.list_completions(&h.ctx, schedule.id).await.unwrap().is_empty());
    let current = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(current.next_due_date, date(2025, 5, 1));
}

#[tokio::test]
async fn test_failed_ticket_is_retried_on_next_run() {
    let h = Harness::with_desk(TicketDesk::failing(1)).await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Chiller", RecurrenceRule::daily(), date(2025, 2, 1)), date(2025, 2, 1))
        .await
        .unwrap();

    let first = h.scheduler.generate_tickets(&h.ctx, date(2025, 2, 3)).await.unwrap();
    assert!(first.created.is_empty());
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].schedule_id, schedule.id);

    let released = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert!(released.work_order.is_none());

    let second = h.scheduler.generate_tickets(&h.ctx, date(2025, 2, 3)).await.unwrap();
    assert_eq!(second.created.len(), 1);
    assert_eq!(second.created[0].scheduled_date, date(2025, 2, 1));

    let linked = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(linked.ticket_for(date(2025, 2, 1)), Some(second.created[0].ticket_id));
}

#[tokio::test]
async fn test_due_list_and_calendar() {
    let h = Harness::new().await;
    let weekly = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Boiler", RecurrenceRule::weekly(3), date(2025, 1, 1)), date(2025, 1, 1))
        .await
        .unwrap();
    let mut at_location = h.input("Roof walk", RecurrenceRule::monthly(20), date(2025, 1, 1));
    at_location.asset_id = None;
    at_location.location_id = Some(h.location);
    let monthly = h
        .scheduler
        .create_schedule(&h.ctx, at_location, date(2025, 1, 1))
        .await
        .unwrap();
    assert_eq!(monthly.target, ScheduleTarget::Location(h.location));

    h.scheduler
        .mark_completed(&h.ctx, h.complete(weekly.id, date(2025, 1, 1)))
        .await
        .unwrap();

    let due = h.scheduler.list_due(&h.ctx, date(2025, 1, 8)).await.unwrap();
    assert_eq!(due.due.len(), 1);
    assert_eq!(due.due[0].id, weekly.id);
    assert!(due.overdue.is_empty());

    let entries = h
        .scheduler
        .calendar(&h.ctx, 2025, 1, date(2025, 1, 10))
        .await
        .unwrap();
    let weekly_entries: Vec<_> = entries
        .iter()
        .filter(|e| e.schedule_id == weekly.id)
        .map(|e| (e.date, e.status))
        .collect();
    assert_eq!(
        weekly_entries,
        vec![
            (date(2025, 1, 1), OccurrenceStatus::Completed),
            (date(2025, 1, 8), OccurrenceStatus::Overdue),
            (date(2025, 1, 15), OccurrenceStatus::Upcoming),
            (date(2025, 1, 22), OccurrenceStatus::Upcoming),
            (date(2025, 1, 29), OccurrenceStatus::Upcoming),
        ]
    );
    assert!(entries.iter().any(|e| e.schedule_id == monthly.id
        && e.date == date(2025, 1, 20)
        && e.status == OccurrenceStatus::Upcoming));
    assert!(entries.windows(2).all(|w| w[0].date <= w[1].date));
}

#[tokio::test]
async fn test_rule_change_reanchors_and_deactivation_hides() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Generator", RecurrenceRule::monthly(15), date(2025, 1, 1)), date(2025, 1, 1))
        .await
        .unwrap();
    assert_eq!(schedule.next_due_date, date(2025, 1, 15));

    let updated = h
        .scheduler
        .update_schedule(
            &h.ctx,
            schedule.id,
            UpdateScheduleInput {
                name: Some("  Generator load test ".to_string()),
                rule: Some(RecurrenceRule::monthly(10)),
                ..UpdateScheduleInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Generator load test");
    assert_eq!(updated.rule.frequency, Frequency::Monthly);
    assert_eq!(updated.next_due_date, date(2025, 2, 10));

    h.scheduler.set_active(&h.ctx, schedule.id, false).await.unwrap();
    let due = h.scheduler.list_due(&h.ctx, date(2025, 3, 1)).await.unwrap();
    assert!(due.overdue.is_empty());

    let err = h
        .scheduler
        .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 2, 10)))
        .await
        .unwrap_err();
    assert!(matches!(err, PmError::ScheduleInactive(_)));
}

#[tokio::test]
async fn test_deleted_schedule_is_gone_and_other_tenants_see_nothing() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Elevator", RecurrenceRule::quarterly(1), date(2025, 1, 1)), date(2025, 1, 1))
        .await
        .unwrap();

    let stranger = tenant();
    assert!(matches!(
        h.scheduler.get_schedule(&stranger, schedule.id).await,
        Err(PmError::ScheduleNotFound(_))
    ));
    assert!(h.scheduler.list_schedules(&stranger).await.unwrap().is_empty());
    assert!(matches!(
        h.scheduler
            .create_schedule(&stranger, h.input("Borrowed", RecurrenceRule::daily(), date(2025, 1, 1)), date(2025, 1, 1))
            .await,
        Err(PmError::TargetNotFound(_))
    ));

    h.scheduler.delete_schedule(&h.ctx, schedule.id).await.unwrap();
    assert!(h.scheduler.list_schedules(&h.ctx).await.unwrap().is_empty());
    assert!(matches!(
        h.scheduler
            .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 1, 1)))
            .await,
        Err(PmError::ScheduleNotFound(_))
    ));
    assert!(matches!(
        h.scheduler.delete_schedule(&h.ctx, schedule.id).await,
        Err(PmError::ScheduleNotFound(_))
    ));
}

#[tokio::test]
async fn test_completion_while_ticket_is_pending_creates_no_second_ticket() {
    let h = Harness::with_desk(TicketDesk::slow(Duration::from_millis(150))).await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Compressor", RecurrenceRule::weekly(3), date(2025, 1, 6)), date(2025, 1, 6))
        .await
        .unwrap();

    let (report, completed) = tokio::join!(
        h.scheduler.generate_tickets(&h.ctx, date(2025, 1, 8)),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            h.scheduler
                .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 1, 8)))
                .await
        },
    );

    let report = report.unwrap();
    assert_eq!(report.created.len(), 1);
    assert!(report.failed.is_empty());
    assert!(completed.unwrap_err().is_conflict());
    assert_eq!(h.desk.requests().len(), 1);

    let outcome = h
        .scheduler
        .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 1, 8)))
        .await
        .unwrap();
    assert_eq!(outcome.completion.ticket_id, report.created[0].ticket_id);
    assert_eq!(h.desk.requests().len(), 1);
}

#[tokio::test]
async fn test_interrupted_claim_lapses_after_lease() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Cooling tower", RecurrenceRule::weekly(3), date(2025, 1, 6)), date(2025, 1, 6))
        .await
        .unwrap();
    let store = h.scheduler.store();

    let live = WorkOrderClaim {
        scheduled_date: date(2025, 1, 8),
        claimed_at: Utc::now() - TimeDelta::seconds(10),
    };
    let stale_before = live.claimed_at - TimeDelta::minutes(5);
    assert!(store.claim_work_order(&h.ctx, schedule.id, live, stale_before).await.unwrap());

    let skipped = h.scheduler.generate_tickets(&h.ctx, date(2025, 1, 9)).await.unwrap();
    assert_eq!(skipped.skipped, vec![schedule.id]);
    assert!(h.desk.requests().is_empty());

    let crashed = WorkOrderClaim {
        scheduled_date: date(2025, 1, 8),
        claimed_at: Utc::now() - TimeDelta::hours(1),
    };
    assert!(store.claim_work_order(&h.ctx, schedule.id, crashed, Utc::now()).await.unwrap());

    let report = h.scheduler.generate_tickets(&h.ctx, date(2025, 1, 12)).await.unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].scheduled_date, date(2025, 1, 8));
    assert_eq!(h.desk.requests().len(), 1);

    let linked = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(linked.ticket_for(date(2025, 1, 8)), Some(report.created[0].ticket_id));

    let err = store
        .attach_work_order(&h.ctx, schedule.id, crashed, TicketId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_guarded_update_cannot_rewind_completed_occurrence() {
    let h = Harness::new().await;
    let schedule = h
        .scheduler
        .create_schedule(&h.ctx, h.input("Sprinklers", RecurrenceRule::monthly(15), date(2025, 2, 1)), date(2025, 2, 1))
        .await
        .unwrap();
    h.scheduler
        .mark_completed(&h.ctx, h.complete(schedule.id, date(2025, 2, 15)))
        .await
        .unwrap();

    let store = h.scheduler.store();
    let rewind = SchedulePatch {
        rule: Some(RecurrenceRule::monthly(15)),
        next_due_date: Some(date(2025, 2, 15)),
        ..SchedulePatch::default()
    };
    let err = store
        .update_schedule_if_due(&h.ctx, schedule.id, date(2025, 2, 15), rewind.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let current = h.scheduler.get_schedule(&h.ctx, schedule.id).await.unwrap();
    assert_eq!(current.next_due_date, date(2025, 3, 15));

    let moved = store
        .update_schedule_if_due(
            &h.ctx,
            schedule.id,
            date(2025, 3, 15),
            SchedulePatch {
                next_due_date: Some(date(2025, 3, 20)),
                ..rewind
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.next_due_date, date(2025, 3, 20));

    let ghost = SchedulePatch {
        name: Some("Ghost".to_string()),
        ..SchedulePatch::default()
    };
    let missing = store
        .update_schedule_if_due(&h.ctx, upkeep_shared::types::ScheduleId::new(), date(2025, 3, 20), ghost)
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(_)));
}
