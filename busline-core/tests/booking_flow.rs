use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use busline_catalog::{
    Bus, PricingEngine, Route, Schedule, ScheduleDays, ScheduleStatus, ScheduleWithPricing, Seat,
    SeatType,
};
use busline_core::reservation::{
    CustomerContact, ReservationDraft, ReservationKind, ReservationStatus,
};
use busline_core::{
    AvailabilityLedger, BookingError, BookingRules, ExpirySweeper, Hold, HoldManager,
    ReservationManager,
};
use busline_shared::pii::Masked;
use busline_store::{MemoryCatalog, MemoryLedger};

fn trip_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

fn make_schedule(seat_count: usize, base_price: f64, multiplier: f64) -> ScheduleWithPricing {
    let bus_id = Uuid::new_v4();
    let seats: Vec<Seat> = (0..seat_count)
        .map(|i| Seat {
            id: Uuid::new_v4(),
            bus_id,
            seat_number: format!("{:02}", i + 1),
            seat_type: SeatType::Standard,
            price_modifier: 1.0,
        })
        .collect();

    ScheduleWithPricing {
        schedule: Schedule {
            id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            bus_id,
            departure_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            days: ScheduleDays::daily(),
            price_multiplier: multiplier,
            status: ScheduleStatus::Active,
        },
        route: Route {
            id: Uuid::new_v4(),
            origin: "Lima".to_string(),
            destination: "Huancayo".to_string(),
            base_price,
        },
        bus: Bus {
            id: bus_id,
            name: "Unit 7".to_string(),
            capacity: seat_count as i32,
            seats,
        },
    }
}

struct Harness {
    ledger: Arc<MemoryLedger>,
    schedule: ScheduleWithPricing,
    holds: HoldManager,
    reservations: ReservationManager,
    sweeper: ExpirySweeper,
}

async fn setup(schedule: ScheduleWithPricing) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(schedule.clone()).await;

    let rules = BookingRules::default();
    Harness {
        ledger: ledger.clone(),
        schedule,
        holds: HoldManager::new(ledger.clone(), catalog.clone(), rules.clone()),
        reservations: ReservationManager::new(
            ledger.clone(),
            catalog,
            PricingEngine::default(),
            rules,
        ),
        sweeper: ExpirySweeper::new(ledger),
    }
}

fn contact() -> CustomerContact {
    CustomerContact {
        name: "Ana Torres".to_string(),
        phone: Masked("+51 999 888 777".to_string()),
        email: Masked("ana@example.com".to_string()),
    }
}

fn seat_ids(schedule: &ScheduleWithPricing, indices: &[usize]) -> Vec<Uuid> {
    indices.iter().map(|i| schedule.bus.seats[*i].id).collect()
}

#[tokio::test]
async fn hold_convert_and_release_flow() {
    let h = setup(make_schedule(40, 280.0, 1.1)).await;

    // Hold seats 5 and 6.
    let first = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[5, 6]))
        .await
        .unwrap();

    let until_expiry = first.expires_at - Utc::now();
    assert!(until_expiry > Duration::minutes(14) && until_expiry <= Duration::minutes(15));

    // Overlapping hold for seats 6 and 7 collides.
    let overlap = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[6, 7]))
        .await;
    assert!(matches!(overlap, Err(BookingError::SeatCollision)));

    // Conversion succeeds and consumes the hold.
    let reservation = h
        .reservations
        .create_reservation(first.id, contact())
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.kind, ReservationKind::Seats);
    // 2 seats at 280 * 1.1 each
    assert_eq!(reservation.total_price, 616.00);
    assert!(h.ledger.get_hold(first.id).await.unwrap().is_none());

    // Releasing the consumed hold id is a no-op success.
    assert!(h.holds.release_hold(first.id).await.is_ok());
}

#[tokio::test]
async fn concurrent_overlapping_holds_have_one_winner() {
    let h = setup(make_schedule(40, 100.0, 1.0)).await;
    let holds = Arc::new(h.holds);
    let contested = seat_ids(&h.schedule, &[0, 1]);
    let schedule_id = h.schedule.schedule.id;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let holds = holds.clone();
        let seats = contested.clone();
        tasks.push(tokio::spawn(async move {
            holds.create_hold(schedule_id, trip_date(), &seats).await
        }));
    }

    let mut winners = 0;
    let mut collisions = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(BookingError::SeatCollision) => collisions += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(collisions, 7);
}

#[tokio::test]
async fn expired_hold_never_converts_even_before_sweep() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let stale = Hold {
        id: Uuid::new_v4(),
        schedule_id: h.schedule.schedule.id,
        trip_date: trip_date(),
        seat_ids: seat_ids(&h.schedule, &[2]),
        created_at: Utc::now() - Duration::minutes(20),
        expires_at: Utc::now() - Duration::seconds(1),
    };
    h.ledger.put_hold(stale.clone()).await;

    let result = h.reservations.create_reservation(stale.id, contact()).await;
    assert!(matches!(result, Err(BookingError::HoldExpired(id)) if id == stale.id));

    // The seat it covered is already free to others.
    let rehold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &stale.seat_ids)
        .await;
    assert!(rehold.is_ok());

    // And the sweeper reclaims the row itself.
    assert_eq!(h.sweeper.sweep_expired_holds().await.unwrap(), 1);
}

#[tokio::test]
async fn release_is_idempotent() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let hold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[0]))
        .await
        .unwrap();

    assert!(h.holds.release_hold(hold.id).await.is_ok());
    assert!(h.holds.release_hold(hold.id).await.is_ok());
    assert_eq!(h.ledger.hold_count().await, 0);
}

#[tokio::test]
async fn full_bus_hold_converts_to_discounted_full_bus_reservation() {
    let h = setup(make_schedule(40, 180.0, 1.05)).await;
    let all_seats: Vec<Uuid> = h.schedule.bus.seats.iter().map(|s| s.id).collect();

    let hold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &all_seats)
        .await
        .unwrap();

    let reservation = h
        .reservations
        .create_reservation(hold.id, contact())
        .await
        .unwrap();
    assert_eq!(reservation.kind, ReservationKind::FullBus);
    // 180 * 1.05 * 40 * 0.9
    assert_eq!(reservation.total_price, 6804.00);

    // A full-bus reservation blocks any further seat hold on that trip.
    let blocked = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[3]))
        .await;
    assert!(matches!(blocked, Err(BookingError::SeatCollision)));

    // Other trip dates of the same schedule are unaffected.
    let other_date = trip_date().succ_opt().unwrap();
    let unaffected = h
        .holds
        .create_hold(h.schedule.schedule.id, other_date, &seat_ids(&h.schedule, &[3]))
        .await;
    assert!(unaffected.is_ok());
}

#[tokio::test]
async fn sweep_expires_only_overdue_pending_reservations() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;
    let overdue = Utc::now() - Duration::seconds(1);

    let mut pending = base_reservation(&h.schedule, &[0]);
    pending.payment_deadline = overdue;
    let pending_id = pending.id;

    let mut confirmed = base_reservation(&h.schedule, &[1]);
    confirmed.status = ReservationStatus::Confirmed;
    confirmed.confirmed_at = Some(Utc::now());
    confirmed.payment_deadline = overdue;
    let confirmed_id = confirmed.id;

    h.ledger.put_reservation(pending).await;
    h.ledger.put_reservation(confirmed).await;

    assert_eq!(h.sweeper.sweep_expired_reservations().await.unwrap(), 1);
    // Running again finds nothing new.
    assert_eq!(h.sweeper.sweep_expired_reservations().await.unwrap(), 0);

    let swept = h.reservations.get_reservation(pending_id).await.unwrap();
    assert_eq!(swept.reservation.status, ReservationStatus::Expired);

    let kept = h.reservations.get_reservation(confirmed_id).await.unwrap();
    assert_eq!(kept.reservation.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn confirm_and_cancel_follow_the_state_machine() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let hold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[4]))
        .await
        .unwrap();
    let reservation = h
        .reservations
        .create_reservation(hold.id, contact())
        .await
        .unwrap();

    let confirmed = h
        .reservations
        .confirm_reservation(reservation.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());

    // Confirming twice is rejected.
    let again = h.reservations.confirm_reservation(reservation.id).await;
    assert!(matches!(
        again,
        Err(BookingError::InvalidTransition {
            from: ReservationStatus::Confirmed,
            to: ReservationStatus::Confirmed,
            ..
        })
    ));

    // Confirmed can still be cancelled by an operator, then it is terminal.
    let cancelled = h
        .reservations
        .cancel_reservation(reservation.id, true)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);

    let twice = h.reservations.cancel_reservation(reservation.id, true).await;
    assert!(matches!(twice, Err(BookingError::InvalidTransition { .. })));
}

#[tokio::test]
async fn cancelled_reservation_frees_its_seats() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;
    let seats = seat_ids(&h.schedule, &[6, 7]);

    let hold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seats)
        .await
        .unwrap();
    let reservation = h
        .reservations
        .create_reservation(hold.id, contact())
        .await
        .unwrap();

    // While pending, the seats are blocked.
    let blocked = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seats)
        .await;
    assert!(matches!(blocked, Err(BookingError::SeatCollision)));

    h.reservations
        .cancel_reservation(reservation.id, false)
        .await
        .unwrap();

    let freed = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seats)
        .await;
    assert!(freed.is_ok());
}

#[tokio::test]
async fn conversion_recheck_rejects_raced_in_reservation() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let hold = h
        .holds
        .create_hold(h.schedule.schedule.id, trip_date(), &seat_ids(&h.schedule, &[0, 1]))
        .await
        .unwrap();

    // A reservation on seat 1 lands between hold creation and conversion.
    h.ledger
        .put_reservation(base_reservation(&h.schedule, &[1]))
        .await;

    let result = h.reservations.create_reservation(hold.id, contact()).await;
    assert!(matches!(result, Err(BookingError::SeatCollision)));
}

#[tokio::test]
async fn customer_cancel_rejects_once_confirmed() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let mut confirmed = base_reservation(&h.schedule, &[2]);
    confirmed.status = ReservationStatus::Confirmed;
    confirmed.confirmed_at = Some(Utc::now());
    let id = confirmed.id;
    h.ledger.put_reservation(confirmed).await;

    // Without the operator capability the locked transition rejects, even
    // when a stale read saw the reservation as still pending.
    let customer = h.reservations.cancel_reservation(id, false).await;
    assert!(matches!(
        customer,
        Err(BookingError::InvalidTransition {
            from: ReservationStatus::Confirmed,
            ..
        })
    ));

    let operator = h.reservations.cancel_reservation(id, true).await.unwrap();
    assert_eq!(operator.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn conversion_expiry_check_uses_a_fresh_clock() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;

    let stale = Hold {
        id: Uuid::new_v4(),
        schedule_id: h.schedule.schedule.id,
        trip_date: trip_date(),
        seat_ids: seat_ids(&h.schedule, &[3]),
        created_at: Utc::now() - Duration::minutes(20),
        expires_at: Utc::now() - Duration::seconds(1),
    };
    h.ledger.put_hold(stale.clone()).await;

    // The draft carries a timestamp from before the hold lapsed; the
    // ledger must judge expiry by its own clock, not the caller's.
    let draft = ReservationDraft {
        schedule_id: stale.schedule_id,
        trip_date: stale.trip_date,
        kind: ReservationKind::Seats,
        seat_ids: stale.seat_ids.clone(),
        customer: contact(),
        total_price: 100.0,
        created_at: Utc::now() - Duration::minutes(10),
        payment_deadline: Utc::now() + Duration::minutes(15),
    };

    let result = h.ledger.convert_hold(stale.id, draft).await;
    assert!(matches!(result, Err(BookingError::HoldExpired(id)) if id == stale.id));
}

#[tokio::test]
async fn validation_failures_open_no_transaction() {
    let h = setup(make_schedule(10, 100.0, 1.0)).await;
    let schedule_id = h.schedule.schedule.id;

    let empty = h.holds.create_hold(schedule_id, trip_date(), &[]).await;
    assert!(matches!(empty, Err(BookingError::Validation(_))));

    let foreign_seat = h
        .holds
        .create_hold(schedule_id, trip_date(), &[Uuid::new_v4()])
        .await;
    assert!(matches!(foreign_seat, Err(BookingError::Validation(_))));

    let unknown_schedule = h
        .holds
        .create_hold(Uuid::new_v4(), trip_date(), &seat_ids(&h.schedule, &[0]))
        .await;
    assert!(matches!(unknown_schedule, Err(BookingError::Validation(_))));

    assert_eq!(h.ledger.hold_count().await, 0);
}

#[tokio::test]
async fn inactive_or_off_day_schedules_reject_holds() {
    let mut schedule = make_schedule(10, 100.0, 1.0);
    schedule.schedule.days = ScheduleDays(vec!["mon".to_string(), "wed".to_string()]);
    let h = setup(schedule).await;
    let schedule_id = h.schedule.schedule.id;

    // 2025-01-10 is a Friday.
    let off_day = h
        .holds
        .create_hold(schedule_id, trip_date(), &seat_ids(&h.schedule, &[0]))
        .await;
    assert!(matches!(off_day, Err(BookingError::Validation(_))));

    let mut cancelled = make_schedule(10, 100.0, 1.0);
    cancelled.schedule.status = ScheduleStatus::Cancelled;
    let h2 = setup(cancelled).await;
    let rejected = h2
        .holds
        .create_hold(h2.schedule.schedule.id, trip_date(), &seat_ids(&h2.schedule, &[0]))
        .await;
    assert!(matches!(rejected, Err(BookingError::ScheduleInactive(_))));
}

#[tokio::test]
async fn availability_reflects_holds_and_reservations() {
    let h = setup(make_schedule(4, 100.0, 1.0)).await;
    let schedule_id = h.schedule.schedule.id;

    let before = h.holds.availability(schedule_id, trip_date()).await.unwrap();
    assert_eq!(before.available_count(), 4);

    h.holds
        .create_hold(schedule_id, trip_date(), &seat_ids(&h.schedule, &[0, 1]))
        .await
        .unwrap();

    let after = h.holds.availability(schedule_id, trip_date()).await.unwrap();
    assert_eq!(after.available_count(), 2);
    assert!(!after.full_bus_reserved);
}

fn base_reservation(
    schedule: &ScheduleWithPricing,
    seat_indices: &[usize],
) -> busline_core::Reservation {
    busline_core::Reservation {
        id: Uuid::new_v4(),
        schedule_id: schedule.schedule.id,
        trip_date: trip_date(),
        kind: ReservationKind::Seats,
        seat_ids: seat_ids(schedule, seat_indices),
        customer: contact(),
        total_price: 100.0,
        status: ReservationStatus::Pending,
        created_at: Utc::now() - Duration::minutes(16),
        payment_deadline: Utc::now() + Duration::minutes(15),
        confirmed_at: None,
    }
}
