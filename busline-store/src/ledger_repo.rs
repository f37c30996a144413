use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use busline_core::availability::{self, TripOccupancy};
use busline_core::reservation::{
    CustomerContact, Reservation, ReservationDraft, ReservationKind, ReservationStatus,
};
use busline_core::{AvailabilityLedger, BookingError, Hold};
use busline_shared::pii::Masked;

/// Postgres-backed ledger. Every mutating method is one transaction; the
/// read-check-write sequence runs under an advisory lock scoped to the
/// (schedule_id, trip_date) key, so overlapping attempts on the same trip
/// instance serialize and at most one wins.
pub struct StoreAvailabilityLedger {
    pool: PgPool,
}

impl StoreAvailabilityLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    schedule_id: Uuid,
    trip_date: NaiveDate,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    schedule_id: Uuid,
    trip_date: NaiveDate,
    kind: String,
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    total_price: f64,
    status: String,
    created_at: DateTime<Utc>,
    payment_deadline: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    fn into_reservation(self, seat_ids: Vec<Uuid>) -> Result<Reservation, BookingError> {
        let kind = ReservationKind::parse(&self.kind)
            .ok_or_else(|| BookingError::storage(format!("unknown reservation kind: {}", self.kind)))?;
        let status = ReservationStatus::parse(&self.status)
            .ok_or_else(|| BookingError::storage(format!("unknown reservation status: {}", self.status)))?;

        Ok(Reservation {
            id: self.id,
            schedule_id: self.schedule_id,
            trip_date: self.trip_date,
            kind,
            seat_ids,
            customer: CustomerContact {
                name: self.customer_name,
                phone: Masked(self.customer_phone),
                email: Masked(self.customer_email),
            },
            total_price: self.total_price,
            status,
            created_at: self.created_at,
            payment_deadline: self.payment_deadline,
            confirmed_at: self.confirmed_at,
        })
    }
}

const RESERVATION_COLUMNS: &str = "id, schedule_id, trip_date, kind, customer_name, \
     customer_phone, customer_email, total_price, status, created_at, payment_deadline, confirmed_at";

/// Serialize all writers for one (schedule, date) pair. The lock is
/// transaction-scoped and releases automatically on commit or rollback.
async fn lock_trip(
    tx: &mut Transaction<'_, Postgres>,
    schedule_id: Uuid,
    trip_date: NaiveDate,
) -> Result<(), BookingError> {
    let class = (schedule_id.as_u128() >> 96) as u32 as i32;
    let day = trip_date.num_days_from_ce();

    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(class)
        .bind(day)
        .execute(&mut **tx)
        .await
        .map_err(BookingError::storage)?;
    Ok(())
}

/// Live occupancy for one trip instance: seats in pending/confirmed
/// reservations (with the full-bus sentinel) plus seats in unexpired holds.
async fn load_occupancy(
    conn: &mut PgConnection,
    schedule_id: Uuid,
    trip_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TripOccupancy, BookingError> {
    let mut occupancy = TripOccupancy::default();

    let reserved: Vec<(String, Option<Uuid>)> = sqlx::query_as(
        r#"
        SELECT r.kind, rs.seat_id
        FROM reservations r
        LEFT JOIN reservation_seats rs ON rs.reservation_id = r.id
        WHERE r.schedule_id = $1 AND r.trip_date = $2
          AND r.status IN ('PENDING', 'CONFIRMED')
        "#,
    )
    .bind(schedule_id)
    .bind(trip_date)
    .fetch_all(&mut *conn)
    .await
    .map_err(BookingError::storage)?;

    for (kind, seat_id) in reserved {
        if kind == "FULL_BUS" {
            occupancy.full_bus_reserved = true;
        }
        if let Some(seat_id) = seat_id {
            occupancy.reserved.insert(seat_id);
        }
    }

    let held: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT hs.seat_id
        FROM holds h
        JOIN hold_seats hs ON hs.hold_id = h.id
        WHERE h.schedule_id = $1 AND h.trip_date = $2 AND h.expires_at > $3
        "#,
    )
    .bind(schedule_id)
    .bind(trip_date)
    .bind(now)
    .fetch_all(&mut *conn)
    .await
    .map_err(BookingError::storage)?;

    occupancy.held.extend(held);
    Ok(occupancy)
}

async fn hold_seat_ids(conn: &mut PgConnection, hold_id: Uuid) -> Result<Vec<Uuid>, BookingError> {
    sqlx::query_scalar("SELECT seat_id FROM hold_seats WHERE hold_id = $1")
        .bind(hold_id)
        .fetch_all(conn)
        .await
        .map_err(BookingError::storage)
}

async fn reservation_seat_ids(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> Result<Vec<Uuid>, BookingError> {
    sqlx::query_scalar("SELECT seat_id FROM reservation_seats WHERE reservation_id = $1")
        .bind(reservation_id)
        .fetch_all(conn)
        .await
        .map_err(BookingError::storage)
}

#[async_trait]
impl AvailabilityLedger for StoreAvailabilityLedger {
    async fn create_hold(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        seat_ids: &[Uuid],
        expires_at: DateTime<Utc>,
    ) -> Result<Hold, BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;
        lock_trip(&mut tx, schedule_id, trip_date).await?;

        let now = Utc::now();
        let occupancy = load_occupancy(&mut *tx, schedule_id, trip_date, now).await?;
        // Rolls back on drop; nothing is written on a collision.
        availability::check_seats_free(seat_ids, &occupancy)?;

        let hold_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO holds (id, schedule_id, trip_date, created_at, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(hold_id)
        .bind(schedule_id)
        .bind(trip_date)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        for seat_id in seat_ids {
            sqlx::query("INSERT INTO hold_seats (hold_id, seat_id) VALUES ($1, $2)")
                .bind(hold_id)
                .bind(seat_id)
                .execute(&mut *tx)
                .await
                .map_err(BookingError::storage)?;
        }

        tx.commit().await.map_err(BookingError::storage)?;

        Ok(Hold {
            id: hold_id,
            schedule_id,
            trip_date,
            seat_ids: seat_ids.to_vec(),
            created_at: now,
            expires_at,
        })
    }

    async fn get_hold(&self, id: Uuid) -> Result<Option<Hold>, BookingError> {
        let mut conn = self.pool.acquire().await.map_err(BookingError::storage)?;

        let row = sqlx::query_as::<_, HoldRow>(
            "SELECT id, schedule_id, trip_date, created_at, expires_at FROM holds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(BookingError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let seat_ids = hold_seat_ids(&mut *conn, id).await?;

        Ok(Some(Hold {
            id: row.id,
            schedule_id: row.schedule_id,
            trip_date: row.trip_date,
            seat_ids,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }))
    }

    async fn release_hold(&self, id: Uuid) -> Result<(), BookingError> {
        // Idempotent: zero rows affected is fine (double-release, or the
        // sweeper got there first).
        sqlx::query("DELETE FROM holds WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(BookingError::storage)?;
        Ok(())
    }

    async fn convert_hold(
        &self,
        hold_id: Uuid,
        draft: ReservationDraft,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;
        lock_trip(&mut tx, draft.schedule_id, draft.trip_date).await?;

        // Re-read the hold under lock: it may have been released, consumed
        // by a racing conversion, or swept since the manager loaded it.
        let hold_row = sqlx::query_as::<_, HoldRow>(
            "SELECT id, schedule_id, trip_date, created_at, expires_at FROM holds WHERE id = $1 FOR UPDATE",
        )
        .bind(hold_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(BookingError::storage)?
        .ok_or(BookingError::HoldNotFound(hold_id))?;

        // Fresh clock read: the draft's timestamp predates the transaction,
        // and a hold that lapsed in between must not convert.
        let now = Utc::now();
        if hold_row.expires_at <= now {
            return Err(BookingError::HoldExpired(hold_id));
        }

        let held_seats = hold_seat_ids(&mut *tx, hold_id).await?;

        // The hold was already an exclusive claim, so only reservations
        // that raced in can conflict. Should be impossible under correct
        // hold enforcement, but checked anyway.
        let occupancy =
            load_occupancy(&mut *tx, draft.schedule_id, draft.trip_date, now).await?;
        availability::check_against_reservations(&held_seats, &occupancy)?;

        let reservation_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, schedule_id, trip_date, kind, customer_name, customer_phone,
                 customer_email, total_price, status, created_at, payment_deadline)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reservation_id)
        .bind(draft.schedule_id)
        .bind(draft.trip_date)
        .bind(draft.kind.as_str())
        .bind(&draft.customer.name)
        .bind(&draft.customer.phone.0)
        .bind(&draft.customer.email.0)
        .bind(draft.total_price)
        .bind(ReservationStatus::Pending.as_str())
        .bind(draft.created_at)
        .bind(draft.payment_deadline)
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        for seat_id in &draft.seat_ids {
            sqlx::query(
                "INSERT INTO reservation_seats (reservation_id, seat_id) VALUES ($1, $2)",
            )
            .bind(reservation_id)
            .bind(seat_id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;
        }

        // The hold is consumed; cascade removes its seat rows.
        sqlx::query("DELETE FROM holds WHERE id = $1")
            .bind(hold_id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;

        tx.commit().await.map_err(BookingError::storage)?;

        Ok(Reservation {
            id: reservation_id,
            schedule_id: draft.schedule_id,
            trip_date: draft.trip_date,
            kind: draft.kind,
            seat_ids: draft.seat_ids,
            customer: draft.customer,
            total_price: draft.total_price,
            status: ReservationStatus::Pending,
            created_at: draft.created_at,
            payment_deadline: draft.payment_deadline,
            confirmed_at: None,
        })
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError> {
        let mut conn = self.pool.acquire().await.map_err(BookingError::storage)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(BookingError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let seat_ids = reservation_seat_ids(&mut *conn, id).await?;
        row.into_reservation(seat_ids).map(Some)
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        to: ReservationStatus,
        at: DateTime<Utc>,
        allowed_from: Option<ReservationStatus>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(BookingError::storage)?
        .ok_or(BookingError::ReservationNotFound(id))?;

        let from = ReservationStatus::parse(&row.status)
            .ok_or_else(|| BookingError::storage(format!("unknown reservation status: {}", row.status)))?;
        if !from.can_become(to) || allowed_from.is_some_and(|req| req != from) {
            return Err(BookingError::InvalidTransition { id, from, to });
        }

        let confirmed_at = if to == ReservationStatus::Confirmed {
            Some(at)
        } else {
            row.confirmed_at
        };

        sqlx::query("UPDATE reservations SET status = $1, confirmed_at = $2 WHERE id = $3")
            .bind(to.as_str())
            .bind(confirmed_at)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;

        let seat_ids = reservation_seat_ids(&mut *tx, id).await?;
        tx.commit().await.map_err(BookingError::storage)?;

        let mut reservation = row.into_reservation(seat_ids)?;
        reservation.status = to;
        reservation.confirmed_at = confirmed_at;
        Ok(reservation)
    }

    async fn trip_occupancy(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TripOccupancy, BookingError> {
        let mut conn = self.pool.acquire().await.map_err(BookingError::storage)?;
        load_occupancy(&mut *conn, schedule_id, trip_date, now).await
    }

    async fn sweep_expired_holds(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let result = sqlx::query("DELETE FROM holds WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(BookingError::storage)?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'EXPIRED' WHERE status = 'PENDING' AND payment_deadline < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(BookingError::storage)?;
        Ok(result.rows_affected())
    }
}
