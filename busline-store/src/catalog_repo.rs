use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::PgPool;
use uuid::Uuid;

use busline_catalog::{
    Bus, Route, Schedule, ScheduleDays, ScheduleStatus, ScheduleWithPricing, Seat, SeatType,
};
use busline_core::{BookingError, ScheduleCatalog};

pub struct StoreScheduleCatalog {
    pool: PgPool,
}

impl StoreScheduleCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    route_id: Uuid,
    bus_id: Uuid,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    days: Vec<String>,
    price_multiplier: f64,
    status: String,
    origin: String,
    destination: String,
    base_price: f64,
    bus_name: String,
    capacity: i32,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    bus_id: Uuid,
    seat_number: String,
    seat_type: String,
    price_modifier: f64,
}

#[async_trait]
impl ScheduleCatalog for StoreScheduleCatalog {
    async fn schedule_with_pricing(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ScheduleWithPricing>, BookingError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT s.id, s.route_id, s.bus_id, s.departure_time, s.arrival_time,
                   s.days, s.price_multiplier, s.status,
                   r.origin, r.destination, r.base_price,
                   b.name AS bus_name, b.capacity
            FROM schedules s
            JOIN routes r ON r.id = s.route_id
            JOIN buses b ON b.id = s.bus_id
            WHERE s.id = $1
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status = ScheduleStatus::parse(&row.status)
            .ok_or_else(|| BookingError::storage(format!("unknown schedule status: {}", row.status)))?;

        let seat_rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, bus_id, seat_number, seat_type, price_modifier FROM seats WHERE bus_id = $1 ORDER BY seat_number",
        )
        .bind(row.bus_id)
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        let mut seats = Vec::with_capacity(seat_rows.len());
        for s in seat_rows {
            let seat_type = SeatType::parse(&s.seat_type)
                .ok_or_else(|| BookingError::storage(format!("unknown seat type: {}", s.seat_type)))?;
            seats.push(Seat {
                id: s.id,
                bus_id: s.bus_id,
                seat_number: s.seat_number,
                seat_type,
                price_modifier: s.price_modifier,
            });
        }

        Ok(Some(ScheduleWithPricing {
            schedule: Schedule {
                id: row.id,
                route_id: row.route_id,
                bus_id: row.bus_id,
                departure_time: row.departure_time,
                arrival_time: row.arrival_time,
                days: ScheduleDays(row.days),
                price_multiplier: row.price_multiplier,
                status,
            },
            route: Route {
                id: row.route_id,
                origin: row.origin,
                destination: row.destination,
                base_price: row.base_price,
            },
            bus: Bus {
                id: row.bus_id,
                name: row.bus_name,
                capacity: row.capacity,
                seats,
            },
        }))
    }
}
