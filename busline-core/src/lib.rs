pub mod availability;
pub mod error;
pub mod hold;
pub mod repository;
pub mod reservation;
pub mod rules;
pub mod sweeper;

pub use availability::{SeatAvailability, TripAvailability, TripOccupancy};
pub use error::BookingError;
pub use hold::{Hold, HoldManager};
pub use repository::{AvailabilityLedger, ScheduleCatalog};
pub use reservation::{
    CustomerContact, Reservation, ReservationDetail, ReservationDraft, ReservationKind,
    ReservationManager, ReservationStatus,
};
pub use rules::BookingRules;
pub use sweeper::ExpirySweeper;
