pub mod config;
pub mod context;
pub mod errors;
pub mod reservation;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat, OracleProvider};
pub use context::TripContext;
pub use errors::{TurnError, TurnErrorKind};
pub use reservation::{DemoReservations, ReservationBackend};
