use crate::context::TripContext;

/// Source of passenger and reservation data.
///
/// The routing core never hardcodes reservation facts: new sessions are
/// seeded from here, and handoff transfer hooks backfill missing fields from
/// here. A production implementation talks to the reservation system; the
/// shipped one returns fixed demo values.
pub trait ReservationBackend: Send + Sync {
    /// Context for a brand-new session, as if loaded from the reservation
    /// system by the caller's account.
    fn seed_context(&self) -> TripContext;

    /// Flight number to assume when a transfer hook finds none on file.
    fn default_flight_number(&self) -> String;

    /// Confirmation number to assume when a transfer hook finds none on file.
    fn default_confirmation_number(&self) -> String;
}

/// Demo backend with the reference dataset. Sessions start empty; only the
/// transfer-hook defaults are pre-filled, so the specialist agents never
/// operate on a fully blank context.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoReservations;

impl DemoReservations {
    pub const FLIGHT_NUMBER: &'static str = "FLT-456";
    pub const CONFIRMATION_NUMBER: &'static str = "ABC123";
}

impl ReservationBackend for DemoReservations {
    fn seed_context(&self) -> TripContext {
        TripContext::new()
    }

    fn default_flight_number(&self) -> String {
        Self::FLIGHT_NUMBER.to_string()
    }

    fn default_confirmation_number(&self) -> String {
        Self::CONFIRMATION_NUMBER.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{DemoReservations, ReservationBackend};

    #[test]
    fn demo_backend_seeds_an_empty_context() {
        let backend = DemoReservations;
        let context = backend.seed_context();
        assert!(context.flight_number.is_none());
        assert!(context.passenger_name.is_none());
    }

    #[test]
    fn demo_backend_supplies_fixed_backfill_values() {
        let backend = DemoReservations;
        assert_eq!(backend.default_flight_number(), "FLT-456");
        assert_eq!(backend.default_confirmation_number(), "ABC123");
    }
}
