use serde::{Deserialize, Serialize};

/// Mutable record of the caller's known trip facts.
///
/// One instance lives inside each session and is mutated in place by tool
/// invocations and handoff transfer hooks. It is never shared across
/// sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripContext {
    pub passenger_name: Option<String>,
    pub confirmation_number: Option<String>,
    pub seat_number: Option<String>,
    pub flight_number: Option<String>,
    pub account_number: Option<String>,
}

impl TripContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display form for instruction templates: the value or `[unknown]`.
    pub fn display(field: &Option<String>) -> &str {
        field.as_deref().unwrap_or("[unknown]")
    }
}

#[cfg(test)]
mod tests {
    use super::TripContext;

    #[test]
    fn new_context_has_no_known_facts() {
        let context = TripContext::new();
        assert_eq!(context, TripContext::default());
        assert!(context.flight_number.is_none());
        assert!(context.confirmation_number.is_none());
    }

    #[test]
    fn display_substitutes_unknown_marker() {
        assert_eq!(TripContext::display(&None), "[unknown]");
        assert_eq!(TripContext::display(&Some("FLT-456".to_string())), "FLT-456");
    }
}
