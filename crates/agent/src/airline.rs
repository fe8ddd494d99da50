//! The airline support desk: concrete tools, personas, and topology.
//!
//! Five agents around a triage root. Triage hands off to every specialist;
//! every specialist hands back to triage. Transfers into seat booking and
//! cancellation backfill missing reservation facts from the injected
//! backend so those agents never start from a blank context.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use skydesk_core::{ReservationBackend, TripContext, TurnError};

use crate::graph::{AgentDefinition, AgentGraph, GraphError, HandoffEdge, TransferHook};
use crate::guardrails::{Guardrail, JailbreakGuardrail, RelevanceGuardrail};
use crate::tools::{required_str, Tool, ToolRegistry};

pub const TRIAGE: &str = "triage";
pub const SEAT_BOOKING: &str = "seat_booking";
pub const FLIGHT_STATUS: &str = "flight_status";
pub const CANCELLATION: &str = "cancellation";
pub const FAQ: &str = "faq";

/// Sentinel consumed by the presentation layer to open the seat picker.
pub const SEAT_MAP_SENTINEL: &str = "DISPLAY_SEAT_MAP";

const HANDOFF_PREFIX: &str = "You are part of a multi-agent airline support desk. If the \
                              customer asks for something outside your routine, transfer the \
                              conversation to the triage agent.";

/// Answers canned frequently-asked questions by keyword. First matching
/// category wins; the flight category reads the trip context.
pub struct FaqLookupTool;

#[async_trait]
impl Tool for FaqLookupTool {
    fn name(&self) -> &'static str {
        "faq_lookup"
    }

    fn description(&self) -> &'static str {
        "Look up answers to frequently asked questions about the airline."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "The customer's question." }
            },
            "required": ["question"]
        })
    }

    async fn invoke(
        &self,
        context: &mut TripContext,
        arguments: Value,
    ) -> Result<String, TurnError> {
        let question = required_str(&arguments, "question", "faq_lookup")?.to_lowercase();

        if question.contains("bag") || question.contains("luggage") {
            return Ok("You are allowed one checked bag on the plane. It must be under 50 \
                       pounds and within 22 x 14 x 9 inches."
                .to_string());
        }
        if question.contains("seat") || question.contains("plane") {
            return Ok("The plane has 120 seats: 22 in business class and 98 in economy. Exit \
                       rows are 4 and 16, and rows 5 through 8 are Economy Plus with extra \
                       legroom."
                .to_string());
        }
        if question.contains("wifi") || question.contains("wi-fi") {
            return Ok("We have free wifi on the plane; join the Airline-Wifi network.".to_string());
        }
        if question.contains("flight") {
            return Ok(match &context.flight_number {
                Some(flight) => format!("Your flight number is {flight}."),
                None => "Sorry, I couldn't find your flight number.".to_string(),
            });
        }
        Ok("I'm sorry, I don't know the answer to that question.".to_string())
    }
}

/// Changes the seat on the reservation held in the trip context.
pub struct UpdateSeatTool;

#[async_trait]
impl Tool for UpdateSeatTool {
    fn name(&self) -> &'static str {
        "update_seat"
    }

    fn description(&self) -> &'static str {
        "Update the seat for a given confirmation number."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "confirmation_number": { "type": "string" },
                "new_seat": { "type": "string" }
            },
            "required": ["confirmation_number", "new_seat"]
        })
    }

    fn mutates_context(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        context: &mut TripContext,
        arguments: Value,
    ) -> Result<String, TurnError> {
        let confirmation = required_str(&arguments, "confirmation_number", "update_seat")?;
        let new_seat = required_str(&arguments, "new_seat", "update_seat")?;

        // Precondition checked before any write: a failed call must leave
        // the seat untouched.
        if context.flight_number.is_none() {
            return Err(TurnError::MissingFact {
                tool: "update_seat".to_string(),
                fact: "flight_number",
            });
        }

        context.confirmation_number = Some(confirmation.clone());
        context.seat_number = Some(new_seat.clone());
        Ok(format!("Updated seat to {new_seat} for confirmation {confirmation}."))
    }
}

/// Pure function of the flight-number argument; no context access.
pub struct FlightStatusTool;

#[async_trait]
impl Tool for FlightStatusTool {
    fn name(&self) -> &'static str {
        "flight_status"
    }

    fn description(&self) -> &'static str {
        "Look up the status of a flight."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "flight_number": { "type": "string" }
            },
            "required": ["flight_number"]
        })
    }

    async fn invoke(
        &self,
        _context: &mut TripContext,
        arguments: Value,
    ) -> Result<String, TurnError> {
        let flight = required_str(&arguments, "flight_number", "flight_status")?;
        Ok(format!("Flight {flight} is on time and scheduled to depart from gate A10."))
    }
}

/// Baggage fee and allowance lookup with a clarification fallback.
pub struct BaggageInfoTool;

#[async_trait]
impl Tool for BaggageInfoTool {
    fn name(&self) -> &'static str {
        "baggage_info"
    }

    fn description(&self) -> &'static str {
        "Look up baggage allowance and fees."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" }
            },
            "required": ["query"]
        })
    }

    async fn invoke(
        &self,
        _context: &mut TripContext,
        arguments: Value,
    ) -> Result<String, TurnError> {
        let query = required_str(&arguments, "query", "baggage_info")?.to_lowercase();
        if query.contains("fee") {
            return Ok("Overweight bag fee is $75.".to_string());
        }
        if query.contains("allowance") {
            return Ok("One carry-on and one checked bag (up to 50 lbs) are included.".to_string());
        }
        Ok("Please provide more details about your baggage question.".to_string())
    }
}

/// Cancels the flight held in the trip context.
///
/// Deliberately leaves `flight_number` in place after cancelling: the
/// cancelled flight can still be queried later in the conversation.
pub struct CancelFlightTool;

#[async_trait]
impl Tool for CancelFlightTool {
    fn name(&self) -> &'static str {
        "cancel_flight"
    }

    fn description(&self) -> &'static str {
        "Cancel the flight on the customer's reservation."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(
        &self,
        context: &mut TripContext,
        _arguments: Value,
    ) -> Result<String, TurnError> {
        match &context.flight_number {
            Some(flight) => Ok(format!("Your flight {flight} has been successfully cancelled.")),
            None => Err(TurnError::MissingFact {
                tool: "cancel_flight".to_string(),
                fact: "flight_number",
            }),
        }
    }
}

/// Emits the sentinel the UI turns into an interactive seat picker.
pub struct DisplaySeatMapTool;

#[async_trait]
impl Tool for DisplaySeatMapTool {
    fn name(&self) -> &'static str {
        "display_seat_map"
    }

    fn description(&self) -> &'static str {
        "Display an interactive seat map so the customer can pick a new seat."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(
        &self,
        _context: &mut TripContext,
        _arguments: Value,
    ) -> Result<String, TurnError> {
        Ok(SEAT_MAP_SENTINEL.to_string())
    }
}

/// The assembled desk: validated graph plus its tool registry.
pub struct AirlineDesk {
    pub tools: Arc<ToolRegistry>,
    pub graph: Arc<AgentGraph>,
}

impl AirlineDesk {
    pub fn build(reservations: Arc<dyn ReservationBackend>) -> Result<Self, GraphError> {
        let mut tools = ToolRegistry::new();
        tools.register(FaqLookupTool)?;
        tools.register(UpdateSeatTool)?;
        tools.register(FlightStatusTool)?;
        tools.register(BaggageInfoTool)?;
        tools.register(CancelFlightTool)?;
        tools.register(DisplaySeatMapTool)?;

        let graph = AgentGraph::new(
            TRIAGE,
            vec![
                triage_agent(reservations),
                seat_booking_agent(),
                flight_status_agent(),
                cancellation_agent(),
                faq_agent(),
            ],
            &tools,
        )?;

        Ok(Self { tools: Arc::new(tools), graph: Arc::new(graph) })
    }
}

fn default_guardrails() -> Vec<Arc<dyn Guardrail>> {
    vec![Arc::new(RelevanceGuardrail), Arc::new(JailbreakGuardrail)]
}

/// Backfill hook shared by the seat-booking and cancellation edges.
fn reservation_backfill(reservations: Arc<dyn ReservationBackend>) -> TransferHook {
    Arc::new(move |context: &mut TripContext| {
        if context.flight_number.is_none() {
            context.flight_number = Some(reservations.default_flight_number());
        }
        if context.confirmation_number.is_none() {
            context.confirmation_number = Some(reservations.default_confirmation_number());
        }
    })
}

fn triage_agent(reservations: Arc<dyn ReservationBackend>) -> AgentDefinition {
    let backfill = reservation_backfill(reservations);
    AgentDefinition::new(
        TRIAGE,
        "Routes the customer's request to the most appropriate agent.",
        Arc::new(|_context: &TripContext| {
            format!(
                "{HANDOFF_PREFIX}\nYou are a triage agent for an airline support desk. Use your \
                 handoffs to delegate the customer's request to the right specialist."
            )
        }),
    )
    .with_guardrails(default_guardrails())
    .with_handoffs(vec![
        HandoffEdge::to(FLIGHT_STATUS, "Provides flight status information."),
        HandoffEdge::to(CANCELLATION, "Cancels the customer's flight.")
            .with_hook(Arc::clone(&backfill)),
        HandoffEdge::to(FAQ, "Answers frequently asked questions about the airline."),
        HandoffEdge::to(SEAT_BOOKING, "Updates the seat on the customer's flight.")
            .with_hook(backfill),
    ])
}

fn seat_booking_agent() -> AgentDefinition {
    AgentDefinition::new(
        SEAT_BOOKING,
        "Updates the seat on the customer's flight.",
        Arc::new(|context: &TripContext| {
            let confirmation = TripContext::display(&context.confirmation_number);
            format!(
                "{HANDOFF_PREFIX}\nYou are a seat booking agent. Follow this routine:\n1. The \
                 customer's confirmation number is {confirmation}. If you don't have it, ask for \
                 it; if you do, confirm it with the customer.\n2. Ask which seat they want. You \
                 can use the display_seat_map tool to show an interactive seat map.\n3. Use the \
                 update_seat tool to change the seat."
            )
        }),
    )
    .with_tools(&["update_seat", "display_seat_map"])
    .with_guardrails(default_guardrails())
    .with_handoffs(vec![HandoffEdge::to(
        TRIAGE,
        "Routes the customer's request to the most appropriate agent.",
    )])
}

fn flight_status_agent() -> AgentDefinition {
    AgentDefinition::new(
        FLIGHT_STATUS,
        "Provides flight status information.",
        Arc::new(|context: &TripContext| {
            let confirmation = TripContext::display(&context.confirmation_number);
            let flight = TripContext::display(&context.flight_number);
            format!(
                "{HANDOFF_PREFIX}\nYou are a flight status agent. Follow this routine:\n1. The \
                 customer's confirmation number is {confirmation} and flight number is {flight}. \
                 Ask for whichever is missing; confirm whichever you have.\n2. Use the \
                 flight_status tool to report the status of the flight."
            )
        }),
    )
    .with_tools(&["flight_status"])
    .with_guardrails(default_guardrails())
    .with_handoffs(vec![HandoffEdge::to(
        TRIAGE,
        "Routes the customer's request to the most appropriate agent.",
    )])
}

fn cancellation_agent() -> AgentDefinition {
    AgentDefinition::new(
        CANCELLATION,
        "Cancels the customer's flight.",
        Arc::new(|context: &TripContext| {
            let confirmation = TripContext::display(&context.confirmation_number);
            let flight = TripContext::display(&context.flight_number);
            format!(
                "{HANDOFF_PREFIX}\nYou are a cancellation agent. Follow this routine:\n1. The \
                 customer's confirmation number is {confirmation} and flight number is {flight}. \
                 Ask for whichever is missing; confirm whichever you have.\n2. Once the customer \
                 confirms, use the cancel_flight tool to cancel the flight."
            )
        }),
    )
    .with_tools(&["cancel_flight"])
    .with_guardrails(default_guardrails())
    .with_handoffs(vec![HandoffEdge::to(
        TRIAGE,
        "Routes the customer's request to the most appropriate agent.",
    )])
}

fn faq_agent() -> AgentDefinition {
    AgentDefinition::new(
        FAQ,
        "Answers frequently asked questions about the airline.",
        Arc::new(|_context: &TripContext| {
            format!(
                "{HANDOFF_PREFIX}\nYou are an FAQ agent. Follow this routine:\n1. Identify the \
                 customer's last question.\n2. Use the faq_lookup tool to answer it; do not rely \
                 on your own knowledge.\n3. Reply with the answer."
            )
        }),
    )
    .with_tools(&["faq_lookup", "baggage_info"])
    .with_guardrails(default_guardrails())
    .with_handoffs(vec![HandoffEdge::to(
        TRIAGE,
        "Routes the customer's request to the most appropriate agent.",
    )])
}
