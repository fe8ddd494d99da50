use std::sync::Arc;

use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use skydesk_agent::airline::{AirlineDesk, SEAT_MAP_SENTINEL};
use skydesk_agent::oracle::RuleOracle;
use skydesk_agent::runtime::{SupportRuntime, TurnLimits, TurnOutcome};
use skydesk_core::{AppConfig, DemoReservations, OracleProvider, ReservationBackend};

/// Interactive stdin/stdout loop against a single session.
pub async fn run(config: &AppConfig, session_id: &str) -> Result<()> {
    let reservations: Arc<dyn ReservationBackend> = Arc::new(DemoReservations);
    let desk = AirlineDesk::build(Arc::clone(&reservations))?;
    let runtime = SupportRuntime::new(
        desk.graph,
        desk.tools,
        Arc::new(RuleOracle),
        reservations,
        TurnLimits::from_config(config),
    );

    let mut stdout = io::stdout();
    if config.oracle.provider != OracleProvider::Rules {
        stdout
            .write_all(
                b"note: only the offline rules oracle ships in this build; \
                  ignoring the configured provider\n",
            )
            .await?;
    }
    stdout
        .write_all(
            format!(
                "skydesk support desk (session `{session_id}`). \
                 Type a message, `/reset` to start over, or `exit` to leave.\n"
            )
            .as_bytes(),
        )
        .await?;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message == "/reset" {
            runtime.sessions().reset(session_id).await;
            stdout.write_all(b"desk> Session cleared; you are back with triage.\n").await?;
            continue;
        }

        let outcome = runtime.handle_message(session_id, message).await;
        stdout.write_all(render_outcome(&outcome).as_bytes()).await?;
    }

    stdout.write_all(b"Goodbye.\n").await?;
    Ok(())
}

fn render_outcome(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Replied { agent, text } if text == SEAT_MAP_SENTINEL => format!(
            "{agent}> [seat map] Rows 1-4 Business, 5-30 Economy (exit rows 4 and 16, \
             A/F window, C/D aisle). Tell me the seat you'd like, for example 23C.\n"
        ),
        TurnOutcome::Replied { agent, text } => format!("{agent}> {text}\n"),
        TurnOutcome::Refused { rationale, .. } => format!("desk> {rationale}\n"),
        TurnOutcome::Failed { message, .. } => format!("desk> {message}\n"),
    }
}
