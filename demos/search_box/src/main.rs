//! Search Box Example
//!
//! Simulates a user typing into a search box and shows the delivery
//! policies of EventFlux working together:
//!
//! ```text
//! keystroke ─▶ "search:query"    trim/reject middleware, lowercase interceptor,
//!                                 200ms debounce, async lookup
//!           ─▶ "search:history"  queued, one record at a time
//!           ─▶ "search:tip"      invoke limit 1
//! submit    ─▶ "search:provider" emit_all over every provider
//! ```
//!
//! # Usage
//!
//! ```bash
//! EVENTFLUX_LOGGING__LEVEL=debug cargo run --package search-box
//! ```

use std::time::Duration;

use anyhow::Result;
use eventflux::prelude::*;
use tokio::time::sleep;
use tracing::{info, warn};

const CATALOG: &[&str] = &["rust", "rustc", "rustfmt", "rustup", "ruby", "python"];

type Suggestions = Vec<String>;

fn suggest(source: &str, prefix: &str) -> Suggestions {
    CATALOG
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .map(|entry| format!("{source}:{entry}"))
        .collect()
}

// ============================================================================
// Wiring
// ============================================================================

fn register(flux: &EventFlux<String, Suggestions>) -> ControlHandle<String, Suggestions> {
    let lookup = flux.on(
        "search:query",
        Handler::from_async(|query: String| async move {
            sleep(Duration::from_millis(20)).await;
            suggest("catalog", &query)
        }),
        HandlerOptions::new()
            .middleware(Middleware::sync(|_, query: &mut String| {
                *query = query.trim().to_string();
                !query.is_empty()
            }))
            .debounce(Duration::from_millis(200)),
    );
    flux.intercept_mut("search:query", |query| query.make_ascii_lowercase());

    flux.on(
        "search:history",
        Handler::from_async(|query: String| async move {
            sleep(Duration::from_millis(10)).await;
            info!(query = %query, "recorded in history");
            Suggestions::new()
        }),
        HandlerOptions::new().with_queue(),
    );

    flux.on(
        "search:tip",
        Handler::sync(|_: String| {
            info!("tip: press Enter to search every provider");
            Suggestions::new()
        }),
        HandlerOptions::new().invoke_limit(1),
    );

    for (priority, source) in [(1, "docs"), (0, "crates")] {
        flux.on(
            "search:provider",
            Handler::sync(move |query: String| suggest(source, &query)),
            HandlerOptions::new().priority(priority),
        );
    }

    lookup
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = EventFluxRuntime::new();
    let flux: EventFlux<String, Suggestions> = runtime.engine();
    let lookup = register(&flux);

    // Every keystroke asks for suggestions; only the last one in the window runs.
    let mut responses = Vec::new();
    for typed in ["R", "Ru", "Rus", "  RUST "] {
        let emission = flux.emit_async("search:query", typed.to_string(), EmitOptions::new().atomic())?;
        responses.extend(emission.into_response());
        sleep(Duration::from_millis(50)).await;
    }
    for (typed, response) in ["R", "Ru", "Rus", "  RUST "].iter().zip(responses) {
        match response.await {
            Ok(found) => info!(typed, ?found, "suggestions"),
            Err(FluxError::Abandoned) => info!(typed, "superseded by a later keystroke"),
            Err(e) => warn!(typed, error = %e, "lookup failed"),
        }
    }

    // A namespace emission reaches every handler nested under "search".
    for query in ["rust", "ruby"] {
        let emission = flux.emit_async("search", query.to_string(), EmitOptions::new().namespaced())?;
        if let Some(listeners) = emission.listeners() {
            listeners
                .on_queued(|id, position| info!(%id, position, "queued"))
                .on_middleware_halt(|id, passed| info!(%id, passed, "halted"));
        }
    }
    sleep(Duration::from_millis(300)).await;

    // Submitting waits for every provider, lowest priority first.
    for result in flux.emit_all("search:provider", "rus".into(), EmitOptions::new()).await {
        match result {
            Ok(found) => info!(?found, "provider answered"),
            Err(e) => warn!(error = %e, "provider failed"),
        }
    }

    lookup.freeze();
    if let Err(e) = flux.emit("search:query", "rust".into(), EmitOptions::new().atomic()) {
        info!(error = %e, "lookup paused");
    }
    lookup.off()?;

    Ok(())
}
