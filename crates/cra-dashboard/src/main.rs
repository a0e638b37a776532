//! cra-dashboard — follow a contract review from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use cra_client::{ClientContext, LoadState, ReviewController, SessionEvent};
use cra_core::ClientConfig;
use cra_pipeline::StageStatus;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod layout;

const DEFAULT_TICKS: u32 = 300;

fn print_help() {
    println!("cra-dashboard — contract review pipeline client");
    println!();
    println!("Usage: cra-dashboard <command>");
    println!();
    println!("Commands:");
    println!("  watch <contract-id>             Load a contract and follow its review stream");
    println!("  materialize <payload.json> [n]  Materialize a graph payload and lay it out (n ticks)");
    println!("  help                            Show this help message");
    println!();
    println!("Environment: CRA_SERVICE_URL, CRA_WS_URL, CRA_CACHE_DIR, CRA_TOKEN, CRA_REQUEST_TIMEOUT_SECS");
}

async fn watch(contract_id: &str) -> anyhow::Result<bool> {
    let config = ClientConfig::from_env()?;
    info!("Contract service: {}", config.service_url);
    let ctx = Arc::new(ClientContext::with_tracing(config)?);

    let mut controller = ReviewController::new(ctx);
    controller.open(contract_id);
    controller.load().await;
    if let LoadState::Failed(message) = controller.view().load_state() {
        eprintln!("Failed to load contract {}: {}", contract_id, message);
        return Ok(false);
    }
    if let Some(contract) = controller.view().contract() {
        info!(
            "{} [{}]",
            contract.display_name(),
            contract.status_label()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        let message = tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            message = controller.step() => message,
        };
        let Some(message) = message else { break };
        if message.generation != controller.generation() {
            continue;
        }

        let view = controller.view();
        match &message.event {
            SessionEvent::Opened => info!("Review stream connected"),
            SessionEvent::Closed => {
                warn!("Review stream closed");
                break;
            }
            SessionEvent::Stage(event) => {
                let state = view.pipeline();
                let stage = state.active_stage().map(|s| s.label).unwrap_or("-");
                let sent = event
                    .sent_at()
                    .map(|at| at.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                info!(
                    "[{}/{}] {} {} (sent {})",
                    state.active_stage_index.map(|i| i + 1).unwrap_or(0),
                    cra_pipeline::Stage::count(),
                    stage,
                    state.status_text().unwrap_or_default(),
                    sent
                );
                if event.status == StageStatus::Failed {
                    warn!("Stage {} failed", event.step);
                }
                if let Some(snapshot) = view.snapshot() {
                    if event.step == cra_pipeline::KG_BUILD {
                        info!(
                            "Knowledge graph ready: {} nodes, {} links",
                            snapshot.nodes.len(),
                            snapshot.links.len()
                        );
                    }
                }
                if state.is_complete {
                    info!("Review complete");
                    break;
                }
            }
        }
    }
    controller.close();
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "watch" => {
            let Some(contract_id) = args.get(2) else {
                eprintln!("Usage: cra-dashboard watch <contract-id>");
                std::process::exit(1);
            };
            let ok = watch(contract_id).await?;
            std::process::exit(if ok { 0 } else { 1 });
        }
        "materialize" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: cra-dashboard materialize <payload.json> [ticks]");
                std::process::exit(1);
            };
            let ticks = match args.get(3) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("ticks must be a number: {}", raw))?,
                None => DEFAULT_TICKS,
            };
            let graph = layout::lay_out_file(&PathBuf::from(path), ticks)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        "--help" | "-h" | "help" => print_help(),
        other => {
            eprintln!("Unknown command: {}. Use 'cra-dashboard help' for usage.", other);
            std::process::exit(1);
        }
    }
    Ok(())
}
