// Standard library
use std::sync::OnceLock;

// External crates
use clap::Parser;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

// Internal imports
use ksail_core::{ksail_error, ksail_error_hint, KsailError};
use ksail_logging::{init_subscriber, LogSettings};
use ksail_messages::{messages::MESSAGES, msg};

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

/// Request ID for this execution, attached to every log line
static REQUEST_ID: OnceLock<String> = OnceLock::new();

fn get_request_id() -> &'static str {
    REQUEST_ID.get_or_init(|| Uuid::new_v4().to_string())
}

fn is_docker_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<KsailError>(),
            Some(KsailError::DockerNotRunning | KsailError::DockerPermission)
        )
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Keeps the file writer flushing until exit
    let log_guard = init_subscriber(&LogSettings::from_env(args.debug));

    let span = info_span!(
        "ksail",
        request_id = get_request_id(),
        command = args.command.name()
    );
    debug!(parent: &span, "Starting ksail command");

    if let Err(e) = execute_command(args).instrument(span).await {
        ksail_error!("{}", msg!(MESSAGES.error_generic, error = &e));
        if is_docker_unavailable(&e) {
            ksail_error_hint!("{}", MESSAGES.error_hint_docker);
        }
        drop(log_guard);
        std::process::exit(1);
    }
}
