use serde::Serialize;

use ferrobank_core::{ConnectOutcome, ProviderVariant, UserAgent, UtcDateTime};

use crate::cli::{ConnectArgs, ProviderArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;
use crate::user_agent::ConsoleUserAgent;

#[derive(Debug, Serialize)]
struct ProviderStatus<'a> {
    id: &'a str,
    name: &'a str,
    variant: ProviderVariant,
    base_url: &'a str,
    connected: bool,
    consent_id: Option<String>,
    connected_at: Option<UtcDateTime>,
}

pub fn list(context: &AppContext) -> Result<CommandResult, CliError> {
    let repository = context.repository();
    let mut providers = Vec::new();
    for descriptor in context.orchestrator.descriptors() {
        let stored = repository.get_provider(&descriptor.id)?;
        providers.push(ProviderStatus {
            id: &descriptor.id,
            name: &descriptor.name,
            variant: descriptor.variant,
            base_url: &descriptor.base_url,
            connected: stored.as_ref().is_some_and(|provider| provider.is_active),
            consent_id: stored.as_ref().and_then(|provider| provider.consent_id.clone()),
            connected_at: stored.map(|provider| provider.connected_at),
        });
    }
    CommandResult::ok(serde_json::json!({ "providers": providers }))
}

pub async fn connect(args: &ConnectArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let console = ConsoleUserAgent;
    let user_agent: Option<&dyn UserAgent> = if args.interactive {
        Some(&console)
    } else {
        None
    };

    match context
        .orchestrator
        .connect_provider(&args.provider, user_agent)
        .await?
    {
        ConnectOutcome::Connected(provider) => CommandResult::ok(provider),
        ConnectOutcome::Cancelled => Ok(CommandResult::ok(serde_json::json!({
            "provider_id": args.provider,
            "status": "cancelled",
        }))?
        .with_warning("authorization was cancelled; nothing was stored")),
    }
}

pub async fn disconnect(args: &ProviderArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    context
        .orchestrator
        .disconnect_provider(&args.provider)
        .await?;
    CommandResult::ok(serde_json::json!({
        "provider_id": args.provider,
        "status": "disconnected",
    }))
}
