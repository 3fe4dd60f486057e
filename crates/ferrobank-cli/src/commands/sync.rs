use crate::cli::SyncArgs;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

pub async fn run(args: &SyncArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let orchestrator = &context.orchestrator;
    if args.force {
        orchestrator.invalidate(args.provider.as_deref()).await?;
    }

    let report = match &args.provider {
        Some(provider_id) => orchestrator.sync_one(provider_id).await?,
        None => orchestrator.sync_all().await?,
    };

    let mut result = CommandResult::ok(&report)?.with_partial_failure(!report.is_success());
    for failed in report.providers.iter().filter(|provider| !provider.is_success()) {
        result = result.with_warning(format!(
            "{}: {}",
            failed.provider_id,
            failed.error_message.as_deref().unwrap_or("sync failed")
        ));
    }
    Ok(result)
}
