use crate::cli::ConsentCommand;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

pub async fn run(command: &ConsentCommand, context: &AppContext) -> Result<CommandResult, CliError> {
    match command {
        ConsentCommand::Status(args) => {
            let details = context.orchestrator.consent_status(&args.provider).await?;
            CommandResult::ok(details)
        }
        ConsentCommand::Revoke(args) => {
            context.orchestrator.revoke_consent(&args.provider).await?;
            CommandResult::ok(serde_json::json!({
                "provider_id": args.provider,
                "status": "revoked",
            }))
        }
    }
}
