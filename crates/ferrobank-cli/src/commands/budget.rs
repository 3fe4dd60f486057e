use std::sync::Arc;

use serde::Serialize;

use ferrobank_core::{
    parse_amount, Budget, BudgetRecalculator, TracingNotificationSink, TransactionCategory,
    UtcDateTime,
};
use rust_decimal::Decimal;

use crate::cli::{BudgetAddArgs, BudgetCommand};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

#[derive(Debug, Serialize)]
struct BudgetView {
    #[serde(flatten)]
    budget: Budget,
    spent: Decimal,
    remaining: Decimal,
    usage_percentage: f64,
    exceeded: bool,
}

impl From<Budget> for BudgetView {
    fn from(budget: Budget) -> Self {
        Self {
            spent: budget.total_spent(),
            remaining: budget.remaining(),
            usage_percentage: budget.usage_percentage(),
            exceeded: budget.is_exceeded(),
            budget,
        }
    }
}

pub fn run(command: &BudgetCommand, context: &AppContext) -> Result<CommandResult, CliError> {
    match command {
        BudgetCommand::Add(args) => add(args, context),
        BudgetCommand::List => list(context),
    }
}

fn add(args: &BudgetAddArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let limit = parse_amount(&args.limit)?;
    let mut budget = Budget::new(args.name.clone(), limit, args.period.into(), UtcDateTime::now());
    for raw in &args.categories {
        let (category, amount) = parse_category_limit(raw)?;
        budget = budget.with_category(category, amount);
    }

    let repository = context.repository();
    let transactions = repository.all_transactions()?;
    let recalculator =
        BudgetRecalculator::new(repository.clone(), Arc::new(TracingNotificationSink));
    let budget = recalculator.apply(budget, &transactions);
    repository.save_budget(&budget)?;

    CommandResult::ok(BudgetView::from(budget))
}

fn list(context: &AppContext) -> Result<CommandResult, CliError> {
    let budgets = context
        .repository()
        .budgets()?
        .into_iter()
        .map(BudgetView::from)
        .collect::<Vec<_>>();
    CommandResult::ok(serde_json::json!({ "budgets": budgets }))
}

fn parse_category_limit(raw: &str) -> Result<(TransactionCategory, Decimal), CliError> {
    let (category, amount) = raw
        .split_once('=')
        .ok_or_else(|| CliError::Command(format!("expected category=amount, got '{raw}'")))?;
    Ok((category.parse()?, parse_amount(amount)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_category_limits() {
        let (category, amount) = parse_category_limit("food=15000.50").expect("valid");

        assert_eq!(category, TransactionCategory::Food);
        assert_eq!(amount, Decimal::new(1500050, 2));
    }

    #[test]
    fn rejects_malformed_category_limits() {
        assert!(matches!(
            parse_category_limit("food"),
            Err(CliError::Command(_))
        ));
        assert!(matches!(
            parse_category_limit("groceries=10"),
            Err(CliError::Validation(_))
        ));
    }
}
