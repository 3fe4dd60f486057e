use serde::Serialize;

use ferrobank_core::forecast::confidence_percent;
use ferrobank_core::{
    ForecastDirection, ForecastEngine, ForecastMethod, ForecastPeriod, TransactionCategory,
};
use rust_decimal::Decimal;

use crate::cli::ForecastArgs;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

#[derive(Debug, Serialize)]
struct ComponentView {
    method: ForecastMethod,
    amount: Decimal,
    confidence_percent: u8,
}

#[derive(Debug, Serialize)]
struct ForecastView {
    direction: ForecastDirection,
    period: ForecastPeriod,
    amount: Decimal,
    confidence_percent: u8,
    method: ForecastMethod,
    components: Vec<ComponentView>,
}

#[derive(Debug, Serialize)]
struct CategoryView {
    category: TransactionCategory,
    amount: Decimal,
    confidence_percent: u8,
}

pub fn run(args: &ForecastArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let transactions = context.repository().all_transactions()?;
    let engine = ForecastEngine::new();
    let period = ForecastPeriod::from(args.period);

    if args.by_category {
        let direction = ForecastDirection::from(args.direction);
        let categories = engine
            .forecast_by_category(&transactions, period)
            .into_iter()
            .map(|forecast| CategoryView {
                category: forecast.category,
                amount: forecast.amount,
                confidence_percent: confidence_percent(forecast.confidence),
            })
            .collect::<Vec<_>>();
        let mut result = CommandResult::ok(serde_json::json!({
            "period": period,
            "categories": categories,
        }))?;
        if direction == ForecastDirection::Income {
            result = result.with_warning("per-category forecasts cover expenses only");
        }
        return Ok(result);
    }

    let forecast = engine.forecast(&transactions, args.direction.into(), period);
    let mut result = CommandResult::ok(ForecastView {
        direction: forecast.direction,
        period: forecast.period,
        amount: forecast.amount,
        confidence_percent: confidence_percent(forecast.confidence),
        method: forecast.method,
        components: forecast
            .components
            .into_iter()
            .map(|component| ComponentView {
                method: component.method,
                amount: component.amount,
                confidence_percent: confidence_percent(component.confidence),
            })
            .collect(),
    })?;
    if forecast.method == ForecastMethod::InsufficientData {
        result = result.with_warning("no completed transactions to forecast from; run `ferrobank sync`");
    }
    Ok(result)
}
