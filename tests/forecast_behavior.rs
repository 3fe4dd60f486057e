//! Behavior-driven tests for the forecast engine
//!
//! Every scenario pins `now` to 2024-07-15 so look-back windows are stable.

mod support;

use ferrobank_core::forecast::confidence_percent;
use ferrobank_core::{
    ForecastDirection, ForecastEngine, ForecastMethod, ForecastPeriod, Transaction,
    TransactionCategory, TransactionStatus, TransactionType, UtcDateTime,
};
use rust_decimal::Decimal;
use support::at;

fn now() -> UtcDateTime {
    at("2024-07-15T12:00:00Z")
}

fn expense(id: &str, amount: i64, day: &str, category: TransactionCategory) -> Transaction {
    let mut transaction = Transaction::new(
        id,
        "acc-1",
        "vbank",
        Decimal::from(amount),
        "RUB",
        at(day),
        TransactionType::Expense,
        TransactionStatus::Completed,
    );
    transaction.category = Some(category);
    transaction
}

fn income(id: &str, amount: i64, day: &str) -> Transaction {
    let mut transaction = Transaction::new(
        id,
        "acc-1",
        "vbank",
        Decimal::from(amount),
        "RUB",
        at(day),
        TransactionType::Income,
        TransactionStatus::Completed,
    );
    transaction.category = Some(TransactionCategory::Salary);
    transaction
}

fn close(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

// =============================================================================
// Blended forecasts
// =============================================================================

#[test]
fn when_salary_is_steady_income_forecast_matches_it() {
    // Given: The same salary on the 5th of three consecutive months
    let history = vec![
        income("s-5", 100_000, "2024-05-05T09:00:00Z"),
        income("s-6", 100_000, "2024-06-05T09:00:00Z"),
        income("s-7", 100_000, "2024-07-05T09:00:00Z"),
    ];

    // When: Next month's income is forecast
    let forecast = ForecastEngine::new().forecast_at(
        &history,
        ForecastDirection::Income,
        ForecastPeriod::NextMonth,
        now(),
    );

    // Then: Every estimator agrees on the salary
    assert_eq!(forecast.method, ForecastMethod::Combined);
    assert_eq!(forecast.amount, Decimal::from(100_000));
    let methods: Vec<ForecastMethod> = forecast
        .components
        .iter()
        .map(|component| component.method)
        .collect();
    assert_eq!(
        methods,
        vec![
            ForecastMethod::MovingAverage,
            ForecastMethod::TrendAnalysis,
            ForecastMethod::PatternRecognition,
        ]
    );
    // (1.0 + 0.5 + 0.6) / 3
    assert!(close(forecast.confidence, 0.7), "confidence={}", forecast.confidence);
    assert_eq!(confidence_percent(forecast.confidence), 70);
}

#[test]
fn when_spending_grows_the_trend_pulls_the_forecast_up() {
    // Given: Food spending rising by 1000 each month
    let history = vec![
        expense("f-5", 1_000, "2024-05-10T12:00:00Z", TransactionCategory::Food),
        expense("f-6", 2_000, "2024-06-10T12:00:00Z", TransactionCategory::Food),
        expense("f-7", 3_000, "2024-07-10T12:00:00Z", TransactionCategory::Food),
    ];

    // When: Next month's expenses are forecast
    let forecast = ForecastEngine::new().forecast_at(
        &history,
        ForecastDirection::Expense,
        ForecastPeriod::NextMonth,
        now(),
    );

    // Then: Moving average 2000, trend 4000, categories 6000 blend to 4000
    let amounts: Vec<Decimal> = forecast
        .components
        .iter()
        .map(|component| component.amount)
        .collect();
    assert_eq!(
        amounts,
        vec![Decimal::from(2_000), Decimal::from(4_000), Decimal::from(6_000)]
    );
    assert_eq!(forecast.amount, Decimal::from(4_000));
    assert_eq!(forecast.components[2].method, ForecastMethod::CategoryBased);
}

#[test]
fn when_history_is_one_month_the_missing_trend_still_counts() {
    // Given: A single month of spending
    let history = vec![expense(
        "f-7",
        3_000,
        "2024-07-10T12:00:00Z",
        TransactionCategory::Food,
    )];

    // When: Next month's expenses are forecast
    let forecast = ForecastEngine::new().forecast_at(
        &history,
        ForecastDirection::Expense,
        ForecastPeriod::NextMonth,
        now(),
    );

    // Then: The insufficient trend drags the mean to two thirds
    assert_eq!(forecast.components[1].method, ForecastMethod::InsufficientData);
    assert_eq!(forecast.components[1].amount, Decimal::ZERO);
    assert_eq!(forecast.amount, Decimal::from(2_000));
}

#[test]
fn when_nothing_matches_the_forecast_is_insufficient() {
    // Given: Only income in history, and a pending expense
    let mut pending = expense("p-1", 900, "2024-07-01T12:00:00Z", TransactionCategory::Food);
    pending.status = TransactionStatus::Pending;
    let history = vec![income("s-7", 100_000, "2024-07-05T09:00:00Z"), pending];

    // When: Expenses are forecast
    let forecast = ForecastEngine::new().forecast_at(
        &history,
        ForecastDirection::Expense,
        ForecastPeriod::NextQuarter,
        now(),
    );

    // Then: The result is an explicit zero
    assert_eq!(forecast.method, ForecastMethod::InsufficientData);
    assert_eq!(forecast.amount, Decimal::ZERO);
    assert_eq!(forecast.confidence, 0.0);
    assert_eq!(forecast.period, ForecastPeriod::NextQuarter);
    assert!(forecast.components.is_empty());
}

// =============================================================================
// Per-category forecasts
// =============================================================================

#[test]
fn when_forecasting_by_category_each_category_is_projected_alone() {
    // Given: Food and transport spending plus income in one month
    let history = vec![
        expense("f-7", 3_000, "2024-07-10T12:00:00Z", TransactionCategory::Food),
        expense("t-7", 600, "2024-07-11T12:00:00Z", TransactionCategory::Transport),
        income("s-7", 100_000, "2024-07-05T09:00:00Z"),
    ];

    // When: Expenses are forecast per category
    let forecasts = ForecastEngine::new().forecast_by_category_at(
        &history,
        ForecastPeriod::NextMonth,
        now(),
    );

    // Then: Only expense categories appear, each with the flat confidence
    assert_eq!(forecasts.len(), 2);
    let food = forecasts
        .iter()
        .find(|forecast| forecast.category == TransactionCategory::Food)
        .expect("food");
    let transport = forecasts
        .iter()
        .find(|forecast| forecast.category == TransactionCategory::Transport)
        .expect("transport");
    assert_eq!(food.amount, Decimal::from(2_000));
    assert_eq!(transport.amount, Decimal::from(400));
    assert!(forecasts.iter().all(|forecast| close(forecast.confidence, 0.7)));
}
