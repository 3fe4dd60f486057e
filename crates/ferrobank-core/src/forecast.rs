//! # Forecast Engine
//!
//! Blends independent estimators into one projection for the next period.
//!
//! | Estimator | Input window | Confidence |
//! |-----------|--------------|------------|
//! | moving average | last 3 calendar months, monthly totals | `min(months / 3, 1)` |
//! | trend | last 6 calendar months, OLS over month index, floored at 0 | `min(months / 6, 0.9)` |
//! | pattern (income) | transactions on day ≤ 5 or ≥ 25 | `0.6` |
//! | category (expense) | top 5 expense categories | `min(categories / 5, 0.8)` |
//!
//! An estimator without input reports `insufficient_data` with zero amount
//! and zero confidence and still counts toward the blended mean.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analyzer::TransactionAnalyzer;
use crate::{Transaction, TransactionCategory, UtcDateTime};

/// Flat confidence attached to every per-category projection.
pub const CATEGORY_FORECAST_CONFIDENCE: f64 = 0.7;
const PATTERN_CONFIDENCE: f64 = 0.6;
const TOP_CATEGORY_LIMIT: usize = 5;

labelled_enum! {
    /// Horizon label carried on every result. The projection itself is
    /// always one calendar month ahead.
    ForecastPeriod, "forecast period" {
        NextWeek => "next_week",
        NextMonth => "next_month",
        NextQuarter => "next_quarter",
        NextYear => "next_year",
    }
}

labelled_enum! {
    ForecastDirection, "forecast direction" {
        Income => "income",
        Expense => "expense",
    }
}

labelled_enum! {
    ForecastMethod, "forecast method" {
        MovingAverage => "moving_average",
        TrendAnalysis => "trend_analysis",
        PatternRecognition => "pattern_recognition",
        CategoryBased => "category_based",
        Combined => "combined",
        InsufficientData => "insufficient_data",
    }
}

/// Output of one estimator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub amount: Decimal,
    pub confidence: f64,
    pub method: ForecastMethod,
}

impl Estimate {
    fn insufficient() -> Self {
        Self {
            amount: Decimal::ZERO,
            confidence: 0.0,
            method: ForecastMethod::InsufficientData,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub direction: ForecastDirection,
    pub period: ForecastPeriod,
    pub amount: Decimal,
    pub confidence: f64,
    pub method: ForecastMethod,
    pub components: Vec<Estimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryForecast {
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastEngine {
    analyzer: TransactionAnalyzer,
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forecast(
        &self,
        transactions: &[Transaction],
        direction: ForecastDirection,
        period: ForecastPeriod,
    ) -> Forecast {
        self.forecast_at(transactions, direction, period, UtcDateTime::now())
    }

    /// Blended forecast over completed transactions of `direction`, with
    /// look-back windows measured from `now`.
    pub fn forecast_at(
        &self,
        transactions: &[Transaction],
        direction: ForecastDirection,
        period: ForecastPeriod,
        now: UtcDateTime,
    ) -> Forecast {
        let matching: Vec<&Transaction> = transactions
            .iter()
            .filter(|transaction| transaction.is_completed())
            .filter(|transaction| match direction {
                ForecastDirection::Income => transaction.is_income(),
                ForecastDirection::Expense => transaction.is_expense(),
            })
            .collect();

        if matching.is_empty() {
            return Forecast {
                direction,
                period,
                amount: Decimal::ZERO,
                confidence: 0.0,
                method: ForecastMethod::InsufficientData,
                components: Vec::new(),
            };
        }

        let components = vec![
            moving_average(&matching, now),
            trend(&matching, now),
            match direction {
                ForecastDirection::Income => pattern(&matching),
                ForecastDirection::Expense => self.category_based(&matching),
            },
        ];

        let count = components.len();
        let amount = components.iter().map(|estimate| estimate.amount).sum::<Decimal>()
            / Decimal::from(count);
        let confidence =
            components.iter().map(|estimate| estimate.confidence).sum::<f64>() / count as f64;

        Forecast {
            direction,
            period,
            amount,
            confidence,
            method: ForecastMethod::Combined,
            components,
        }
    }

    pub fn forecast_by_category(
        &self,
        transactions: &[Transaction],
        period: ForecastPeriod,
    ) -> Vec<CategoryForecast> {
        self.forecast_by_category_at(transactions, period, UtcDateTime::now())
    }

    /// Independent expense forecast per category. Uncategorised expenses
    /// are grouped under `other_expense`.
    pub fn forecast_by_category_at(
        &self,
        transactions: &[Transaction],
        period: ForecastPeriod,
        now: UtcDateTime,
    ) -> Vec<CategoryForecast> {
        let mut grouped: BTreeMap<TransactionCategory, Vec<Transaction>> = BTreeMap::new();
        for transaction in transactions.iter().filter(|transaction| transaction.is_expense()) {
            grouped
                .entry(transaction.category.unwrap_or(TransactionCategory::OtherExpense))
                .or_default()
                .push(transaction.clone());
        }

        grouped
            .into_iter()
            .map(|(category, group)| CategoryForecast {
                category,
                amount: self
                    .forecast_at(&group, ForecastDirection::Expense, period, now)
                    .amount,
                confidence: CATEGORY_FORECAST_CONFIDENCE,
            })
            .collect()
    }

    fn category_based(&self, transactions: &[&Transaction]) -> Estimate {
        let owned: Vec<Transaction> = transactions.iter().map(|t| (*t).clone()).collect();
        let top = self
            .analyzer
            .top_expense_categories(&owned, TOP_CATEGORY_LIMIT);
        if top.is_empty() {
            return Estimate::insufficient();
        }
        Estimate {
            amount: top.iter().map(|category| category.total).sum(),
            confidence: (top.len() as f64 / TOP_CATEGORY_LIMIT as f64).min(0.8),
            method: ForecastMethod::CategoryBased,
        }
    }
}

/// Magnitude totals per calendar month, oldest month first.
fn monthly_totals(transactions: &[&Transaction], since: UtcDateTime) -> Vec<Decimal> {
    let mut months: BTreeMap<UtcDateTime, Decimal> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| t.booked_at >= since) {
        *months
            .entry(transaction.booked_at.month_start())
            .or_insert(Decimal::ZERO) += transaction.magnitude();
    }
    months.into_values().collect()
}

fn moving_average(transactions: &[&Transaction], now: UtcDateTime) -> Estimate {
    let totals = monthly_totals(transactions, now.months_before(3));
    if totals.is_empty() {
        return Estimate::insufficient();
    }
    let months = totals.len();
    Estimate {
        amount: totals.iter().sum::<Decimal>() / Decimal::from(months),
        confidence: (months as f64 / 3.0).min(1.0),
        method: ForecastMethod::MovingAverage,
    }
}

/// Least squares over `(month_index, total)`, projected one month ahead.
fn trend(transactions: &[&Transaction], now: UtcDateTime) -> Estimate {
    let totals = monthly_totals(transactions, now.months_before(6));
    if totals.len() < 2 {
        return Estimate::insufficient();
    }

    let n = Decimal::from(totals.len());
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) =
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    for (index, total) in totals.iter().enumerate() {
        let x = Decimal::from(index);
        sum_x += x;
        sum_y += *total;
        sum_xy += x * *total;
        sum_x2 += x * x;
    }

    let slope = match (n * sum_xy - sum_x * sum_y).checked_div(n * sum_x2 - sum_x * sum_x) {
        Some(slope) => slope,
        None => return Estimate::insufficient(),
    };
    let intercept = (sum_y - slope * sum_x) / n;
    let projected = intercept + slope * n;

    Estimate {
        amount: projected.max(Decimal::ZERO),
        confidence: (totals.len() as f64 / 6.0).min(0.9),
        method: ForecastMethod::TrendAnalysis,
    }
}

fn pattern(transactions: &[&Transaction]) -> Estimate {
    let amounts: Vec<Decimal> = transactions
        .iter()
        .filter(|transaction| {
            let day = transaction.booked_at.day();
            day <= 5 || day >= 25
        })
        .map(|transaction| transaction.magnitude())
        .collect();
    if amounts.is_empty() {
        return Estimate::insufficient();
    }
    Estimate {
        amount: amounts.iter().sum::<Decimal>() / Decimal::from(amounts.len()),
        confidence: PATTERN_CONFIDENCE,
        method: ForecastMethod::PatternRecognition,
    }
}

/// Confidence as a rounded percentage, for display.
pub fn confidence_percent(confidence: f64) -> u8 {
    Decimal::try_from(confidence * 100.0)
        .ok()
        .and_then(|value| value.round().to_u8())
        .unwrap_or(0)
}
