use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::first_of_month;
use crate::{TransactionCategory, UtcDateTime};

labelled_enum! {
    BudgetPeriod, "budget period" {
        Weekly => "weekly",
        Monthly => "monthly",
        Quarterly => "quarterly",
        Yearly => "yearly",
        Custom => "custom",
    }
}

impl BudgetPeriod {
    /// Inclusive `[start, end]` range of the period containing `now`.
    /// Weeks start on Monday; `Custom` spans one month from `now`.
    pub fn range(self, now: UtcDateTime) -> (UtcDateTime, UtcDateTime) {
        let today = now.date();
        match self {
            Self::Weekly => {
                let offset = i64::from(today.weekday().number_days_from_monday());
                let start = today - time::Duration::days(offset);
                let end = start + time::Duration::days(6);
                (UtcDateTime::from_date(start), UtcDateTime::end_of_day(end))
            }
            Self::Monthly => {
                let start = UtcDateTime::from_date(first_of_month(today.year(), today.month()));
                let end = start.months_after(1).date() - time::Duration::days(1);
                (start, UtcDateTime::end_of_day(end))
            }
            Self::Quarterly => {
                let quarter_start_month = ((today.month() as u8 - 1) / 3) * 3 + 1;
                let month = time::Month::try_from(quarter_start_month).unwrap_or(time::Month::January);
                let start = UtcDateTime::from_date(first_of_month(today.year(), month));
                let end = start.months_after(3).date() - time::Duration::days(1);
                (start, UtcDateTime::end_of_day(end))
            }
            Self::Yearly => {
                let start = UtcDateTime::from_date(first_of_month(today.year(), time::Month::January));
                let end = start.months_after(12).date() - time::Duration::days(1);
                (start, UtcDateTime::end_of_day(end))
            }
            Self::Custom => (now, now.months_after(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub category: TransactionCategory,
    pub limit: Decimal,
    pub spent: Decimal,
}

impl BudgetCategory {
    pub fn new(category: TransactionCategory, limit: Decimal) -> Self {
        Self {
            category,
            limit,
            spent: Decimal::ZERO,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.spent > self.limit
    }
}

/// Spending plan over a period with per-category limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub budget_id: String,
    pub name: String,
    pub period: BudgetPeriod,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub total_limit: Decimal,
    pub categories: Vec<BudgetCategory>,
    pub created_at: UtcDateTime,
}

impl Budget {
    pub fn new(
        name: impl Into<String>,
        total_limit: Decimal,
        period: BudgetPeriod,
        now: UtcDateTime,
    ) -> Self {
        let (start, end) = period.range(now);
        Self {
            budget_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            period,
            start,
            end,
            total_limit,
            categories: Vec::new(),
            created_at: now,
        }
    }

    pub fn with_category(mut self, category: TransactionCategory, limit: Decimal) -> Self {
        self.categories.push(BudgetCategory::new(category, limit));
        self
    }

    pub fn total_spent(&self) -> Decimal {
        self.categories.iter().map(|category| category.spent).sum()
    }

    /// Spent share of the total limit in percent; zero when no limit is set.
    pub fn usage_percentage(&self) -> f64 {
        if self.total_limit <= Decimal::ZERO {
            return 0.0;
        }
        (self.total_spent() / self.total_limit * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0)
    }

    pub fn is_exceeded(&self) -> bool {
        self.total_spent() > self.total_limit
    }

    pub fn remaining(&self) -> Decimal {
        (self.total_limit - self.total_spent()).max(Decimal::ZERO)
    }

    pub fn is_active_at(&self, now: UtcDateTime) -> bool {
        self.end >= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_range_covers_the_whole_calendar_month() {
        let now = UtcDateTime::parse("2024-02-14T09:00:00Z").expect("valid");
        let (start, end) = BudgetPeriod::Monthly.range(now);
        assert_eq!(start.format_rfc3339(), "2024-02-01T00:00:00Z");
        assert_eq!(end.format_rfc3339(), "2024-02-29T23:59:59Z");
    }

    #[test]
    fn weekly_range_starts_on_monday() {
        let wednesday = UtcDateTime::parse("2024-01-10T12:00:00Z").expect("valid");
        let (start, end) = BudgetPeriod::Weekly.range(wednesday);
        assert_eq!(start.format_rfc3339(), "2024-01-08T00:00:00Z");
        assert_eq!(end.format_rfc3339(), "2024-01-14T23:59:59Z");
    }

    #[test]
    fn quarterly_range_aligns_to_quarter() {
        let now = UtcDateTime::parse("2024-05-20T00:00:00Z").expect("valid");
        let (start, end) = BudgetPeriod::Quarterly.range(now);
        assert_eq!(start.format_rfc3339(), "2024-04-01T00:00:00Z");
        assert_eq!(end.format_rfc3339(), "2024-06-30T23:59:59Z");
    }

    #[test]
    fn usage_and_remaining_follow_category_spend() {
        let now = UtcDateTime::parse("2024-02-14T09:00:00Z").expect("valid");
        let mut budget = Budget::new("Groceries", Decimal::new(1000, 0), BudgetPeriod::Monthly, now)
            .with_category(TransactionCategory::Food, Decimal::new(600, 0));
        budget.categories[0].spent = Decimal::new(850, 0);

        assert!((budget.usage_percentage() - 85.0).abs() < f64::EPSILON);
        assert!(!budget.is_exceeded());
        assert!(budget.categories[0].is_exceeded());
        assert_eq!(budget.remaining(), Decimal::new(150, 0));
    }
}
