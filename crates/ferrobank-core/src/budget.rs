use std::sync::Arc;

use tracing::debug;

use crate::notification::NotificationSink;
use crate::repository::Repository;
use crate::{Budget, StorageError, Transaction, UtcDateTime};

/// Usage share at which a warning is raised for a budget not yet exceeded.
pub const BUDGET_WARNING_PERCENTAGE: f64 = 80.0;

/// Recomputes category spend for active budgets and raises alerts.
#[derive(Debug, Clone)]
pub struct BudgetRecalculator {
    repository: Arc<dyn Repository>,
    notifications: Arc<dyn NotificationSink>,
}

impl BudgetRecalculator {
    pub fn new(repository: Arc<dyn Repository>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Recomputes every budget whose end is not in the past and persists
    /// the new spend. Returns the updated budgets.
    pub fn recalculate_all(
        &self,
        transactions: &[Transaction],
        now: UtcDateTime,
    ) -> Result<Vec<Budget>, StorageError> {
        let mut updated = Vec::new();
        for budget in self.repository.budgets()? {
            if !budget.is_active_at(now) {
                continue;
            }
            let budget = self.apply(budget, transactions);
            self.repository.save_budget(&budget)?;
            updated.push(budget);
        }
        debug!(count = updated.len(), "budgets recalculated");
        Ok(updated)
    }

    /// Recomputes one budget in place and raises its alerts.
    pub fn apply(&self, mut budget: Budget, transactions: &[Transaction]) -> Budget {
        let in_period: Vec<&Transaction> = transactions
            .iter()
            .filter(|transaction| {
                transaction.is_expense()
                    && transaction.booked_at >= budget.start
                    && transaction.booked_at <= budget.end
            })
            .collect();

        for category in &mut budget.categories {
            category.spent = in_period
                .iter()
                .filter(|transaction| transaction.category == Some(category.category))
                .map(|transaction| transaction.magnitude())
                .sum();
        }

        self.raise_alerts(&budget);
        budget
    }

    fn raise_alerts(&self, budget: &Budget) {
        if budget.is_exceeded() {
            self.notifications
                .budget_exceeded(&budget.name, budget.total_spent() - budget.total_limit);
        } else if budget.usage_percentage() >= BUDGET_WARNING_PERCENTAGE {
            self.notifications
                .budget_warning(&budget.name, budget.usage_percentage());
        }

        for category in budget.categories.iter().filter(|category| category.is_exceeded()) {
            self.notifications
                .category_exceeded(category.category.as_str(), &budget.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::notification::{Notification, RecordingNotificationSink};
    use crate::repository::InMemoryRepository;
    use crate::{BudgetPeriod, TransactionCategory, TransactionStatus, TransactionType};

    fn food(id: &str, amount: i64, day: &str) -> Transaction {
        Transaction::new(
            id,
            "acc",
            "bank",
            Decimal::from(amount),
            "RUB",
            UtcDateTime::parse(day).expect("date"),
            TransactionType::Expense,
            TransactionStatus::Completed,
        )
        .with_category(TransactionCategory::Food)
    }

    fn setup() -> (BudgetRecalculator, Arc<InMemoryRepository>, Arc<RecordingNotificationSink>) {
        let repository = Arc::new(InMemoryRepository::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        (
            BudgetRecalculator::new(repository.clone(), sink.clone()),
            repository,
            sink,
        )
    }

    #[test]
    fn exceeded_budget_notifies_budget_and_category() {
        let (recalculator, repository, sink) = setup();
        let now = UtcDateTime::parse("2024-02-14T00:00:00Z").expect("now");
        let budget = Budget::new("February", Decimal::from(1000), BudgetPeriod::Monthly, now)
            .with_category(TransactionCategory::Food, Decimal::from(1000));
        repository.save_budget(&budget).expect("save");

        let transactions = vec![
            food("t1", 700, "2024-02-03"),
            food("t2", 500, "2024-02-10"),
            food("t3", 9000, "2024-01-20"),
        ];
        let updated = recalculator.recalculate_all(&transactions, now).expect("recalc");

        assert_eq!(updated[0].categories[0].spent, Decimal::from(1200));
        assert_eq!(
            sink.notifications(),
            vec![
                Notification::BudgetExceeded {
                    budget: String::from("February"),
                    exceeded_by: Decimal::from(200),
                },
                Notification::CategoryExceeded {
                    category: String::from("food"),
                    budget: String::from("February"),
                },
            ]
        );
        assert_eq!(repository.budgets().expect("budgets")[0].total_spent(), Decimal::from(1200));
    }

    #[test]
    fn high_usage_warns_without_exceeding() {
        let (recalculator, _, sink) = setup();
        let now = UtcDateTime::parse("2024-02-14T00:00:00Z").expect("now");
        let budget = Budget::new("Food", Decimal::from(1000), BudgetPeriod::Monthly, now)
            .with_category(TransactionCategory::Food, Decimal::from(1000));

        recalculator.apply(budget, &[food("t1", 850, "2024-02-02")]);

        assert!(matches!(
            sink.notifications().as_slice(),
            [Notification::BudgetWarning { .. }]
        ));
    }

    #[test]
    fn expired_budgets_are_left_alone() {
        let (recalculator, repository, _) = setup();
        let created = UtcDateTime::parse("2023-01-10T00:00:00Z").expect("created");
        let budget = Budget::new("Old", Decimal::from(10), BudgetPeriod::Monthly, created)
            .with_category(TransactionCategory::Food, Decimal::from(10));
        repository.save_budget(&budget).expect("save");

        let now = UtcDateTime::parse("2024-02-14T00:00:00Z").expect("now");
        let updated = recalculator
            .recalculate_all(&[food("t1", 500, "2023-01-12")], now)
            .expect("recalc");

        assert!(updated.is_empty());
        assert_eq!(repository.budgets().expect("budgets")[0].total_spent(), Decimal::ZERO);
    }
}
