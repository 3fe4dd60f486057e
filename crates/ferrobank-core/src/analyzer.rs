//! Read-side transaction analytics: keyword categorisation, category totals
//! and anomaly detection. All aggregation runs on amount magnitudes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::{Transaction, TransactionCategory};

const KEYWORD_RULES: &[(TransactionCategory, &[&str])] = &[
    (TransactionCategory::Salary, &["зарплата", "salary", "зп"]),
    (TransactionCategory::Bonus, &["премия", "bonus"]),
    (
        TransactionCategory::Food,
        &[
            "магазин", "store", "супермаркет", "supermarket", "продукты", "еда", "кафе",
            "ресторан", "restaurant", "cafe",
        ],
    ),
    (
        TransactionCategory::Transport,
        &[
            "транспорт", "transport", "метро", "metro", "автобус", "bus", "такси", "taxi",
            "uber", "яндекс.такси",
        ],
    ),
    (
        TransactionCategory::Utilities,
        &[
            "коммунальные", "utilities", "жкх", "электричество", "газ", "вода", "electricity",
            "gas", "water",
        ],
    ),
    (
        TransactionCategory::Shopping,
        &["покупка", "shopping", "интернет-магазин"],
    ),
    (
        TransactionCategory::Entertainment,
        &["кино", "movie", "театр", "theater", "развлечения", "entertainment", "игра", "game"],
    ),
    (
        TransactionCategory::Health,
        &[
            "больница", "hospital", "клиника", "clinic", "врач", "doctor", "аптека", "pharmacy",
            "медицина",
        ],
    ),
    (
        TransactionCategory::Education,
        &["образование", "education", "курс", "course", "школа", "school", "университет", "university"],
    ),
    (
        TransactionCategory::Subscriptions,
        &["подписка", "subscription", "netflix", "spotify", "яндекс.плюс", "youtube"],
    ),
    (
        TransactionCategory::Bills,
        &["счет", "bill", "платеж", "payment"],
    ),
];

/// Total and count of expenses in one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: TransactionCategory,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionAnalyzer;

impl TransactionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Category inferred from description and merchant text. Rules are
    /// checked in order; the first keyword hit wins. Without a hit the
    /// transaction falls back to the generic income/expense bucket, and
    /// transfers stay uncategorised.
    pub fn categorize(&self, transaction: &Transaction) -> Option<TransactionCategory> {
        let text = [
            transaction.description.as_deref(),
            transaction.merchant_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

        if !text.is_empty() {
            let hit = KEYWORD_RULES.iter().find(|(_, keywords)| {
                keywords.iter().any(|keyword| text.contains(keyword))
            });
            if let Some((category, _)) = hit {
                return Some(*category);
            }
        }

        if transaction.is_income() {
            Some(TransactionCategory::OtherIncome)
        } else if transaction.is_expense() {
            Some(TransactionCategory::OtherExpense)
        } else {
            None
        }
    }

    /// Fills in a category only when the provider supplied none.
    pub fn categorize_if_missing(&self, mut transaction: Transaction) -> Transaction {
        if transaction.category.is_none() {
            transaction.category = self.categorize(&transaction);
        }
        transaction
    }

    /// Expense magnitude per category; uncategorised expenses are skipped.
    pub fn expense_by_category(
        &self,
        transactions: &[Transaction],
    ) -> BTreeMap<TransactionCategory, Decimal> {
        self.category_totals(transactions)
            .into_iter()
            .map(|(category, (total, _))| (category, total))
            .collect()
    }

    /// Highest-spend expense categories, descending by total.
    pub fn top_expense_categories(
        &self,
        transactions: &[Transaction],
        limit: usize,
    ) -> Vec<CategoryTotal> {
        let mut totals: Vec<CategoryTotal> = self
            .category_totals(transactions)
            .into_iter()
            .map(|(category, (total, count))| CategoryTotal {
                category,
                total,
                count,
            })
            .collect();
        totals.sort_by(|left, right| right.total.cmp(&left.total));
        totals.truncate(limit);
        totals
    }

    /// Expenses above three times the mean expense. Needs more than five
    /// expenses to say anything.
    pub fn detect_anomalies<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        let expenses: Vec<&Transaction> = transactions
            .iter()
            .filter(|transaction| transaction.is_expense())
            .collect();
        if expenses.len() <= 5 {
            return Vec::new();
        }

        let sum: Decimal = expenses.iter().map(|transaction| transaction.magnitude()).sum();
        let threshold = sum / Decimal::from(expenses.len()) * Decimal::from(3);
        expenses
            .into_iter()
            .filter(|transaction| transaction.magnitude() > threshold)
            .collect()
    }

    pub fn total_for_category(
        &self,
        transactions: &[Transaction],
        category: TransactionCategory,
    ) -> Decimal {
        transactions
            .iter()
            .filter(|transaction| transaction.category == Some(category))
            .map(Transaction::magnitude)
            .sum()
    }

    pub fn is_large(&self, transaction: &Transaction, threshold: Decimal) -> bool {
        transaction.magnitude() >= threshold
    }

    fn category_totals(
        &self,
        transactions: &[Transaction],
    ) -> BTreeMap<TransactionCategory, (Decimal, usize)> {
        let mut totals: BTreeMap<TransactionCategory, (Decimal, usize)> = BTreeMap::new();
        for transaction in transactions.iter().filter(|t| t.is_expense()) {
            let Some(category) = transaction.category else {
                continue;
            };
            let entry = totals.entry(category).or_insert((Decimal::ZERO, 0));
            entry.0 += transaction.magnitude();
            entry.1 += 1;
        }
        totals
    }
}
