use crate::core::context::PaymentContext;
use crate::core::error::{EngineResult, WaterfallError};
use crate::core::frequency::PaymentFrequency;
use crate::core::obligation::{AmountDue, Obligation, WaterfallKind};
use crate::distribution::accrual;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a fee's amount is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum FeeConfig {
    /// A flat amount per period (or per year when annualized).
    DollarAmount(Decimal),
    /// A fraction of the pool balance, e.g. `0.01` for 1%.
    Percentage(Decimal),
}

impl FeeConfig {
    /// Build from the `type` tag used in deal documents.
    pub fn from_parts(fee_type: &str, amount: Decimal) -> EngineResult<Self> {
        match fee_type {
            "dollar_amount" => Ok(FeeConfig::DollarAmount(amount)),
            "percentage" => Ok(FeeConfig::Percentage(amount)),
            other => Err(WaterfallError::config(format!(
                "invalid fee config type: {other}"
            ))),
        }
    }
}

/// Per-period fee payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    /// 1-based period index.
    pub period: u32,
    /// Scheduled amount for the period.
    pub amount_due: Decimal,
    /// Amount the revenue waterfall paid.
    pub amount_paid: Decimal,
    /// Shortfall, recorded but not carried forward.
    pub amount_unpaid: Decimal,
}

/// A servicing, trustee or issuer-profit fee paid from revenue.
///
/// Fees carry no principal and no arrears: an unpaid amount is recorded in
/// the totals but does not increase the next period's claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fee {
    /// Unique fee name.
    name: String,
    /// Flat or pool-percentage amount.
    config: FeeConfig,
    /// Payment frequency, used to split annual amounts.
    frequency: PaymentFrequency,
    /// Whether `config` is an annual figure.
    annual: bool,
    /// Periods the fee is restricted to; `None` means every period.
    payment_periods: Option<BTreeSet<u32>>,

    /// Amount due in the last committed period.
    last_period_due: Decimal,
    /// Amount paid in the last committed period.
    last_period_paid: Decimal,
    /// Shortfall of the last committed period.
    last_period_unpaid: Decimal,
    /// Cumulative amount paid.
    total_paid: Decimal,
    /// Cumulative shortfall.
    total_unpaid: Decimal,
    /// One record per committed period.
    history: Vec<FeeRecord>,
}

impl Fee {
    /// Create a fee due every period.
    pub fn new(name: impl Into<String>, config: FeeConfig, frequency: PaymentFrequency) -> Self {
        Self {
            name: name.into(),
            config,
            frequency,
            annual: false,
            payment_periods: None,
            last_period_due: Decimal::ZERO,
            last_period_paid: Decimal::ZERO,
            last_period_unpaid: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            total_unpaid: Decimal::ZERO,
            history: Vec::new(),
        }
    }

    /// The configured amount is an annual figure, split across the year's
    /// periods.
    pub fn annualized(mut self) -> Self {
        self.annual = true;
        self
    }

    /// Restrict the fee to the listed periods.
    /// An empty list leaves it unrestricted.
    pub fn with_payment_periods(mut self, periods: impl IntoIterator<Item = u32>) -> Self {
        let periods: BTreeSet<u32> = periods.into_iter().collect();
        self.payment_periods = if periods.is_empty() { None } else { Some(periods) };
        self
    }

    /// Flat or pool-percentage amount.
    pub fn config(&self) -> FeeConfig {
        self.config
    }

    /// Payment frequency.
    pub fn frequency(&self) -> PaymentFrequency {
        self.frequency
    }

    /// Whether the configured amount is annual.
    pub fn is_annual(&self) -> bool {
        self.annual
    }

    /// Periods the fee is restricted to, if any.
    pub fn payment_periods(&self) -> Option<&BTreeSet<u32>> {
        self.payment_periods.as_ref()
    }

    /// Whether the fee falls due in `period`.
    pub fn is_payable(&self, period: u32) -> bool {
        self.payment_periods
            .as_ref()
            .map_or(true, |periods| periods.contains(&period))
    }

    /// Amount due for a pool balance and period.
    pub fn scheduled_amount(&self, pool_balance: Decimal, period: u32) -> Decimal {
        if !self.is_payable(period) {
            return Decimal::ZERO;
        }
        accrual::fee_due(self.config, pool_balance, self.frequency, self.annual)
    }

    /// Amount due in the last committed period.
    pub fn last_period_due(&self) -> Decimal {
        self.last_period_due
    }

    /// Amount paid in the last committed period.
    pub fn last_period_paid(&self) -> Decimal {
        self.last_period_paid
    }

    /// Shortfall of the last committed period.
    pub fn last_period_unpaid(&self) -> Decimal {
        self.last_period_unpaid
    }

    /// Cumulative amount paid.
    pub fn total_paid(&self) -> Decimal {
        self.total_paid
    }

    /// Cumulative shortfall.
    pub fn total_unpaid(&self) -> Decimal {
        self.total_unpaid
    }

    /// Payment records, oldest first.
    pub fn history(&self) -> &[FeeRecord] {
        &self.history
    }
}

impl Obligation for Fee {
    fn name(&self) -> &str {
        &self.name
    }

    fn amount_due(
        &self,
        ctx: &PaymentContext,
        period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<Decimal> {
        match kind {
            WaterfallKind::Revenue => Ok(self.scheduled_amount(ctx.pool_balance(), period)),
            WaterfallKind::Redemption => Err(WaterfallError::config(format!(
                "fee {} cannot be paid from the {kind} waterfall",
                self.name
            ))),
        }
    }

    fn update_history(&mut self, period: u32, _kind: WaterfallKind, outcome: &AmountDue) {
        self.history.push(FeeRecord {
            period,
            amount_due: outcome.due,
            amount_paid: outcome.paid,
            amount_unpaid: outcome.unpaid,
        });
        self.last_period_due = outcome.due;
        self.last_period_paid = outcome.paid;
        self.last_period_unpaid = outcome.unpaid;
        self.total_paid += outcome.paid;
        self.total_unpaid += outcome.unpaid;
    }
}
