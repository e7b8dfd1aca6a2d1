use crate::core::context::PaymentContext;
use crate::core::error::{EngineResult, WaterfallError};
use crate::core::frequency::PaymentFrequency;
use crate::core::obligation::{AmountDue, Obligation, WaterfallKind};
use crate::distribution::accrual::{self, InterestBreakdown, StepUp};
use crate::distribution::allocation::RepaymentStructure;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How unpaid interest is treated in the following period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrearsPolicy {
    /// Report zero arrears instead of carrying unpaid interest forward.
    /// The cumulative unpaid counter keeps growing either way.
    pub write_off_unpaid: bool,
    /// Charge interest on carried arrears.
    pub accrue_on_arrears: bool,
}

impl Default for ArrearsPolicy {
    fn default() -> Self {
        Self {
            write_off_unpaid: false,
            accrue_on_arrears: true,
        }
    }
}

/// Interest event recorded for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRecord {
    /// 1-based period index.
    pub period: u32,
    /// Interest on the opening balance.
    pub current_interest_due: Decimal,
    /// Unpaid interest carried in from the prior period.
    pub arrears: Decimal,
    /// Interest charged on the carried arrears.
    pub interest_on_arrears: Decimal,
    /// Sum of the three components above.
    pub total_interest_due: Decimal,
    /// Interest paid by the revenue waterfall.
    pub paid: Decimal,
    /// Shortfall left after payment.
    pub unpaid: Decimal,
}

/// Principal event recorded for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// 1-based period index.
    pub period: u32,
    /// Balance outstanding before the period's redemption.
    pub opening_balance: Decimal,
    /// Allocated principal target, capped at the opening balance.
    pub principal_due: Decimal,
    /// Principal paid by the redemption waterfall.
    pub repaid: Decimal,
    /// Balance outstanding after the period's redemption.
    pub ending_balance: Decimal,
}

/// A debt tranche: a slice of the capital structure with its own balance,
/// coupon and arrears rules.
///
/// The same tranche sits in both waterfalls: its interest leg in the
/// revenue waterfall and its principal leg in the redemption waterfall.
///
/// # Examples
///
/// ```
/// use waterfall_engine::core::tranche::Tranche;
/// use waterfall_engine::core::frequency::PaymentFrequency;
/// use rust_decimal_macros::dec;
///
/// let a = Tranche::new("A", dec!(100_000_000), dec!(0), dec!(0.011), PaymentFrequency::Quarterly)
///     .unwrap();
/// assert_eq!(a.current_interest_due(1), dec!(275_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tranche {
    /// Unique tranche name, e.g. "A".
    name: String,
    /// Principal at closing.
    initial_balance: Decimal,
    /// Annual base rate.
    reference_rate: Decimal,
    /// Annual spread over the reference rate.
    margin: Decimal,
    /// Margin replacing `margin` from a given period.
    step_up: Option<StepUp>,
    /// Coupon frequency.
    frequency: PaymentFrequency,
    /// Treatment of unpaid interest.
    arrears_policy: ArrearsPolicy,
    /// Tranche-level repayment hint.
    repayment_structure: RepaymentStructure,

    /// Principal outstanding after the last committed period.
    last_period_ending_balance: Decimal,
    /// Total interest due in the last committed period.
    last_period_due_interest: Decimal,
    /// Interest paid in the last committed period.
    last_period_paid_interest: Decimal,
    /// Interest shortfall of the last committed period.
    last_period_unpaid_interest: Decimal,
    /// Principal repaid in the last committed period.
    last_period_paid_principal: Decimal,
    /// Cumulative interest paid.
    total_paid_interest: Decimal,
    /// Cumulative interest shortfall, including written-off amounts.
    total_unpaid_interest: Decimal,
    /// Cumulative principal repaid.
    total_paid_principal: Decimal,
    /// One record per committed period.
    history_interest: Vec<InterestRecord>,
    /// One record per committed period.
    history_principal: Vec<PrincipalRecord>,
}

impl Tranche {
    /// Create a tranche. Fails if `initial_balance` is negative.
    pub fn new(
        name: impl Into<String>,
        initial_balance: Decimal,
        reference_rate: Decimal,
        margin: Decimal,
        frequency: PaymentFrequency,
    ) -> EngineResult<Self> {
        let name = name.into();
        if initial_balance < Decimal::ZERO {
            return Err(WaterfallError::config(format!(
                "tranche {name}: balance cannot be negative, got {initial_balance}"
            )));
        }
        Ok(Self {
            name,
            initial_balance,
            reference_rate,
            margin,
            step_up: None,
            frequency,
            arrears_policy: ArrearsPolicy::default(),
            repayment_structure: RepaymentStructure::Sequential,
            last_period_ending_balance: initial_balance,
            last_period_due_interest: Decimal::ZERO,
            last_period_paid_interest: Decimal::ZERO,
            last_period_unpaid_interest: Decimal::ZERO,
            last_period_paid_principal: Decimal::ZERO,
            total_paid_interest: Decimal::ZERO,
            total_unpaid_interest: Decimal::ZERO,
            total_paid_principal: Decimal::ZERO,
            history_interest: Vec::new(),
            history_principal: Vec::new(),
        })
    }

    /// Replace the margin with `margin` from `period` onwards.
    pub fn with_step_up(mut self, margin: Decimal, period: u32) -> Self {
        self.step_up = Some(StepUp { margin, period });
        self
    }

    /// Replace the default arrears policy.
    pub fn with_arrears_policy(mut self, policy: ArrearsPolicy) -> Self {
        self.arrears_policy = policy;
        self
    }

    /// Record the tranche-level repayment hint.
    /// The deal's structure drives allocation.
    pub fn with_repayment_structure(mut self, structure: RepaymentStructure) -> Self {
        self.repayment_structure = structure;
        self
    }

    // --- Accessors ---

    /// Principal at closing.
    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Annual base rate.
    pub fn reference_rate(&self) -> Decimal {
        self.reference_rate
    }

    /// Margin before any step-up.
    pub fn margin(&self) -> Decimal {
        self.margin
    }

    /// Step-up margin and its first period, if any.
    pub fn step_up(&self) -> Option<StepUp> {
        self.step_up
    }

    /// Coupon frequency.
    pub fn frequency(&self) -> PaymentFrequency {
        self.frequency
    }

    /// Treatment of unpaid interest.
    pub fn arrears_policy(&self) -> ArrearsPolicy {
        self.arrears_policy
    }

    /// Tranche-level repayment hint.
    pub fn repayment_structure(&self) -> RepaymentStructure {
        self.repayment_structure
    }

    /// Principal outstanding after the last committed period.
    pub fn last_period_ending_balance(&self) -> Decimal {
        self.last_period_ending_balance
    }

    /// Total interest due in the last committed period.
    pub fn last_period_due_interest(&self) -> Decimal {
        self.last_period_due_interest
    }

    /// Interest paid in the last committed period.
    pub fn last_period_paid_interest(&self) -> Decimal {
        self.last_period_paid_interest
    }

    /// Arrears carried into the next period: zero under a write-off policy.
    pub fn last_period_unpaid_interest(&self) -> Decimal {
        if self.arrears_policy.write_off_unpaid {
            Decimal::ZERO
        } else {
            self.last_period_unpaid_interest
        }
    }

    /// Principal repaid in the last committed period.
    pub fn last_period_paid_principal(&self) -> Decimal {
        self.last_period_paid_principal
    }

    /// Cumulative interest paid.
    pub fn total_paid_interest(&self) -> Decimal {
        self.total_paid_interest
    }

    /// Cumulative interest shortfall, including written-off amounts.
    pub fn total_unpaid_interest(&self) -> Decimal {
        self.total_unpaid_interest
    }

    /// Cumulative principal repaid.
    pub fn total_paid_principal(&self) -> Decimal {
        self.total_paid_principal
    }

    /// Interest records, oldest first.
    pub fn history_interest(&self) -> &[InterestRecord] {
        &self.history_interest
    }

    /// Principal records, oldest first.
    pub fn history_principal(&self) -> &[PrincipalRecord] {
        &self.history_principal
    }

    // --- Accrual ---

    /// Margin in force for `period`, after any step-up.
    pub fn applicable_margin(&self, period: u32) -> Decimal {
        accrual::applicable_margin(self.margin, self.step_up, period)
    }

    /// Reference rate plus the applicable margin.
    pub fn all_in_rate(&self, period: u32) -> Decimal {
        self.reference_rate + self.applicable_margin(period)
    }

    /// Interest on the opening balance only.
    pub fn current_interest_due(&self, period: u32) -> Decimal {
        accrual::periodic_interest(
            self.last_period_ending_balance,
            self.all_in_rate(period),
            self.frequency,
        )
    }

    /// Current interest, arrears and interest on arrears for `period`.
    pub fn interest_breakdown(&self, period: u32) -> InterestBreakdown {
        accrual::interest_due(
            self.last_period_ending_balance,
            self.all_in_rate(period),
            self.frequency,
            self.last_period_unpaid_interest(),
            self.arrears_policy.accrue_on_arrears,
        )
    }

    /// Everything the interest limb owes for `period`.
    pub fn total_interest_due(&self, period: u32) -> Decimal {
        self.interest_breakdown(period).total()
    }

    /// Allocated principal target, capped at the outstanding balance.
    pub fn principal_due(&self, ctx: &PaymentContext) -> Decimal {
        ctx.principal_allocation(&self.name)
            .unwrap_or(Decimal::ZERO)
            .min(self.last_period_ending_balance)
            .max(Decimal::ZERO)
    }

    fn record_interest(&mut self, period: u32, outcome: &AmountDue) {
        let breakdown = self.interest_breakdown(period);
        self.history_interest.push(InterestRecord {
            period,
            current_interest_due: breakdown.current,
            arrears: breakdown.arrears,
            interest_on_arrears: breakdown.interest_on_arrears,
            total_interest_due: outcome.due,
            paid: outcome.paid,
            unpaid: outcome.unpaid,
        });
        self.last_period_due_interest = outcome.due;
        self.last_period_paid_interest = outcome.paid;
        self.last_period_unpaid_interest = outcome.unpaid;
        self.total_paid_interest += outcome.paid;
        self.total_unpaid_interest += outcome.unpaid;
    }

    fn record_principal(&mut self, period: u32, outcome: &AmountDue) {
        let opening = self.last_period_ending_balance;
        let ending = outcome.unpaid;
        self.history_principal.push(PrincipalRecord {
            period,
            opening_balance: opening,
            principal_due: outcome.due,
            repaid: outcome.paid,
            ending_balance: ending,
        });
        self.last_period_paid_principal = outcome.paid;
        self.total_paid_principal += outcome.paid;
        self.last_period_ending_balance = ending;
    }
}

impl Obligation for Tranche {
    fn name(&self) -> &str {
        &self.name
    }

    fn amount_due(
        &self,
        ctx: &PaymentContext,
        period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<Decimal> {
        Ok(match kind {
            WaterfallKind::Revenue => self.total_interest_due(period),
            WaterfallKind::Redemption => self.principal_due(ctx),
        })
    }

    /// The principal leg reports the post-payment balance as unpaid.
    fn apply_amount_due(
        &self,
        ctx: &PaymentContext,
        period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<AmountDue> {
        let due = self.amount_due(ctx, period, kind)?;
        let available = ctx.available_cash(kind);
        Ok(match kind {
            WaterfallKind::Revenue => AmountDue::settle(due, available),
            WaterfallKind::Redemption => {
                AmountDue::redeem(due, available, self.last_period_ending_balance)
            }
        })
    }

    fn update_history(&mut self, period: u32, kind: WaterfallKind, outcome: &AmountDue) {
        match kind {
            WaterfallKind::Revenue => self.record_interest(period, outcome),
            WaterfallKind::Redemption => self.record_principal(period, outcome),
        }
    }
}
