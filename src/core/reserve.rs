use crate::core::context::PaymentContext;
use crate::core::error::{EngineResult, WaterfallError};
use crate::core::obligation::{AmountDue, Obligation, WaterfallKind};
use crate::distribution::accrual;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Balance a reserve's requirement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveBasis {
    /// Current period pool balance.
    PoolBalance,
    /// Sum of tranche balances at the end of the previous period.
    #[serde(rename = "last_period_total_tranche_balance")]
    AggregateTrancheBalance,
}

impl ReserveBasis {
    /// Method name used in deal documents.
    pub fn as_str(self) -> &'static str {
        match self {
            ReserveBasis::PoolBalance => "pool_balance",
            ReserveBasis::AggregateTrancheBalance => "last_period_total_tranche_balance",
        }
    }
}

impl fmt::Display for ReserveBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReserveBasis {
    type Err = WaterfallError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "pool_balance" => Ok(ReserveBasis::PoolBalance),
            "last_period_total_tranche_balance" => Ok(ReserveBasis::AggregateTrancheBalance),
            other => Err(WaterfallError::config(format!("invalid reserve method: {other}"))),
        }
    }
}

/// Per-period reserve funding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveRecord {
    /// 1-based period index.
    pub period: u32,
    /// Required reserve amount.
    pub amount_due: Decimal,
    /// Amount refilled, which becomes the new balance.
    pub amount_paid: Decimal,
    /// Shortfall against the requirement.
    pub amount_unpaid: Decimal,
}

/// Non-liquidity cash reserve.
///
/// The balance funded in one period is released in full into the next
/// period's revenue cash, and the revenue waterfall re-funds it up to the
/// required amount. The stored balance is overwritten by each refill,
/// never accumulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reserve {
    /// Unique reserve name.
    name: String,
    /// Required balance as a fraction of the basis.
    required_percentage: Decimal,
    /// Balance the requirement is measured against.
    basis: ReserveBasis,
    /// Cash held at closing.
    initial_balance: Decimal,
    /// Cash currently held.
    last_period_balance: Decimal,
    /// One record per refill.
    history: Vec<ReserveRecord>,
}

impl Reserve {
    /// Create a reserve. Fails on a negative percentage or balance.
    pub fn new(
        name: impl Into<String>,
        required_percentage: Decimal,
        basis: ReserveBasis,
        initial_balance: Decimal,
    ) -> EngineResult<Self> {
        let name = name.into();
        if required_percentage < Decimal::ZERO {
            return Err(WaterfallError::config(format!(
                "reserve {name}: required percentage cannot be negative"
            )));
        }
        if initial_balance < Decimal::ZERO {
            return Err(WaterfallError::config(format!(
                "reserve {name}: initial balance cannot be negative"
            )));
        }
        Ok(Self {
            name,
            required_percentage,
            basis,
            initial_balance,
            last_period_balance: initial_balance,
            history: Vec::new(),
        })
    }

    /// Required balance as a fraction of the basis.
    pub fn required_percentage(&self) -> Decimal {
        self.required_percentage
    }

    /// Balance the requirement is measured against.
    pub fn basis(&self) -> ReserveBasis {
        self.basis
    }

    /// Cash held at closing.
    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Cash currently held, released into the next period's revenue.
    pub fn last_period_balance(&self) -> Decimal {
        self.last_period_balance
    }

    /// Refill records, oldest first.
    pub fn history(&self) -> &[ReserveRecord] {
        &self.history
    }

    /// Empty the reserve once its balance has been swept into revenue.
    /// A refill limb later in the same period overwrites this.
    pub(crate) fn release(&mut self) {
        self.last_period_balance = Decimal::ZERO;
    }

    /// Target balance for the period in `ctx`.
    pub fn required_amount(&self, ctx: &PaymentContext) -> Decimal {
        let basis = match self.basis {
            ReserveBasis::PoolBalance => ctx.pool_balance(),
            ReserveBasis::AggregateTrancheBalance => ctx.prior_tranche_balance(),
        };
        accrual::reserve_required(self.required_percentage, basis)
    }
}

impl Obligation for Reserve {
    fn name(&self) -> &str {
        &self.name
    }

    fn amount_due(
        &self,
        ctx: &PaymentContext,
        _period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<Decimal> {
        match kind {
            WaterfallKind::Revenue => Ok(self.required_amount(ctx)),
            WaterfallKind::Redemption => Err(WaterfallError::config(format!(
                "reserve {} cannot be funded from the {kind} waterfall",
                self.name
            ))),
        }
    }

    fn update_history(&mut self, period: u32, _kind: WaterfallKind, outcome: &AmountDue) {
        self.history.push(ReserveRecord {
            period,
            amount_due: outcome.due,
            amount_paid: outcome.paid,
            amount_unpaid: outcome.unpaid,
        });
        self.last_period_balance = outcome.paid;
    }
}
