use crate::core::context::PaymentContext;
use crate::core::error::{EngineResult, WaterfallError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The cash pool a waterfall distributes.
///
/// Revenue collections pay fees, reserve top-ups and tranche interest;
/// redemption collections pay tranche principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterfallKind {
    /// Interest collections: fees, reserve top-ups and tranche interest.
    Revenue,
    /// Principal collections: tranche principal only.
    Redemption,
}

impl WaterfallKind {
    /// Key of the synthetic residual entry appended after the last limb.
    pub fn residual_label(self) -> &'static str {
        match self {
            WaterfallKind::Revenue => "excess_spread",
            WaterfallKind::Redemption => "surplus",
        }
    }

    /// Lowercase name used in configuration files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            WaterfallKind::Revenue => "revenue",
            WaterfallKind::Redemption => "redemption",
        }
    }
}

impl fmt::Display for WaterfallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WaterfallKind {
    type Err = WaterfallError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "revenue" => Ok(WaterfallKind::Revenue),
            "redemption" => Ok(WaterfallKind::Redemption),
            other => Err(WaterfallError::config(format!(
                "unknown waterfall kind: {other}"
            ))),
        }
    }
}

/// The due/paid/unpaid triple an obligation reports for one period.
///
/// `0 <= paid <= due` always holds. Revenue limbs also keep
/// `paid + unpaid == due`; a tranche principal limb reports the balance
/// still outstanding after `paid` as its `unpaid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountDue {
    /// Amount owed this period.
    pub due: Decimal,
    /// Amount the pool could pay.
    pub paid: Decimal,
    /// Amount left owing after `paid`.
    pub unpaid: Decimal,
}

impl AmountDue {
    /// Pay as much of `due` as `available` allows.
    pub fn settle(due: Decimal, available: Decimal) -> Self {
        let paid = due.min(available.max(Decimal::ZERO)).max(Decimal::ZERO);
        Self {
            due,
            paid,
            unpaid: due - paid,
        }
    }

    /// Pay as much of `due` as `available` allows, reporting what remains of
    /// `outstanding` as unpaid.
    pub fn redeem(due: Decimal, available: Decimal, outstanding: Decimal) -> Self {
        let paid = Self::settle(due, available).paid;
        Self {
            due,
            paid,
            unpaid: (outstanding - paid).max(Decimal::ZERO),
        }
    }

    /// True when nothing is left owing.
    pub fn is_fully_paid(&self) -> bool {
        self.unpaid <= Decimal::ZERO
    }
}

/// A named claim on one of the deal's cash pools.
///
/// Implementors report what they are owed and how much of it the current
/// context can pay without touching their own state. State only changes in
/// [`Obligation::update_history`], which the orchestrator calls once per
/// period after every limb of both waterfalls has been evaluated.
pub trait Obligation {
    /// Unique name of the entity within its deal.
    fn name(&self) -> &str;

    /// Amount owed this period. Must be a pure read of `self` and `ctx`.
    fn amount_due(
        &self,
        ctx: &PaymentContext,
        period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<Decimal>;

    /// Evaluate the limb against the cash currently available in `kind`'s pool.
    fn apply_amount_due(
        &self,
        ctx: &PaymentContext,
        period: u32,
        kind: WaterfallKind,
    ) -> EngineResult<AmountDue> {
        let due = self.amount_due(ctx, period, kind)?;
        Ok(AmountDue::settle(due, ctx.available_cash(kind)))
    }

    /// Fold a settled amount back into history, totals and last-period trackers.
    fn update_history(&mut self, period: u32, kind: WaterfallKind, outcome: &AmountDue);
}

/// Reference from a waterfall limb to the deal entity it pays.
///
/// Limbs point at entities by name so that the deal owns every tranche, fee
/// and reserve exactly once while both waterfalls can refer to them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "limb", content = "target", rename_all = "snake_case")]
pub enum LimbRef {
    /// A senior or junior fee, paid from revenue.
    Fee(String),
    /// A tranche's interest leg, paid from revenue.
    TrancheInterest(String),
    /// A tranche's principal leg, paid from redemption.
    TranchePrincipal(String),
    /// The reserve refill, paid from revenue.
    Reserve(String),
}

impl LimbRef {
    /// Limb paying the named fee.
    pub fn fee(name: impl Into<String>) -> Self {
        LimbRef::Fee(name.into())
    }

    /// Limb paying the named tranche's interest.
    pub fn tranche_interest(name: impl Into<String>) -> Self {
        LimbRef::TrancheInterest(name.into())
    }

    /// Limb paying the named tranche's principal.
    pub fn tranche_principal(name: impl Into<String>) -> Self {
        LimbRef::TranchePrincipal(name.into())
    }

    /// Limb refilling the named reserve.
    pub fn reserve(name: impl Into<String>) -> Self {
        LimbRef::Reserve(name.into())
    }

    /// Build a limb from its configuration tag and target name.
    pub fn from_parts(limb: &str, target: impl Into<String>) -> EngineResult<Self> {
        let target = target.into();
        match limb {
            "fee" => Ok(LimbRef::Fee(target)),
            "tranche_interest" => Ok(LimbRef::TrancheInterest(target)),
            "tranche_principal" => Ok(LimbRef::TranchePrincipal(target)),
            "reserve" => Ok(LimbRef::Reserve(target)),
            other => Err(WaterfallError::config(format!(
                "unsupported waterfall limb type: {other}"
            ))),
        }
    }

    /// Name of the referenced entity.
    pub fn target(&self) -> &str {
        match self {
            LimbRef::Fee(n)
            | LimbRef::TrancheInterest(n)
            | LimbRef::TranchePrincipal(n)
            | LimbRef::Reserve(n) => n,
        }
    }

    /// The only waterfall this limb may appear in.
    pub fn kind(&self) -> WaterfallKind {
        match self {
            LimbRef::TranchePrincipal(_) => WaterfallKind::Redemption,
            LimbRef::Fee(_) | LimbRef::TrancheInterest(_) | LimbRef::Reserve(_) => {
                WaterfallKind::Revenue
            }
        }
    }
}

impl fmt::Display for LimbRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LimbRef::Fee(_) => "fee",
            LimbRef::TrancheInterest(_) => "tranche_interest",
            LimbRef::TranchePrincipal(_) => "tranche_principal",
            LimbRef::Reserve(_) => "reserve",
        };
        write!(f, "{}:{}", tag, self.target())
    }
}
