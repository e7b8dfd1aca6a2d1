use crate::core::context::PaymentContext;
use crate::core::error::{EngineResult, WaterfallError};
use crate::core::obligation::{AmountDue, LimbRef, Obligation, WaterfallKind};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resolves a limb reference to the obligation it pays.
pub trait LimbSource {
    /// The entity `limb` names, or a configuration error if there is none.
    fn obligation(&self, limb: &LimbRef) -> EngineResult<&dyn Obligation>;
}

/// Reporting record for one limb in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbResult {
    /// Pool cash before this limb was paid.
    pub available_cash: Decimal,
    /// Amount the limb was owed.
    pub amount_due: Decimal,
    /// Amount the pool paid.
    pub amount_paid: Decimal,
    /// Shortfall, or for a principal limb the balance still outstanding.
    pub amount_unpaid: Decimal,
}

/// One keyed limb result within a [`WaterfallRun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbEntry {
    /// Position in the waterfall, lowest paid first.
    pub priority: u32,
    /// Name of the paid entity.
    pub name: String,
    /// What the limb was owed and paid.
    pub result: LimbResult,
}

impl LimbEntry {
    /// Key of the form `"{priority} - {name}"`.
    pub fn key(&self) -> String {
        limb_key(self.priority, &self.name)
    }
}

/// Result key for the limb at `priority` paying `name`.
pub fn limb_key(priority: u32, name: &str) -> String {
    format!("{priority} - {name}")
}

/// Results of one waterfall pass: one entry per limb in priority order,
/// then the residual claim (`excess_spread` or `surplus`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallRun {
    /// Pool this run distributed.
    pub kind: WaterfallKind,
    /// 1-based period index.
    pub period: u32,
    /// Pool cash before the first limb.
    pub starting_cash: Decimal,
    /// Limb results in priority order.
    pub limbs: Vec<LimbEntry>,
    /// Cash left after the last limb.
    pub residual: LimbResult,
}

impl WaterfallRun {
    /// Look up a result by its `"{priority} - {name}"` key or the residual label.
    pub fn get(&self, key: &str) -> Option<&LimbResult> {
        if key == self.kind.residual_label() {
            return Some(&self.residual);
        }
        self.limbs.iter().find(|l| l.key() == key).map(|l| &l.result)
    }

    /// `excess_spread` or `surplus`.
    pub fn residual_label(&self) -> &'static str {
        self.kind.residual_label()
    }

    /// Cash paid to limbs, excluding the residual.
    pub fn total_paid(&self) -> Decimal {
        self.limbs.iter().map(|l| l.result.amount_paid).sum()
    }

    /// Sum of every limb's `amount_unpaid`.
    pub fn total_unpaid(&self) -> Decimal {
        self.limbs.iter().map(|l| l.result.amount_unpaid).sum()
    }

    /// Limb payments plus the residual account for every unit of starting cash.
    pub fn is_conserved(&self) -> bool {
        self.total_paid() + self.residual.amount_paid == self.starting_cash
    }
}

impl std::fmt::Display for WaterfallRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- {} waterfall, period {} ---", self.kind, self.period)?;
        writeln!(f, "  Available: {}", self.starting_cash)?;
        for limb in &self.limbs {
            writeln!(
                f,
                "  {:<28} due {:>16}  paid {:>16}  unpaid {:>14}",
                limb.key(),
                limb.result.amount_due,
                limb.result.amount_paid,
                limb.result.amount_unpaid
            )?;
        }
        writeln!(
            f,
            "  {:<28} {:>42}",
            self.residual_label(),
            self.residual.amount_paid
        )
    }
}

/// A settled amount waiting to be folded back into its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Entity the outcome belongs to.
    pub limb: LimbRef,
    /// Settled amounts to record.
    pub outcome: AmountDue,
}

/// Output of [`Waterfall::apply`].
#[derive(Debug, Clone)]
pub struct WaterfallPass {
    /// Keyed results for reporting.
    pub run: WaterfallRun,
    /// Staged history updates, one per limb.
    pub settlements: Vec<Settlement>,
}

/// Ordered list of limbs paid from one cash pool.
///
/// Priorities define a strict total order: duplicates are rejected at
/// construction. So are limbs that belong to the other pool and limbs that
/// appear twice, since every limb reads the same pre-period snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waterfall {
    /// Pool the limbs are paid from.
    kind: WaterfallKind,
    /// `(priority, limb)` pairs sorted by priority.
    limbs: Vec<(u32, LimbRef)>,
}

impl Waterfall {
    /// Validate and order a set of limbs for `kind`'s pool.
    pub fn new(
        kind: WaterfallKind,
        limbs: impl IntoIterator<Item = (u32, LimbRef)>,
    ) -> EngineResult<Self> {
        let mut limbs: Vec<(u32, LimbRef)> = limbs.into_iter().collect();
        let mut seen = BTreeSet::new();
        let mut seen_limbs = BTreeSet::new();
        for (priority, limb) in &limbs {
            if !seen.insert(*priority) {
                return Err(WaterfallError::config(format!(
                    "{kind} waterfall: duplicate priority {priority}"
                )));
            }
            if !seen_limbs.insert(limb) {
                return Err(WaterfallError::config(format!(
                    "{kind} waterfall: {limb} appears more than once"
                )));
            }
            if limb.kind() != kind {
                return Err(WaterfallError::config(format!(
                    "{kind} waterfall: unsupported limb {limb}"
                )));
            }
        }
        limbs.sort_by_key(|(priority, _)| *priority);
        Ok(Self { kind, limbs })
    }

    /// Pool the limbs are paid from.
    pub fn kind(&self) -> WaterfallKind {
        self.kind
    }

    /// Limbs in ascending priority order.
    pub fn limbs(&self) -> &[(u32, LimbRef)] {
        &self.limbs
    }

    /// True when every unit of cash goes to the residual.
    pub fn is_empty(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Pay every limb in priority order out of the pool in `ctx`.
    ///
    /// Obligations are only read here; the returned settlements carry what
    /// each one must record once the whole period has succeeded.
    pub fn apply(
        &self,
        source: &dyn LimbSource,
        ctx: &mut PaymentContext,
        period: u32,
    ) -> EngineResult<WaterfallPass> {
        let starting_cash = ctx.available_cash(self.kind);
        let mut entries = Vec::with_capacity(self.limbs.len());
        let mut settlements = Vec::with_capacity(self.limbs.len());

        for (priority, limb) in &self.limbs {
            let obligation = source.obligation(limb)?;
            let available_cash = ctx.available_cash(self.kind);
            let outcome = obligation.apply_amount_due(ctx, period, self.kind)?;

            debug!(
                "period {period} {} limb {priority} {}: due {} paid {} unpaid {}",
                self.kind,
                obligation.name(),
                outcome.due,
                outcome.paid,
                outcome.unpaid
            );
            if matches!(limb, LimbRef::TrancheInterest(_)) && !outcome.is_fully_paid() {
                warn!(
                    "period {period}: interest shortfall of {} on tranche {}",
                    outcome.unpaid,
                    obligation.name()
                );
            }

            entries.push(LimbEntry {
                priority: *priority,
                name: obligation.name().to_string(),
                result: LimbResult {
                    available_cash,
                    amount_due: outcome.due,
                    amount_paid: outcome.paid,
                    amount_unpaid: outcome.unpaid,
                },
            });
            ctx.consume(self.kind, outcome.paid);
            settlements.push(Settlement {
                limb: limb.clone(),
                outcome,
            });
        }

        let remaining = ctx.available_cash(self.kind);
        let run = WaterfallRun {
            kind: self.kind,
            period,
            starting_cash,
            limbs: entries,
            residual: LimbResult {
                available_cash: remaining,
                amount_due: remaining,
                amount_paid: remaining,
                amount_unpaid: Decimal::ZERO,
            },
        };
        Ok(WaterfallPass { run, settlements })
    }
}
