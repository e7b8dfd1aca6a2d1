use crate::core::error::{EngineResult, WaterfallError};
use crate::core::obligation::Obligation;
use crate::core::tranche::Tranche;
use crate::distribution::accrual::round2;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Absolute tolerance on the sum of principal weights.
pub const WEIGHT_TOLERANCE: Decimal = dec!(0.00000001);

/// How redemption cash is split across tranches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepaymentStructure {
    /// Everything to the most senior tranche with a balance.
    Sequential,
    /// Proportional to each tranche's outstanding balance.
    ProRata,
    /// Most junior first. Recognized but not supported.
    ReverseSequential,
}

impl RepaymentStructure {
    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentStructure::Sequential => "sequential",
            RepaymentStructure::ProRata => "pro-rata",
            RepaymentStructure::ReverseSequential => "reverse-sequential",
        }
    }

    /// Fail unless the allocator can actually run this structure.
    pub fn ensure_supported(self) -> EngineResult<()> {
        match self {
            RepaymentStructure::Sequential | RepaymentStructure::ProRata => Ok(()),
            RepaymentStructure::ReverseSequential => Err(reverse_sequential_unsupported()),
        }
    }
}

impl fmt::Display for RepaymentStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentStructure {
    type Err = WaterfallError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "sequential" => Ok(RepaymentStructure::Sequential),
            "pro-rata" => Ok(RepaymentStructure::ProRata),
            "reverse-sequential" => Ok(RepaymentStructure::ReverseSequential),
            other => Err(WaterfallError::config(format!(
                "invalid repayment structure: {other}. Must be \"sequential\" or \"pro-rata\""
            ))),
        }
    }
}

fn reverse_sequential_unsupported() -> WaterfallError {
    WaterfallError::NotImplemented("reverse-sequential principal allocation".to_string())
}

/// Check that `weights` sum to one within [`WEIGHT_TOLERANCE`].
pub fn ensure_weights_sum_to_one<'a>(
    weights: impl IntoIterator<Item = &'a Decimal>,
) -> EngineResult<()> {
    let total: Decimal = weights.into_iter().sum();
    if (total - Decimal::ONE).abs() > WEIGHT_TOLERANCE {
        return Err(WaterfallError::Allocation { total });
    }
    Ok(())
}

/// Turns the period's redemption cash into a principal target per tranche.
///
/// The targets are soft: each tranche's principal limb consumes its target
/// as the amount due, and the redemption waterfall pays what cash allows.
pub struct PrincipalAllocator<'a> {
    tranches: &'a [Tranche],
    structure: RepaymentStructure,
}

impl<'a> PrincipalAllocator<'a> {
    pub fn new(tranches: &'a [Tranche], structure: RepaymentStructure) -> Self {
        Self { tranches, structure }
    }

    fn aggregate_balance(&self) -> Decimal {
        self.tranches.iter().map(|t| t.last_period_ending_balance()).sum()
    }

    /// Weight 1 for the first tranche, in list order, with a positive balance.
    pub fn sequential_weights(&self) -> EngineResult<Vec<Decimal>> {
        let first = self
            .tranches
            .iter()
            .position(|t| t.last_period_ending_balance() > Decimal::ZERO)
            .unwrap_or(0);
        let weights: Vec<Decimal> = (0..self.tranches.len())
            .map(|i| if i == first { Decimal::ONE } else { Decimal::ZERO })
            .collect();
        ensure_weights_sum_to_one(&weights)?;
        Ok(weights)
    }

    /// Each tranche's share of the aggregate prior-period balance.
    pub fn pro_rata_weights(&self) -> EngineResult<Vec<Decimal>> {
        let total = self.aggregate_balance();
        if total <= Decimal::ZERO {
            return Err(WaterfallError::Allocation { total: Decimal::ZERO });
        }
        let weights: Vec<Decimal> = self
            .tranches
            .iter()
            .map(|t| t.last_period_ending_balance() / total)
            .collect();
        ensure_weights_sum_to_one(&weights)?;
        Ok(weights)
    }

    pub fn weights(&self) -> EngineResult<Vec<Decimal>> {
        match self.structure {
            RepaymentStructure::Sequential => self.sequential_weights(),
            RepaymentStructure::ProRata => self.pro_rata_weights(),
            RepaymentStructure::ReverseSequential => Err(reverse_sequential_unsupported()),
        }
    }

    /// Split `available` across tranches, rounding each target to cents.
    ///
    /// A deal with no outstanding balance receives a zero target for every
    /// tranche; the weight check only applies while something is owed.
    pub fn allocate(&self, available: Decimal) -> EngineResult<BTreeMap<String, Decimal>> {
        self.structure.ensure_supported()?;
        if self.aggregate_balance() <= Decimal::ZERO {
            return Ok(self
                .tranches
                .iter()
                .map(|t| (t.name().to_string(), Decimal::ZERO))
                .collect());
        }
        let weights = self.weights()?;
        Ok(self
            .tranches
            .iter()
            .zip(weights)
            .map(|(t, w)| (t.name().to_string(), round2(available * w)))
            .collect())
    }
}
