//! JSON documents describing a deal and its period inputs.
//!
//! Enumerated fields are kept as strings and parsed with `FromStr` in
//! [`DealConfig::build`], so an unknown frequency code or limb type is a
//! configuration error rather than a JSON error.

use crate::core::context::PeriodInput;
use crate::core::error::{EngineResult, WaterfallError};
use crate::core::fee::{Fee, FeeConfig};
use crate::core::frequency::PaymentFrequency;
use crate::core::obligation::{LimbRef, WaterfallKind};
use crate::core::reserve::{Reserve, ReserveBasis};
use crate::core::tranche::{ArrearsPolicy, Tranche};
use crate::distribution::allocation::RepaymentStructure;
use crate::engine::deal::{Deal, DealBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_structure() -> String {
    RepaymentStructure::Sequential.as_str().to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheConfig {
    pub name: String,
    pub initial_balance: Decimal,
    #[serde(default)]
    pub reference_rate: Decimal,
    pub margin: Decimal,
    pub payment_frequency: String,
    #[serde(default)]
    pub step_up_margin: Option<Decimal>,
    #[serde(default)]
    pub step_up_period: Option<u32>,
    #[serde(default)]
    pub write_off_unpaid_interest: bool,
    #[serde(default = "default_true")]
    pub interest_on_unpaid_interest: bool,
    #[serde(default)]
    pub repayment_structure: Option<String>,
}

impl TrancheConfig {
    pub fn build(&self) -> EngineResult<Tranche> {
        let frequency: PaymentFrequency = self.payment_frequency.parse()?;
        let mut tranche = Tranche::new(
            self.name.as_str(),
            self.initial_balance,
            self.reference_rate,
            self.margin,
            frequency,
        )?
        .with_arrears_policy(ArrearsPolicy {
            write_off_unpaid: self.write_off_unpaid_interest,
            accrue_on_arrears: self.interest_on_unpaid_interest,
        });

        match (self.step_up_margin, self.step_up_period) {
            (Some(margin), Some(period)) => tranche = tranche.with_step_up(margin, period),
            (None, None) => {}
            _ => {
                return Err(WaterfallError::config(format!(
                    "tranche {}: step_up_margin and step_up_period must be given together",
                    self.name
                )))
            }
        }
        if let Some(structure) = &self.repayment_structure {
            tranche = tranche.with_repayment_structure(structure.parse()?);
        }
        Ok(tranche)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub fee_type: String,
    pub amount: Decimal,
    pub payment_frequency: String,
    #[serde(default)]
    pub annual: bool,
    #[serde(default)]
    pub payment_periods: Option<Vec<u32>>,
}

impl FeeEntry {
    pub fn build(&self) -> EngineResult<Fee> {
        let config = FeeConfig::from_parts(&self.fee_type, self.amount)?;
        let mut fee = Fee::new(self.name.as_str(), config, self.payment_frequency.parse()?);
        if self.annual {
            fee = fee.annualized();
        }
        if let Some(periods) = &self.payment_periods {
            fee = fee.with_payment_periods(periods.iter().copied());
        }
        Ok(fee)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub name: String,
    pub required_percentage: Decimal,
    pub method: String,
    #[serde(default)]
    pub initial_balance: Decimal,
}

impl ReserveConfig {
    pub fn build(&self) -> EngineResult<Reserve> {
        let basis: ReserveBasis = self.method.parse()?;
        Reserve::new(self.name.as_str(), self.required_percentage, basis, self.initial_balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbConfig {
    pub priority: u32,
    pub limb: String,
    pub target: String,
}

/// A complete deal description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealConfig {
    pub name: String,
    #[serde(default = "default_structure")]
    pub repayment_structure: String,
    pub tranches: Vec<TrancheConfig>,
    #[serde(default)]
    pub fees: Vec<FeeEntry>,
    #[serde(default)]
    pub reserve: Option<ReserveConfig>,
    /// Keyed by waterfall kind: `revenue` or `redemption`.
    pub waterfalls: BTreeMap<String, Vec<LimbConfig>>,
}

impl DealConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every field and assemble the deal.
    pub fn build(&self) -> EngineResult<Deal> {
        let mut builder = DealBuilder::new(self.name.as_str())
            .repayment_structure(self.repayment_structure.parse()?);

        for tranche in &self.tranches {
            builder = builder.tranche(tranche.build()?);
        }
        for fee in &self.fees {
            builder = builder.fee(fee.build()?);
        }
        if let Some(reserve) = &self.reserve {
            builder = builder.reserve(reserve.build()?);
        }

        for (key, limbs) in &self.waterfalls {
            let kind: WaterfallKind = key.parse()?;
            for entry in limbs {
                let limb = LimbRef::from_parts(&entry.limb, entry.target.as_str())?;
                builder = match kind {
                    WaterfallKind::Revenue => builder.revenue_limb(entry.priority, limb),
                    WaterfallKind::Redemption => builder.redemption_limb(entry.priority, limb),
                };
            }
        }
        builder.build()
    }
}

/// Period inputs document: `{ "periods": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodsFile {
    pub periods: Vec<PeriodInput>,
}

impl PeriodsFile {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
