use crate::core::error::{EngineResult, WaterfallError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment frequency of a tranche or fee.
///
/// Parsed from the single-letter codes used in deal documents:
/// `M` (monthly), `Q` (quarterly), `S` (semi-annual) and `Y` (annual).
///
/// # Examples
///
/// ```
/// use waterfall_engine::core::frequency::PaymentFrequency;
///
/// let q: PaymentFrequency = "Q".parse().unwrap();
/// assert_eq!(q.periods_per_year(), 4);
/// assert!("X".parse::<PaymentFrequency>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentFrequency {
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "S")]
    SemiAnnual,
    #[serde(rename = "Y")]
    Annual,
}

impl PaymentFrequency {
    /// Number of payment periods in one year.
    pub fn periods_per_year(self) -> u32 {
        match self {
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::SemiAnnual => 2,
            PaymentFrequency::Annual => 1,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            PaymentFrequency::Monthly => "M",
            PaymentFrequency::Quarterly => "Q",
            PaymentFrequency::SemiAnnual => "S",
            PaymentFrequency::Annual => "Y",
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for PaymentFrequency {
    type Err = WaterfallError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "M" => Ok(PaymentFrequency::Monthly),
            "Q" => Ok(PaymentFrequency::Quarterly),
            "S" => Ok(PaymentFrequency::SemiAnnual),
            "Y" => Ok(PaymentFrequency::Annual),
            other => Err(WaterfallError::config(format!(
                "invalid payment frequency: {other}"
            ))),
        }
    }
}
