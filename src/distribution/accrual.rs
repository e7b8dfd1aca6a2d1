//! Accrual arithmetic for tranches, fees and reserves.
//!
//! Every function here is pure: the same inputs always produce the same
//! amounts, and monetary results are rounded to cents at the point the
//! amount due is computed.

use crate::core::fee::FeeConfig;
use crate::core::frequency::PaymentFrequency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Round a monetary amount to 2 decimal places.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Margin increase effective from `period` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUp {
    /// Margin that replaces the base margin.
    pub margin: Decimal,
    /// First period the step-up margin applies to.
    pub period: u32,
}

pub fn applicable_margin(base_margin: Decimal, step_up: Option<StepUp>, period: u32) -> Decimal {
    match step_up {
        Some(s) if period >= s.period => s.margin,
        _ => base_margin,
    }
}

/// Annual rate scaled down to one payment period and applied to `balance`.
pub fn periodic_interest(
    balance: Decimal,
    annual_rate: Decimal,
    frequency: PaymentFrequency,
) -> Decimal {
    round2(balance * annual_rate / Decimal::from(frequency.periods_per_year()))
}

/// Components of a tranche's interest claim for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestBreakdown {
    /// Interest on the opening balance.
    pub current: Decimal,
    /// Unpaid interest carried from the previous period.
    pub arrears: Decimal,
    /// Interest accrued on the carried arrears.
    pub interest_on_arrears: Decimal,
}

impl InterestBreakdown {
    pub fn total(&self) -> Decimal {
        self.current + self.arrears + self.interest_on_arrears
    }
}

/// Interest due on `balance` plus carried `arrears`.
pub fn interest_due(
    balance: Decimal,
    annual_rate: Decimal,
    frequency: PaymentFrequency,
    arrears: Decimal,
    accrue_on_arrears: bool,
) -> InterestBreakdown {
    let interest_on_arrears = if accrue_on_arrears {
        periodic_interest(arrears, annual_rate, frequency)
    } else {
        Decimal::ZERO
    };
    InterestBreakdown {
        current: periodic_interest(balance, annual_rate, frequency),
        arrears,
        interest_on_arrears,
    }
}

/// Fee amount for a period in which the fee is payable.
///
/// Annualized fees are divided by the number of periods per year.
pub fn fee_due(
    config: FeeConfig,
    pool_balance: Decimal,
    frequency: PaymentFrequency,
    annual: bool,
) -> Decimal {
    let amount = match config {
        FeeConfig::DollarAmount(amount) => amount,
        FeeConfig::Percentage(pct) => pct * pool_balance,
    };
    if annual {
        round2(amount / Decimal::from(frequency.periods_per_year()))
    } else {
        round2(amount)
    }
}

/// Required reserve balance for a given basis amount.
pub fn reserve_required(required_percentage: Decimal, basis: Decimal) -> Decimal {
    round2(required_percentage * basis)
}
