//! Collection scenarios for an amortizing collateral pool.
//!
//! Generates the per-period revenue and redemption collections a deal is
//! run against. Output is fully determined by the seed.

use crate::core::context::PeriodInput;
use crate::core::frequency::PaymentFrequency;
use crate::distribution::accrual::round2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for generating a collection schedule.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of payment periods to generate.
    pub periods: u32,
    /// Collateral balance at closing.
    pub pool_balance: Decimal,
    /// Annual yield on the collateral, e.g. `0.05`.
    pub annual_yield: Decimal,
    /// Annual prepayment rate (CPR), e.g. `0.10`.
    pub prepayment_rate: f64,
    pub frequency: PaymentFrequency,
    /// Relative jitter applied to revenue and prepayments, e.g. `0.05` for ±5%.
    pub noise: f64,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            periods: 20,
            pool_balance: dec!(150_000_000),
            annual_yield: dec!(0.05),
            prepayment_rate: 0.10,
            frequency: PaymentFrequency::Quarterly,
            noise: 0.05,
            seed: 42,
        }
    }
}

fn jitter(rng: &mut StdRng, noise: f64) -> f64 {
    if noise <= 0.0 {
        return 1.0;
    }
    1.0 + rng.gen_range(-noise..noise)
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}

/// Generate one [`PeriodInput`] per period.
///
/// Each period collects interest on the opening pool balance, a
/// straight-line scheduled amortization over the remaining term and a
/// prepayment at the single-period equivalent of the annual rate. The
/// reported pool balance is the opening balance of the period.
pub fn generate_collections(config: &ScenarioConfig) -> Vec<PeriodInput> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let per_year = config.frequency.periods_per_year();
    let smm = 1.0 - (1.0 - config.prepayment_rate.clamp(0.0, 1.0)).powf(1.0 / f64::from(per_year));

    let mut balance = config.pool_balance.max(Decimal::ZERO);
    let mut inputs = Vec::with_capacity(config.periods as usize);

    for period in 0..config.periods {
        let opening = balance;
        let interest = opening * config.annual_yield / Decimal::from(per_year);
        let noise = to_decimal(jitter(&mut rng, config.noise));
        let revenue = round2(interest * noise).max(Decimal::ZERO);

        let remaining_term = Decimal::from(config.periods - period);
        let scheduled = round2(opening / remaining_term);
        let prepay_rate = (smm * jitter(&mut rng, config.noise)).clamp(0.0, 1.0);
        let prepayment = round2((opening - scheduled) * to_decimal(prepay_rate)).max(Decimal::ZERO);
        let redemption = (scheduled + prepayment).min(opening);

        balance = opening - redemption;
        inputs.push(PeriodInput::new(revenue, redemption, opening));
    }
    inputs
}
