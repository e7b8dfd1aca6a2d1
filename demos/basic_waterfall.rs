//! Basic two-tranche deal run over a few quarters.
//!
//! Shows the revenue and redemption waterfalls for each period, an
//! interest shortfall carried into arrears, and the reserve being
//! released and refilled.

use rust_decimal_macros::dec;
use waterfall_engine::prelude::*;

fn main() -> EngineResult<()> {
    println!("╔══════════════════════════════════════════╗");
    println!("║  waterfall-engine: Basic Waterfall Demo  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let quarterly = PaymentFrequency::Quarterly;
    let mut deal = Deal::builder("RR25-1")
        .repayment_structure(RepaymentStructure::Sequential)
        .tranche(Tranche::new("A", dec!(100_000_000), dec!(0.02), dec!(0.011), quarterly)?)
        .tranche(
            Tranche::new("B", dec!(50_000_000), dec!(0.02), dec!(0.025), quarterly)?
                .with_step_up(dec!(0.035), 3),
        )
        .fee(Fee::new("issuer_profit", FeeConfig::DollarAmount(dec!(250)), quarterly))
        .fee(Fee::new("servicer", FeeConfig::Percentage(dec!(0.005)), quarterly).annualized())
        .reserve(Reserve::new(
            "reserve",
            dec!(0.01),
            ReserveBasis::AggregateTrancheBalance,
            dec!(0),
        )?)
        .revenue_limb(1, LimbRef::fee("issuer_profit"))
        .revenue_limb(2, LimbRef::fee("servicer"))
        .revenue_limb(3, LimbRef::tranche_interest("A"))
        .revenue_limb(4, LimbRef::reserve("reserve"))
        .revenue_limb(5, LimbRef::tranche_interest("B"))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .redemption_limb(2, LimbRef::tranche_principal("B"))
        .build()?;

    let periods = [
        PeriodInput::new(dec!(3_200_000), dec!(4_000_000), dec!(150_000_000)),
        // a thin quarter: B's interest falls short
        PeriodInput::new(dec!(1_500_000), dec!(3_500_000), dec!(146_000_000)),
        PeriodInput::new(dec!(3_100_000), dec!(3_800_000), dec!(142_500_000)),
        PeriodInput::new(dec!(3_000_000), dec!(3_600_000), dec!(138_700_000)),
    ];

    for outcome in run_all_periods(&mut deal, &periods)? {
        println!("{}", outcome.revenue);
        println!("{}", outcome.redemption);
    }

    println!("{}", DealSummary::from_deal(&deal));
    Ok(())
}
