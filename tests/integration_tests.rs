use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use waterfall_engine::core::context::PeriodInput;
use waterfall_engine::core::error::WaterfallError;
use waterfall_engine::core::fee::{Fee, FeeConfig};
use waterfall_engine::core::frequency::PaymentFrequency;
use waterfall_engine::core::obligation::{LimbRef, Obligation};
use waterfall_engine::core::reserve::{Reserve, ReserveBasis};
use waterfall_engine::core::tranche::{ArrearsPolicy, Tranche};
use waterfall_engine::distribution::allocation::RepaymentStructure;
use waterfall_engine::engine::config::{DealConfig, PeriodsFile};
use waterfall_engine::engine::deal::Deal;
use waterfall_engine::engine::report::DealSummary;
use waterfall_engine::engine::runner::{run_all_periods, EngineState, WaterfallEngine};
use waterfall_engine::simulation::scenario::{generate_collections, ScenarioConfig};

fn tranche(name: &str, balance: Decimal, margin: Decimal) -> Tranche {
    Tranche::new(name, balance, dec!(0), margin, PaymentFrequency::Quarterly).unwrap()
}

fn period(revenue: Decimal, redemption: Decimal, pool: Decimal) -> PeriodInput {
    PeriodInput::new(revenue, redemption, pool)
}

/// Shortfall in one period is carried, with interest, into the next.
#[test]
fn interest_shortfall_carried_forward() {
    let mut deal = Deal::builder("single")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .revenue_limb(1, LimbRef::tranche_interest("A"))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .build()
        .unwrap();

    let out = run_all_periods(
        &mut deal,
        &[
            period(dec!(200_000), dec!(0), dec!(100_000_000)),
            period(dec!(1_000_000), dec!(0), dec!(100_000_000)),
        ],
    )
    .unwrap();

    let first = out[0].revenue.get("1 - A").unwrap();
    assert_eq!(first.amount_due, dec!(275_000.00));
    assert_eq!(first.amount_paid, dec!(200_000.00));
    assert_eq!(first.amount_unpaid, dec!(75_000.00));

    let second = out[1].revenue.get("1 - A").unwrap();
    assert_eq!(second.amount_due, dec!(350_206.25));
    assert_eq!(second.amount_unpaid, Decimal::ZERO);
    assert_eq!(out[1].revenue.get("excess_spread").unwrap().amount_paid, dec!(649_793.75));

    let a = deal.tranche("A").unwrap();
    let record = &a.history_interest()[1];
    assert_eq!(record.current_interest_due, dec!(275_000));
    assert_eq!(record.arrears, dec!(75_000));
    assert_eq!(record.interest_on_arrears, dec!(206.25));
    assert_eq!(a.total_paid_interest(), dec!(550_206.25));
    assert_eq!(a.total_unpaid_interest(), dec!(75_000));
    assert_eq!(a.last_period_unpaid_interest(), Decimal::ZERO);
}

#[test]
fn write_off_reports_no_arrears() {
    let mut deal = Deal::builder("write-off")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)).with_arrears_policy(ArrearsPolicy {
            write_off_unpaid: true,
            accrue_on_arrears: true,
        }))
        .revenue_limb(1, LimbRef::tranche_interest("A"))
        .build()
        .unwrap();

    run_all_periods(
        &mut deal,
        &[
            period(dec!(200_000), dec!(0), dec!(100_000_000)),
            period(dec!(1_000_000), dec!(0), dec!(100_000_000)),
        ],
    )
    .unwrap();

    let a = deal.tranche("A").unwrap();
    assert_eq!(a.history_interest()[1].arrears, Decimal::ZERO);
    assert_eq!(a.history_interest()[1].total_interest_due, dec!(275_000));
    // the cumulative counter keeps the written-off amount
    assert_eq!(a.total_unpaid_interest(), dec!(75_000));
}

#[test]
fn pro_rata_principal_split() {
    let mut deal = Deal::builder("pro-rata")
        .repayment_structure(RepaymentStructure::ProRata)
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .tranche(tranche("B", dec!(50_000_000), dec!(0.02)))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .redemption_limb(2, LimbRef::tranche_principal("B"))
        .build()
        .unwrap();

    let inputs = [period(dec!(0), dec!(1_500_000), dec!(150_000_000))];
    let out = run_all_periods(&mut deal, &inputs).unwrap();
    let redemption = &out[0].redemption;
    assert_eq!(redemption.get("1 - A").unwrap().amount_paid, dec!(1_000_000.00));
    assert_eq!(redemption.get("2 - B").unwrap().amount_paid, dec!(500_000.00));
    assert_eq!(redemption.get("surplus").unwrap().amount_paid, Decimal::ZERO);

    assert_eq!(deal.tranche("A").unwrap().last_period_ending_balance(), dec!(99_000_000));
    assert_eq!(deal.tranche("B").unwrap().last_period_ending_balance(), dec!(49_500_000));
    assert_eq!(deal.total_current_balance(), dec!(148_500_000));
}

/// A principal limb reports the balance left after payment as unpaid.
#[test]
fn principal_unpaid_is_remaining_balance() {
    let mut deal = Deal::builder("paydown")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .build()
        .unwrap();

    let inputs = vec![period(dec!(0), dec!(1_500_000), dec!(100_000_000)); 2];
    let out = run_all_periods(&mut deal, &inputs).unwrap();

    let first = out[0].redemption.get("1 - A").unwrap();
    assert_eq!(first.amount_due, dec!(1_500_000));
    assert_eq!(first.amount_paid, dec!(1_500_000));
    assert_eq!(first.amount_unpaid, dec!(98_500_000));
    let a = deal.tranche("A").unwrap();
    assert_eq!(first.amount_unpaid, a.history_principal()[0].ending_balance);

    let second = out[1].redemption.get("1 - A").unwrap();
    assert_eq!(second.amount_unpaid, dec!(97_000_000));
    assert_eq!(second.amount_unpaid, a.last_period_ending_balance());
}

/// Naming the same entity twice in one waterfall is a configuration error.
#[test]
fn repeated_limb_is_rejected() {
    let err = Deal::builder("twice")
        .tranche(tranche("A", dec!(500), dec!(0.011)))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .redemption_limb(2, LimbRef::tranche_principal("A"))
        .build()
        .unwrap_err();
    assert!(matches!(err, WaterfallError::Configuration(_)));
}

#[test]
fn sequential_moves_to_next_tranche_once_redeemed() {
    let mut deal = Deal::builder("sequential")
        .tranche(tranche("A", dec!(1_000_000), dec!(0.011)))
        .tranche(tranche("B", dec!(1_000_000), dec!(0.02)))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .redemption_limb(2, LimbRef::tranche_principal("B"))
        .build()
        .unwrap();

    let inputs = vec![period(dec!(0), dec!(600_000), dec!(2_000_000)); 3];
    let out = run_all_periods(&mut deal, &inputs).unwrap();

    // period 2: A only needs 400,000 of its 600,000 target
    assert_eq!(out[1].redemption.get("1 - A").unwrap().amount_paid, dec!(400_000));
    assert_eq!(out[1].redemption.get("2 - B").unwrap().amount_due, Decimal::ZERO);
    assert_eq!(out[1].redemption.get("surplus").unwrap().amount_paid, dec!(200_000));
    // period 3: everything goes to B
    assert_eq!(out[2].redemption.get("1 - A").unwrap().amount_due, Decimal::ZERO);
    assert_eq!(out[2].redemption.get("2 - B").unwrap().amount_paid, dec!(600_000));

    assert_eq!(deal.tranche("A").unwrap().last_period_ending_balance(), Decimal::ZERO);
    assert_eq!(deal.tranche("B").unwrap().last_period_ending_balance(), dec!(400_000));
}

#[test]
fn flat_fee_then_excess_spread() {
    let mut deal = Deal::builder("fee")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .fee(Fee::new(
            "issuer_profit",
            FeeConfig::DollarAmount(dec!(250)),
            PaymentFrequency::Quarterly,
        ))
        .revenue_limb(1, LimbRef::fee("issuer_profit"))
        .build()
        .unwrap();

    let out = run_all_periods(&mut deal, &[period(dec!(1_000_000), dec!(0), dec!(0))]).unwrap();
    let revenue = &out[0].revenue;
    assert_eq!(revenue.get("1 - issuer_profit").unwrap().amount_paid, dec!(250));
    assert_eq!(revenue.get("1 - issuer_profit").unwrap().amount_unpaid, dec!(0.00));
    let residual = revenue.get("excess_spread").unwrap();
    assert_eq!(residual.amount_paid, dec!(999_750.00));
    assert_eq!(residual.amount_unpaid, Decimal::ZERO);
}

#[test]
fn annual_percentage_fee_on_pool_balance() {
    let mut deal = Deal::builder("servicer")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .fee(
            Fee::new("servicer", FeeConfig::Percentage(dec!(0.01)), PaymentFrequency::Quarterly)
                .annualized(),
        )
        .fee(
            Fee::new("trustee", FeeConfig::DollarAmount(dec!(5_000)), PaymentFrequency::Quarterly)
                .with_payment_periods([2]),
        )
        .revenue_limb(1, LimbRef::fee("servicer"))
        .revenue_limb(2, LimbRef::fee("trustee"))
        .build()
        .unwrap();

    let out = run_all_periods(
        &mut deal,
        &[
            period(dec!(1_000_000), dec!(0), dec!(148_000_000)),
            period(dec!(1_000_000), dec!(0), dec!(148_000_000)),
        ],
    )
    .unwrap();
    assert_eq!(out[0].revenue.get("1 - servicer").unwrap().amount_due, dec!(370_000));
    assert_eq!(out[0].revenue.get("2 - trustee").unwrap().amount_due, Decimal::ZERO);
    assert_eq!(out[1].revenue.get("2 - trustee").unwrap().amount_paid, dec!(5_000));
    assert_eq!(deal.fee("trustee").unwrap().total_paid(), dec!(5_000));
}

/// The reserve is released into revenue each period and refilled by its limb.
#[test]
fn reserve_release_and_refill() {
    let mut deal = Deal::builder("reserve")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .tranche(tranche("B", dec!(50_000_000), dec!(0.02)))
        .reserve(
            Reserve::new("reserve", dec!(0.01), ReserveBasis::AggregateTrancheBalance, dec!(0))
                .unwrap(),
        )
        .revenue_limb(1, LimbRef::reserve("reserve"))
        .build()
        .unwrap();

    let inputs = vec![period(dec!(2_000_000), dec!(0), dec!(150_000_000)); 2];
    let out = run_all_periods(&mut deal, &inputs).unwrap();

    let first = out[0].revenue.get("1 - reserve").unwrap();
    assert_eq!(first.amount_due, dec!(1_500_000.00));
    assert_eq!(first.amount_paid, dec!(1_500_000.00));
    assert_eq!(out[0].revenue.get("excess_spread").unwrap().amount_paid, dec!(500_000));

    assert_eq!(out[1].revenue.starting_cash, dec!(3_500_000));
    assert_eq!(out[1].revenue.get("1 - reserve").unwrap().amount_paid, dec!(1_500_000));
    assert_eq!(out[1].revenue.get("excess_spread").unwrap().amount_paid, dec!(2_000_000));
    assert_eq!(deal.reserve().unwrap().last_period_balance(), dec!(1_500_000));
}

#[test]
fn reserve_without_refill_limb_is_released_once() {
    let mut deal = Deal::builder("reserve")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .reserve(
            Reserve::new("reserve", dec!(0.01), ReserveBasis::PoolBalance, dec!(1_000_000))
                .unwrap(),
        )
        .build()
        .unwrap();

    let inputs = vec![period(dec!(0), dec!(0), dec!(100_000_000)); 2];
    let out = run_all_periods(&mut deal, &inputs).unwrap();
    assert_eq!(out[0].revenue.get("excess_spread").unwrap().amount_paid, dec!(1_000_000));
    assert_eq!(out[1].revenue.get("excess_spread").unwrap().amount_paid, Decimal::ZERO);
}

#[test]
fn step_up_margin_applies_from_period() {
    let mut deal = Deal::builder("step-up")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)).with_step_up(dec!(0.02), 3))
        .revenue_limb(1, LimbRef::tranche_interest("A"))
        .build()
        .unwrap();

    let inputs = vec![period(dec!(1_000_000), dec!(0), dec!(0)); 3];
    let out = run_all_periods(&mut deal, &inputs).unwrap();
    assert_eq!(out[1].revenue.get("1 - A").unwrap().amount_due, dec!(275_000));
    assert_eq!(out[2].revenue.get("1 - A").unwrap().amount_due, dec!(500_000));
}

#[test]
fn failed_period_commits_nothing() {
    let mut deal = Deal::builder("atomic")
        .tranche(tranche("A", dec!(100_000_000), dec!(0.011)))
        .revenue_limb(1, LimbRef::tranche_interest("A"))
        .redemption_limb(1, LimbRef::tranche_principal("A"))
        .build()
        .unwrap();

    let mut engine = WaterfallEngine::new(&mut deal);
    let err = engine
        .run_period(&period(dec!(1_000_000), dec!(1_000), dec!(-5)))
        .unwrap_err();
    assert!(matches!(err, WaterfallError::InvalidInput { .. }));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.next_period(), 1);

    let out = engine
        .run_period(&period(dec!(1_000_000), dec!(1_000), dec!(100_000_000)))
        .unwrap();
    assert_eq!(out.period, 1);
    assert_eq!(deal.periods_run(), 1);
    assert_eq!(deal.tranche("A").unwrap().history_interest().len(), 1);
    assert_eq!(deal.history_redemption()[0].period, 1);
}

#[test]
fn construction_errors() {
    assert!(matches!(
        Tranche::new("A", dec!(-1), dec!(0), dec!(0.01), PaymentFrequency::Quarterly),
        Err(WaterfallError::Configuration(_))
    ));
    assert!(matches!(
        "W".parse::<PaymentFrequency>(),
        Err(WaterfallError::Configuration(_))
    ));
    assert!(matches!(
        Deal::builder("bad").repayment_structure(RepaymentStructure::ReverseSequential).build(),
        Err(WaterfallError::NotImplemented(_))
    ));
    assert!(matches!(
        Deal::builder("bad")
            .tranche(tranche("A", dec!(1), dec!(0.01)))
            .revenue_limb(1, LimbRef::tranche_principal("A"))
            .build(),
        Err(WaterfallError::Configuration(_))
    ));
}

const DEAL_JSON: &str = r#"{
    "name": "RR25-1",
    "repayment_structure": "sequential",
    "tranches": [
        { "name": "A", "initial_balance": "100000000", "margin": "0.011",
          "payment_frequency": "Q" },
        { "name": "B", "initial_balance": "50000000", "margin": "0.02",
          "payment_frequency": "Q" }
    ],
    "fees": [
        { "name": "issuer_profit", "type": "dollar_amount", "amount": "250",
          "payment_frequency": "Q" },
        { "name": "servicer", "type": "percentage", "amount": "0.005",
          "payment_frequency": "Q", "annual": true }
    ],
    "reserve": { "name": "reserve", "required_percentage": "0.01",
                 "method": "last_period_total_tranche_balance" },
    "waterfalls": {
        "revenue": [
            { "priority": 1, "limb": "fee", "target": "issuer_profit" },
            { "priority": 2, "limb": "fee", "target": "servicer" },
            { "priority": 3, "limb": "tranche_interest", "target": "A" },
            { "priority": 4, "limb": "tranche_interest", "target": "B" },
            { "priority": 5, "limb": "reserve", "target": "reserve" }
        ],
        "redemption": [
            { "priority": 1, "limb": "tranche_principal", "target": "A" },
            { "priority": 2, "limb": "tranche_principal", "target": "B" }
        ]
    }
}"#;

/// JSON deal + generated collections, checked period by period.
#[test]
fn json_deal_over_generated_schedule() {
    let mut deal = DealConfig::from_json(DEAL_JSON).unwrap().build().unwrap();
    let schedule = PeriodsFile {
        periods: generate_collections(&ScenarioConfig {
            periods: 12,
            ..Default::default()
        }),
    };
    let reloaded = PeriodsFile::from_json(&schedule.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, schedule);

    let out = run_all_periods(&mut deal, &reloaded.periods).unwrap();
    assert_eq!(out.len(), 12);
    assert_eq!(deal.periods_run(), 12);

    for (outcome, input) in out.iter().zip(&reloaded.periods) {
        assert!(outcome.revenue.is_conserved());
        assert!(outcome.redemption.is_conserved());
        assert_eq!(outcome.redemption.starting_cash, input.redemption_collections);
    }

    // every collected principal dollar either redeemed a tranche or is surplus
    let collected: Decimal = reloaded.periods.iter().map(|p| p.redemption_collections).sum();
    let repaid: Decimal = deal.tranches().iter().map(|t| t.total_paid_principal()).sum();
    let surplus: Decimal = deal.history_redemption().iter().map(|r| r.residual.amount_paid).sum();
    assert_eq!(repaid + surplus, collected);
    assert_eq!(deal.total_current_balance(), deal.total_initial_balance() - repaid);

    let summary = DealSummary::from_deal(&deal);
    assert_eq!(summary.total_surplus, surplus);
    assert!(summary.pool_factor() < 1.0);
    assert_eq!(summary.tranches.len(), 2);
    assert_eq!(deal.fee("issuer_profit").unwrap().history().len(), 12);
    assert_eq!(deal.tranche("A").unwrap().name(), "A");
}
