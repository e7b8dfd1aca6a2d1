use crate::core::obligation::Obligation;
use crate::distribution::waterfall::WaterfallRun;
use crate::engine::deal::Deal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balances and cumulative payments for one tranche.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheSummary {
    /// Tranche name.
    pub name: String,
    /// Principal at closing.
    pub initial_balance: Decimal,
    /// Principal after the last committed period.
    pub current_balance: Decimal,
    /// Cumulative interest paid.
    pub total_paid_interest: Decimal,
    /// Cumulative interest shortfall.
    pub total_unpaid_interest: Decimal,
    /// Arrears carried into the next period (zero under write-off).
    pub carried_arrears: Decimal,
    /// Cumulative principal repaid.
    pub total_paid_principal: Decimal,
}

/// Cumulative payments for one fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSummary {
    /// Fee name.
    pub name: String,
    /// Cumulative amount paid.
    pub total_paid: Decimal,
    /// Cumulative shortfall.
    pub total_unpaid: Decimal,
}

/// Read-only snapshot of a deal after some number of periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    /// Deal name.
    pub name: String,
    /// Number of committed periods.
    pub periods_run: u32,
    /// Sum of tranche balances at closing.
    pub total_initial_balance: Decimal,
    /// Sum of tranche balances now.
    pub total_current_balance: Decimal,
    /// One entry per tranche.
    pub tranches: Vec<TrancheSummary>,
    /// One entry per fee.
    pub fees: Vec<FeeSummary>,
    /// Reserve cash held, if the deal has a reserve.
    pub reserve_balance: Option<Decimal>,
    /// Revenue residual across all periods.
    pub total_excess_spread: Decimal,
    /// Redemption residual across all periods.
    pub total_surplus: Decimal,
}

impl DealSummary {
    pub fn from_deal(deal: &Deal) -> Self {
        let tranches = deal
            .tranches()
            .iter()
            .map(|t| TrancheSummary {
                name: t.name().to_string(),
                initial_balance: t.initial_balance(),
                current_balance: t.last_period_ending_balance(),
                total_paid_interest: t.total_paid_interest(),
                total_unpaid_interest: t.total_unpaid_interest(),
                carried_arrears: t.last_period_unpaid_interest(),
                total_paid_principal: t.total_paid_principal(),
            })
            .collect();

        let fees = deal
            .fees()
            .iter()
            .map(|f| FeeSummary {
                name: f.name().to_string(),
                total_paid: f.total_paid(),
                total_unpaid: f.total_unpaid(),
            })
            .collect();

        DealSummary {
            name: deal.name().to_string(),
            periods_run: deal.periods_run(),
            total_initial_balance: deal.total_initial_balance(),
            total_current_balance: deal.total_current_balance(),
            tranches,
            fees,
            reserve_balance: deal.reserve().map(|r| r.last_period_balance()),
            total_excess_spread: total_residual(deal.history_revenue()),
            total_surplus: total_residual(deal.history_redemption()),
        }
    }

    /// Outstanding tranche balance as a fraction of the original balance.
    pub fn pool_factor(&self) -> f64 {
        if self.total_initial_balance == Decimal::ZERO {
            return 0.0;
        }
        let factor = self.total_current_balance / self.total_initial_balance;
        factor.to_string().parse::<f64>().unwrap_or(0.0)
    }
}

fn total_residual(runs: &[WaterfallRun]) -> Decimal {
    runs.iter().map(|r| r.residual.amount_paid).sum()
}

impl std::fmt::Display for DealSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Deal Summary: {} ===", self.name)?;
        writeln!(f, "Periods Run:      {}", self.periods_run)?;
        writeln!(f, "Initial Balance:  {}", self.total_initial_balance)?;
        writeln!(f, "Current Balance:  {}", self.total_current_balance)?;
        writeln!(f, "Pool Factor:      {:.4}", self.pool_factor())?;
        writeln!(f, "Excess Spread:    {}", self.total_excess_spread)?;
        writeln!(f, "Surplus:          {}", self.total_surplus)?;
        if let Some(balance) = self.reserve_balance {
            writeln!(f, "Reserve Balance:  {}", balance)?;
        }

        writeln!(f, "\nTranches:")?;
        for t in &self.tranches {
            writeln!(
                f,
                "  {}: balance {} / {}, interest paid {} unpaid {} (arrears {}), principal paid {}",
                t.name,
                t.current_balance,
                t.initial_balance,
                t.total_paid_interest,
                t.total_unpaid_interest,
                t.carried_arrears,
                t.total_paid_principal
            )?;
        }

        if !self.fees.is_empty() {
            writeln!(f, "\nFees:")?;
            for fee in &self.fees {
                writeln!(f, "  {}: paid {} unpaid {}", fee.name, fee.total_paid, fee.total_unpaid)?;
            }
        }
        Ok(())
    }
}
