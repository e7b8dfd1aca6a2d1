use crate::core::context::{PaymentContext, PeriodInput};
use crate::core::error::EngineResult;
use crate::distribution::allocation::PrincipalAllocator;
use crate::distribution::waterfall::WaterfallRun;
use crate::engine::deal::{Deal, PeriodBatch};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Where the engine is within the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Prepping,
    RevenueApplied,
    RedemptionApplied,
    HistoryUpdated,
}

/// Both waterfall results for one committed period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub period: u32,
    pub revenue: WaterfallRun,
    pub redemption: WaterfallRun,
}

/// Drives a deal one period at a time.
///
/// Each period runs both waterfalls against a read-only view of the deal,
/// stages the resulting settlements and commits them in one step. A
/// failure anywhere leaves the deal exactly as the previous period left it.
pub struct WaterfallEngine<'d> {
    deal: &'d mut Deal,
    state: EngineState,
}

impl<'d> WaterfallEngine<'d> {
    pub fn new(deal: &'d mut Deal) -> Self {
        Self {
            deal,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn deal(&self) -> &Deal {
        &*self.deal
    }

    /// 1-indexed period the next call to [`run_period`](Self::run_period) will run.
    pub fn next_period(&self) -> u32 {
        self.deal.periods_run() + 1
    }

    fn transition(&mut self, next: EngineState) {
        debug!("engine: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Build the period's working context: sweep the reserve into revenue,
    /// snapshot the prior tranche balance and allocate redemption cash.
    pub fn prepare_context(&self, input: &PeriodInput) -> EngineResult<PaymentContext> {
        input.validate()?;
        let allocator =
            PrincipalAllocator::new(self.deal.tranches(), self.deal.repayment_structure());
        let allocations = allocator.allocate(input.redemption_collections)?;
        Ok(PaymentContext::new(
            *input,
            self.deal.released_reserve(),
            self.deal.total_current_balance(),
        )
        .with_allocations(allocations))
    }

    pub fn run_period(&mut self, input: &PeriodInput) -> EngineResult<PeriodOutcome> {
        let period = self.next_period();
        match self.try_run_period(period, input) {
            Ok(outcome) => {
                self.transition(EngineState::Idle);
                Ok(outcome)
            }
            Err(e) => {
                warn!("period {period} aborted: {e}");
                self.transition(EngineState::Idle);
                Err(e)
            }
        }
    }

    fn try_run_period(&mut self, period: u32, input: &PeriodInput) -> EngineResult<PeriodOutcome> {
        self.transition(EngineState::Prepping);
        let mut ctx = self.prepare_context(input)?;

        let revenue = self
            .deal
            .revenue_waterfall()
            .apply(self.deal.entities(), &mut ctx, period)?;
        self.transition(EngineState::RevenueApplied);

        let redemption = self
            .deal
            .redemption_waterfall()
            .apply(self.deal.entities(), &mut ctx, period)?;
        self.transition(EngineState::RedemptionApplied);

        let outcome = PeriodOutcome {
            period,
            revenue: revenue.run.clone(),
            redemption: redemption.run.clone(),
        };
        self.deal.commit(PeriodBatch {
            period,
            revenue,
            redemption,
        })?;
        self.transition(EngineState::HistoryUpdated);

        info!(
            "period {period} complete: {} {}, {} {}",
            outcome.revenue.residual_label(),
            outcome.revenue.residual.amount_paid,
            outcome.redemption.residual_label(),
            outcome.redemption.residual.amount_paid
        );
        Ok(outcome)
    }

    /// Run each input in order, stopping at the first failing period.
    /// Periods before the failure stay committed.
    pub fn run_all_periods(&mut self, inputs: &[PeriodInput]) -> EngineResult<Vec<PeriodOutcome>> {
        inputs.iter().map(|input| self.run_period(input)).collect()
    }
}

/// Run every period in `inputs` against `deal`, appending to its history.
pub fn run_all_periods(
    deal: &mut Deal,
    inputs: &[PeriodInput],
) -> EngineResult<Vec<PeriodOutcome>> {
    WaterfallEngine::new(deal).run_all_periods(inputs)
}
