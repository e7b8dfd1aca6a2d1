use crate::core::error::{EngineResult, WaterfallError};
use crate::core::fee::Fee;
use crate::core::obligation::{LimbRef, Obligation, WaterfallKind};
use crate::core::reserve::Reserve;
use crate::core::tranche::Tranche;
use crate::distribution::allocation::RepaymentStructure;
use crate::distribution::waterfall::{LimbSource, Waterfall, WaterfallPass, WaterfallRun};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// The tranches, fees and reserve a deal owns. Waterfall limbs resolve
/// against this by name.
#[derive(Debug, Clone, Default)]
pub struct DealEntities {
    /// Tranches in configuration order, most senior first.
    tranches: Vec<Tranche>,
    /// Fees in configuration order.
    fees: Vec<Fee>,
    /// At most one non-liquidity reserve.
    reserve: Option<Reserve>,
}

impl DealEntities {
    /// Tranches in configuration order.
    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    /// Fees in configuration order.
    pub fn fees(&self) -> &[Fee] {
        &self.fees
    }

    /// The deal's reserve, if configured.
    pub fn reserve(&self) -> Option<&Reserve> {
        self.reserve.as_ref()
    }

    fn find(&self, limb: &LimbRef) -> Option<&dyn Obligation> {
        match limb {
            LimbRef::Fee(name) => self
                .fees
                .iter()
                .find(|f| f.name() == name)
                .map(|f| f as &dyn Obligation),
            LimbRef::TrancheInterest(name) | LimbRef::TranchePrincipal(name) => self
                .tranches
                .iter()
                .find(|t| t.name() == name)
                .map(|t| t as &dyn Obligation),
            LimbRef::Reserve(name) => self
                .reserve
                .as_ref()
                .filter(|r| r.name() == name)
                .map(|r| r as &dyn Obligation),
        }
    }

    pub(crate) fn obligation_mut(
        &mut self,
        limb: &LimbRef,
    ) -> EngineResult<&mut dyn Obligation> {
        let found: Option<&mut dyn Obligation> = match limb {
            LimbRef::Fee(name) => self
                .fees
                .iter_mut()
                .find(|f| f.name() == name)
                .map(|f| f as &mut dyn Obligation),
            LimbRef::TrancheInterest(name) | LimbRef::TranchePrincipal(name) => self
                .tranches
                .iter_mut()
                .find(|t| t.name() == name)
                .map(|t| t as &mut dyn Obligation),
            LimbRef::Reserve(name) => self
                .reserve
                .as_mut()
                .filter(|r| r.name() == name)
                .map(|r| r as &mut dyn Obligation),
        };
        found.ok_or_else(|| unknown_target(limb))
    }
}

impl LimbSource for DealEntities {
    fn obligation(&self, limb: &LimbRef) -> EngineResult<&dyn Obligation> {
        self.find(limb).ok_or_else(|| unknown_target(limb))
    }
}

fn unknown_target(limb: &LimbRef) -> WaterfallError {
    WaterfallError::config(format!("limb {limb} refers to an unknown entity"))
}

/// Both waterfall passes for one period, staged before anything is recorded.
#[derive(Debug, Clone)]
pub struct PeriodBatch {
    /// 1-based period index.
    pub period: u32,
    /// Revenue waterfall output.
    pub revenue: WaterfallPass,
    /// Redemption waterfall output.
    pub redemption: WaterfallPass,
}

/// A securitization deal: its entities, the two waterfalls that pay them,
/// and the per-period waterfall history.
#[derive(Debug, Clone)]
pub struct Deal {
    /// Deal name, e.g. "RR25-1".
    name: String,
    /// How redemption cash is split across tranches.
    repayment_structure: RepaymentStructure,
    /// Everything the waterfalls pay.
    entities: DealEntities,
    /// Fees, reserve and tranche interest.
    revenue: Waterfall,
    /// Tranche principal.
    redemption: Waterfall,
    /// One revenue run per committed period.
    history_revenue: Vec<WaterfallRun>,
    /// One redemption run per committed period.
    history_redemption: Vec<WaterfallRun>,
}

impl Deal {
    /// Start building a deal called `name`.
    pub fn builder(name: impl Into<String>) -> DealBuilder {
        DealBuilder::new(name)
    }

    /// Deal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How redemption cash is split across tranches.
    pub fn repayment_structure(&self) -> RepaymentStructure {
        self.repayment_structure
    }

    /// Everything the waterfalls pay.
    pub fn entities(&self) -> &DealEntities {
        &self.entities
    }

    /// Tranches in configuration order.
    pub fn tranches(&self) -> &[Tranche] {
        &self.entities.tranches
    }

    /// Tranche by name.
    pub fn tranche(&self, name: &str) -> Option<&Tranche> {
        self.entities.tranches.iter().find(|t| t.name() == name)
    }

    /// Fees in configuration order.
    pub fn fees(&self) -> &[Fee] {
        &self.entities.fees
    }

    /// Fee by name.
    pub fn fee(&self, name: &str) -> Option<&Fee> {
        self.entities.fees.iter().find(|f| f.name() == name)
    }

    /// The deal's reserve, if configured.
    pub fn reserve(&self) -> Option<&Reserve> {
        self.entities.reserve.as_ref()
    }

    /// Limbs paid from revenue collections.
    pub fn revenue_waterfall(&self) -> &Waterfall {
        &self.revenue
    }

    /// Limbs paid from redemption collections.
    pub fn redemption_waterfall(&self) -> &Waterfall {
        &self.redemption
    }

    /// Sum of tranche balances at closing.
    pub fn total_initial_balance(&self) -> Decimal {
        self.entities.tranches.iter().map(|t| t.initial_balance()).sum()
    }

    /// Sum of tranche balances after the last recorded period.
    pub fn total_current_balance(&self) -> Decimal {
        self.entities
            .tranches
            .iter()
            .map(|t| t.last_period_ending_balance())
            .sum()
    }

    /// Reserve cash released into the next period's revenue.
    pub fn released_reserve(&self) -> Decimal {
        self.entities
            .reserve
            .as_ref()
            .map_or(Decimal::ZERO, |r| r.last_period_balance())
    }

    /// Number of committed periods.
    pub fn periods_run(&self) -> u32 {
        self.history_revenue.len() as u32
    }

    /// Revenue runs, oldest first.
    pub fn history_revenue(&self) -> &[WaterfallRun] {
        &self.history_revenue
    }

    /// Redemption runs, oldest first.
    pub fn history_redemption(&self) -> &[WaterfallRun] {
        &self.history_redemption
    }

    /// Revenue waterfall results for a 1-indexed period.
    pub fn revenue_run(&self, period: u32) -> Option<&WaterfallRun> {
        self.history_revenue.iter().find(|r| r.period == period)
    }

    /// Redemption waterfall results for a 1-indexed period.
    pub fn redemption_run(&self, period: u32) -> Option<&WaterfallRun> {
        self.history_redemption.iter().find(|r| r.period == period)
    }

    /// Fold a staged period into entity state and deal history.
    ///
    /// Every settlement is resolved before the first one is applied, so a
    /// bad reference leaves the deal exactly as it was. Revenue settles
    /// before redemption: interest records read the opening balance.
    pub(crate) fn commit(&mut self, batch: PeriodBatch) -> EngineResult<()> {
        let PeriodBatch {
            period,
            revenue,
            redemption,
        } = batch;

        for settlement in revenue.settlements.iter().chain(&redemption.settlements) {
            self.entities.obligation(&settlement.limb)?;
        }

        if let Some(reserve) = self.entities.reserve.as_mut() {
            reserve.release();
        }
        for (kind, pass) in [
            (WaterfallKind::Revenue, &revenue),
            (WaterfallKind::Redemption, &redemption),
        ] {
            for settlement in &pass.settlements {
                self.entities
                    .obligation_mut(&settlement.limb)?
                    .update_history(period, kind, &settlement.outcome);
            }
        }

        self.history_revenue.push(revenue.run);
        self.history_redemption.push(redemption.run);
        Ok(())
    }
}

/// Builder for [`Deal`]. All validation happens in [`DealBuilder::build`].
///
/// # Examples
///
/// ```
/// use waterfall_engine::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let deal = Deal::builder("demo")
///     .tranche(
///         Tranche::new("A", dec!(100_000_000), dec!(0), dec!(0.011), PaymentFrequency::Quarterly)
///             .unwrap(),
///     )
///     .revenue_limb(1, LimbRef::tranche_interest("A"))
///     .redemption_limb(1, LimbRef::tranche_principal("A"))
///     .build()
///     .unwrap();
/// assert_eq!(deal.total_initial_balance(), dec!(100_000_000));
/// ```
#[derive(Debug, Clone)]
pub struct DealBuilder {
    name: String,
    repayment_structure: RepaymentStructure,
    tranches: Vec<Tranche>,
    fees: Vec<Fee>,
    reserve: Option<Reserve>,
    revenue: Vec<(u32, LimbRef)>,
    redemption: Vec<(u32, LimbRef)>,
}

impl DealBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repayment_structure: RepaymentStructure::Sequential,
            tranches: Vec::new(),
            fees: Vec::new(),
            reserve: None,
            revenue: Vec::new(),
            redemption: Vec::new(),
        }
    }

    pub fn repayment_structure(mut self, structure: RepaymentStructure) -> Self {
        self.repayment_structure = structure;
        self
    }

    /// Add a tranche. List order is seniority order for sequential paydown.
    pub fn tranche(mut self, tranche: Tranche) -> Self {
        self.tranches.push(tranche);
        self
    }

    pub fn fee(mut self, fee: Fee) -> Self {
        self.fees.push(fee);
        self
    }

    pub fn reserve(mut self, reserve: Reserve) -> Self {
        self.reserve = Some(reserve);
        self
    }

    /// Pay `limb` from revenue at `priority`, lowest first.
    pub fn revenue_limb(mut self, priority: u32, limb: LimbRef) -> Self {
        self.revenue.push((priority, limb));
        self
    }

    pub fn redemption_limb(mut self, priority: u32, limb: LimbRef) -> Self {
        self.redemption.push((priority, limb));
        self
    }

    /// Validate names, limbs and priorities, then assemble the deal.
    pub fn build(self) -> EngineResult<Deal> {
        self.repayment_structure.ensure_supported()?;
        ensure_unique("tranche", self.tranches.iter().map(|t| t.name()))?;
        ensure_unique("fee", self.fees.iter().map(|f| f.name()))?;

        let revenue = Waterfall::new(WaterfallKind::Revenue, self.revenue)?;
        let redemption = Waterfall::new(WaterfallKind::Redemption, self.redemption)?;

        let entities = DealEntities {
            tranches: self.tranches,
            fees: self.fees,
            reserve: self.reserve,
        };
        for (_, limb) in revenue.limbs().iter().chain(redemption.limbs()) {
            entities.obligation(limb)?;
        }

        Ok(Deal {
            name: self.name,
            repayment_structure: self.repayment_structure,
            entities,
            revenue,
            redemption,
            history_revenue: Vec::new(),
            history_redemption: Vec::new(),
        })
    }
}

fn ensure_unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> EngineResult<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(WaterfallError::config(format!("duplicate {what} name: {name}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fee::FeeConfig;
    use crate::core::frequency::PaymentFrequency;
    use crate::core::reserve::ReserveBasis;
    use rust_decimal_macros::dec;

    fn tranche(name: &str, balance: Decimal) -> Tranche {
        Tranche::new(name, balance, dec!(0), dec!(0.011), PaymentFrequency::Quarterly).unwrap()
    }

    fn base() -> DealBuilder {
        Deal::builder("test")
            .tranche(tranche("A", dec!(100_000_000)))
            .tranche(tranche("B", dec!(50_000_000)))
            .fee(Fee::new(
                "servicer",
                FeeConfig::DollarAmount(dec!(250)),
                PaymentFrequency::Quarterly,
            ))
            .reserve(
                Reserve::new("reserve", dec!(0.01), ReserveBasis::AggregateTrancheBalance, dec!(0))
                    .unwrap(),
            )
            .revenue_limb(1, LimbRef::fee("servicer"))
            .revenue_limb(2, LimbRef::tranche_interest("A"))
            .revenue_limb(3, LimbRef::reserve("reserve"))
            .redemption_limb(1, LimbRef::tranche_principal("A"))
            .redemption_limb(2, LimbRef::tranche_principal("B"))
    }

    #[test]
    fn test_build_and_query() {
        let deal = base().build().unwrap();
        assert_eq!(deal.name(), "test");
        assert_eq!(deal.total_initial_balance(), dec!(150_000_000));
        assert_eq!(deal.total_current_balance(), dec!(150_000_000));
        assert_eq!(deal.periods_run(), 0);
        assert!(deal.tranche("B").is_some());
        assert!(deal.fee("servicer").is_some());
        assert_eq!(deal.revenue_waterfall().limbs().len(), 3);
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = base().revenue_limb(9, LimbRef::fee("trustee")).build().unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));

        let err = base()
            .redemption_limb(9, LimbRef::tranche_principal("C"))
            .build()
            .unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));
    }

    #[test]
    fn test_reserve_limb_requires_matching_reserve() {
        let err = Deal::builder("no reserve")
            .tranche(tranche("A", dec!(1_000)))
            .revenue_limb(1, LimbRef::reserve("reserve"))
            .build()
            .unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = base().tranche(tranche("A", dec!(1))).build().unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_priority_rejected() {
        let err = base().revenue_limb(2, LimbRef::tranche_interest("B")).build().unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));
    }

    #[test]
    fn test_limb_paid_twice_rejected() {
        let err = base()
            .redemption_limb(3, LimbRef::tranche_principal("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));

        let err = base().revenue_limb(4, LimbRef::fee("servicer")).build().unwrap_err();
        assert!(matches!(err, WaterfallError::Configuration(_)));
    }

    #[test]
    fn test_reverse_sequential_rejected_at_build() {
        let err = base()
            .repayment_structure(RepaymentStructure::ReverseSequential)
            .build()
            .unwrap_err();
        assert!(matches!(err, WaterfallError::NotImplemented(_)));
    }
}
