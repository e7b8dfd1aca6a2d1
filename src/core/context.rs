use crate::core::error::{EngineResult, WaterfallError};
use crate::core::obligation::WaterfallKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw collections reported for one payment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInput {
    /// Interest and other revenue collected from the pool.
    pub revenue_collections: Decimal,
    /// Scheduled and unscheduled principal collected from the pool.
    pub redemption_collections: Decimal,
    /// Outstanding collateral balance for the period.
    pub pool_balance: Decimal,
}

impl PeriodInput {
    /// Collections for one period.
    pub fn new(
        revenue_collections: Decimal,
        redemption_collections: Decimal,
        pool_balance: Decimal,
    ) -> Self {
        Self {
            revenue_collections,
            redemption_collections,
            pool_balance,
        }
    }

    /// All three amounts must be non-negative.
    pub fn validate(&self) -> EngineResult<()> {
        let fields = [
            ("revenue_collections", self.revenue_collections),
            ("redemption_collections", self.redemption_collections),
            ("pool_balance", self.pool_balance),
        ];
        for (field, value) in fields {
            if value < Decimal::ZERO {
                return Err(WaterfallError::InvalidInput {
                    field: field.to_string(),
                    reason: format!("must be non-negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Working record for a single period.
///
/// Built fresh by the orchestrator from the raw [`PeriodInput`] plus the
/// deal's carried state, consumed in place by the waterfalls, and dropped
/// once the period is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentContext {
    /// Raw collections for the period.
    input: PeriodInput,
    /// Reserve balance swept into revenue.
    released_reserve: Decimal,
    /// Sum of tranche balances before this period.
    prior_tranche_balance: Decimal,
    /// Revenue cash not yet paid out.
    available_revenue: Decimal,
    /// Redemption cash not yet paid out.
    available_redemption: Decimal,
    /// Principal target per tranche name.
    principal_allocations: BTreeMap<String, Decimal>,
}

impl PaymentContext {
    /// Prepare a context: the released reserve balance is swept into
    /// available revenue cash, redemption cash is the raw collections.
    pub fn new(
        input: PeriodInput,
        released_reserve: Decimal,
        prior_tranche_balance: Decimal,
    ) -> Self {
        Self {
            available_revenue: input.revenue_collections + released_reserve,
            available_redemption: input.redemption_collections,
            input,
            released_reserve,
            prior_tranche_balance,
            principal_allocations: BTreeMap::new(),
        }
    }

    /// Builder form of [`PaymentContext::set_allocations`].
    pub fn with_allocations(mut self, allocations: BTreeMap<String, Decimal>) -> Self {
        self.principal_allocations = allocations;
        self
    }

    /// Replace the per-tranche principal targets.
    pub fn set_allocations(&mut self, allocations: BTreeMap<String, Decimal>) {
        self.principal_allocations = allocations;
    }

    /// Raw collections for the period.
    pub fn input(&self) -> &PeriodInput {
        &self.input
    }

    /// Collateral balance for the period.
    pub fn pool_balance(&self) -> Decimal {
        self.input.pool_balance
    }

    /// Reserve balance swept into revenue.
    pub fn released_reserve(&self) -> Decimal {
        self.released_reserve
    }

    /// Sum of all tranches' ending balances from the previous period.
    pub fn prior_tranche_balance(&self) -> Decimal {
        self.prior_tranche_balance
    }

    /// Cash left in `kind`'s pool.
    pub fn available_cash(&self, kind: WaterfallKind) -> Decimal {
        match kind {
            WaterfallKind::Revenue => self.available_revenue,
            WaterfallKind::Redemption => self.available_redemption,
        }
    }

    /// Remove `amount` from the pool, flooring at zero. Returns the new balance.
    pub fn consume(&mut self, kind: WaterfallKind, amount: Decimal) -> Decimal {
        let pool = match kind {
            WaterfallKind::Revenue => &mut self.available_revenue,
            WaterfallKind::Redemption => &mut self.available_redemption,
        };
        *pool = (*pool - amount).max(Decimal::ZERO);
        *pool
    }

    /// Principal target for a tranche, if the allocator assigned one.
    pub fn principal_allocation(&self, tranche: &str) -> Option<Decimal> {
        self.principal_allocations.get(tranche).copied()
    }

    /// Every principal target, keyed by tranche name.
    pub fn principal_allocations(&self) -> &BTreeMap<String, Decimal> {
        &self.principal_allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reserve_swept_into_revenue() {
        let input = PeriodInput::new(dec!(1_000_000), dec!(1_500_000), dec!(150_000_000));
        let ctx = PaymentContext::new(input, dec!(1_500_000), dec!(150_000_000));
        assert_eq!(ctx.available_cash(WaterfallKind::Revenue), dec!(2_500_000));
        assert_eq!(ctx.available_cash(WaterfallKind::Redemption), dec!(1_500_000));
    }

    #[test]
    fn test_consume_floors_at_zero() {
        let input = PeriodInput::new(dec!(100), dec!(50), dec!(1_000));
        let mut ctx = PaymentContext::new(input, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(ctx.consume(WaterfallKind::Revenue, dec!(40)), dec!(60));
        assert_eq!(ctx.consume(WaterfallKind::Revenue, dec!(500)), Decimal::ZERO);
        // the other pool is untouched
        assert_eq!(ctx.available_cash(WaterfallKind::Redemption), dec!(50));
    }

    #[test]
    fn test_missing_allocation_is_none() {
        let input = PeriodInput::new(dec!(0), dec!(0), dec!(0));
        let ctx = PaymentContext::new(input, Decimal::ZERO, Decimal::ZERO)
            .with_allocations(BTreeMap::from([("A".to_string(), dec!(10))]));
        assert_eq!(ctx.principal_allocation("A"), Some(dec!(10)));
        assert_eq!(ctx.principal_allocation("B"), None);
    }

    #[test]
    fn test_negative_input_rejected() {
        let input = PeriodInput::new(dec!(-1), dec!(0), dec!(0));
        let err = input.validate().unwrap_err();
        assert!(matches!(
            err,
            WaterfallError::InvalidInput { ref field, .. } if field == "revenue_collections"
        ));
        assert!(PeriodInput::new(dec!(0), dec!(0), dec!(0)).validate().is_ok());
    }
}
