//! # waterfall-engine
//!
//! Securitization cash-flow waterfall engine.
//!
//! At each payment date a deal's revenue and redemption collections are
//! distributed, in strict priority order, across fees, a cash reserve and
//! the interest and principal of its debt tranches. Whatever is left over
//! flows to the residual (`excess_spread` or `surplus`).
//!
//! ## Architecture
//!
//! - **core**: Tranches, fees, the reserve, the obligation trait, period context and errors
//! - **distribution**: Interest accrual, principal allocation, the ordered waterfall
//! - **engine**: Deal aggregate, period orchestrator, JSON configuration, reporting
//! - **simulation**: Seeded collection scenarios for an amortizing pool

pub mod core;
pub mod distribution;
pub mod engine;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::context::PeriodInput;
    pub use crate::core::error::{EngineResult, WaterfallError};
    pub use crate::core::fee::{Fee, FeeConfig};
    pub use crate::core::frequency::PaymentFrequency;
    pub use crate::core::obligation::{LimbRef, Obligation, WaterfallKind};
    pub use crate::core::reserve::{Reserve, ReserveBasis};
    pub use crate::core::tranche::{ArrearsPolicy, Tranche};
    pub use crate::distribution::allocation::RepaymentStructure;
    pub use crate::distribution::waterfall::WaterfallRun;
    pub use crate::engine::config::{DealConfig, PeriodsFile};
    pub use crate::engine::deal::Deal;
    pub use crate::engine::report::DealSummary;
    pub use crate::engine::runner::{run_all_periods, PeriodOutcome, WaterfallEngine};
}
