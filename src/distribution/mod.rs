pub mod accrual;
pub mod allocation;
pub mod waterfall;
