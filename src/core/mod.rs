pub mod context;
pub mod error;
pub mod fee;
pub mod frequency;
pub mod obligation;
pub mod reserve;
pub mod tranche;
