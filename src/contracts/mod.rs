pub mod gas_optimizer;

pub use gas_optimizer::*;
