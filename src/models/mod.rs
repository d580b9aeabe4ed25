pub mod optimization;
pub mod price;

pub use optimization::*;
pub use price::*;
