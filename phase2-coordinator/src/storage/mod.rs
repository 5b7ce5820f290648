pub mod audit_log;
pub use audit_log::*;

pub mod chain;
pub use chain::*;

pub mod locator;
pub use locator::*;
