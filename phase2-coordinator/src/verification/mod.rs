pub mod dummy;
pub use dummy::*;

pub mod verifier;
pub use verifier::*;
