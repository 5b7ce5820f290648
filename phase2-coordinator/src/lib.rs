pub mod commands;
pub mod coordinator;
pub mod environment;
pub mod logger;
pub mod objects;
pub mod scheduler;
pub mod storage;
pub mod verification;

pub use coordinator::*;


#[cfg(test)]
mod tests;
