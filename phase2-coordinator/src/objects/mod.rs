pub mod artifact;
pub use artifact::*;

pub mod audit;
pub use audit::*;

pub mod connection;
pub use connection::*;

pub mod queue;
pub use queue::*;

pub mod submission;
pub use submission::*;
