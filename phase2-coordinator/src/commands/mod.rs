pub mod contribution;
pub(crate) use contribution::*;

pub mod initialization;
pub(crate) use initialization::*;
