mod customer;
mod link;
mod serial;

pub use customer::*;
pub use link::*;
pub use serial::*;
