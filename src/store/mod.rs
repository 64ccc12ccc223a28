//! Session store implementations

mod in_flight;
mod persistent;
mod pruning;
mod traits;

pub use persistent::PersistentStore;
pub use pruning::ErrorHandler;
pub use traits::SessionStore;

#[cfg(test)]
mod tests;
