//! Backend collaborator contract
//!
//! The store talks to the database exclusively through [`SessionBackend`],
//! the ORM-shaped CRUD surface over a sessions model.

mod memory;
mod traits;

pub use memory::MemoryBackend;
pub use traits::{RowFilter, SessionBackend, SessionRow};
