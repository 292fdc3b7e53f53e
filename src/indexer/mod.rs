//! The indexing engine: four cooperating periodic workers coordinated by a
//! [`supervisor::Supervisor`] (`spec.md` §2, §4.3–§4.7).

pub mod balance_updater;
pub mod block_collector;
pub mod confirmation_updater;
pub mod head_tracker;
pub mod supervisor;

pub use supervisor::Supervisor;
