//! Service facades shared by the Chairside interfaces

mod store;

pub use store::{EntityCounts, StoreService};
