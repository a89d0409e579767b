pub mod manager;
pub mod state;
pub mod validate;

pub use manager::{AlterSpec, CollectionHandle, CollectionManager, UnionQuery, UnionResult};
pub use state::CollectionState;
