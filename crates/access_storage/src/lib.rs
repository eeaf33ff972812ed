#![forbid(unsafe_code)]

pub mod repo;
pub mod store;

pub use repo::AccessRequestStore;
pub use store::{
    AccessRequestLedgerEvent, CasOutcome, InMemoryAccessRequestStore, StatusTransition,
    StorageError,
};
