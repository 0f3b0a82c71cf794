//! Headless front end: one pet, one live brain stream, summarized per batch.

pub mod session;
pub mod summary;

pub use session::Session;
pub use summary::BatchSummary;
