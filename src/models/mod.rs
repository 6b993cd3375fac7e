pub mod callback;
pub mod transaction;
