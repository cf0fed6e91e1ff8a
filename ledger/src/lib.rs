pub mod catalog;
pub mod error;
pub mod ledger;
pub mod types;
