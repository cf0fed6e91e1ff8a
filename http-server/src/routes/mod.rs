pub mod coins;
pub mod gifts;
pub mod users;
