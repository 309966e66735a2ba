pub mod database;
pub mod user;

pub use database::{InMemoryStorage, Outgoing, Tables, TradeRecord};
pub use user::{AuthenticatedUser, PublicProfile, User};
