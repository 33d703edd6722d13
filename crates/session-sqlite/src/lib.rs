//! SQLite-backed session store.

mod open;
mod query;
mod schema;
mod store;

pub use open::Db;
pub use store::SqliteSessionStore;
