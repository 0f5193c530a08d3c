//! Services shared by the server and clients

mod database;

pub use database::DatabaseService;
