//! Repository layer encapsulating SeaORM operations per table.

pub mod connection;
pub mod journal;
pub mod transaction;
