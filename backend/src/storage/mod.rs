//! # Storage Module
//!
//! Data persistence for the gym backend: a single embedded SQLite database
//! reached through one serialized connection, plus one repository per table
//! family. Schema changes go through the versioned migration list in
//! [`connection`]; nothing else issues DDL.

pub mod connection;
pub mod repositories;

pub use connection::DbConnection;
