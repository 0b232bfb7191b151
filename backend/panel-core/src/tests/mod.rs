mod callback;
mod config;
mod error_location;
mod handler_table;
mod process_table;
mod raw_engine;
mod repository;
mod session;
mod socket;
mod store;
mod transaction;
