//! Weekly meal planner: a day-document store with a JSON API, and the
//! client-side view-model that mirrors it.

pub mod app;
pub mod client;
pub mod config;
pub mod db;
pub mod days;
pub mod error;
pub mod state;
pub mod store;
