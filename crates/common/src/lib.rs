pub mod config;
pub mod db;
pub mod fetch;
pub mod observability;
pub mod polymarket;
pub mod positions;
pub mod series;
pub mod store;
pub mod types;
