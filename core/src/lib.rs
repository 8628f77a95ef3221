pub mod activity;
pub mod advisor;
pub mod analytics;
pub mod clock;
pub mod communication;
pub mod config;
pub mod customer;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod executor;
pub mod intervention;
pub mod learning;
pub mod memory;
pub mod notification;
pub mod patterns;
pub mod plan;
pub mod risk_scorer;
pub mod rng;
pub mod seed;
pub mod store;
pub mod types;
