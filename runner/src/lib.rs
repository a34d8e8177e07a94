pub mod config;
pub mod connection;
pub mod executors;
pub mod inputs;
pub mod materials;
pub mod permutations;
pub mod progress;
pub mod reconcile;
pub mod runner;
pub mod study;
pub mod summary;
