pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod inference;
pub mod pipeline;
pub mod proximity;
pub mod registry;
pub mod routes;
pub mod state;
pub mod storage;
pub mod treatments;
