//! Library crate for brainy-brawls, the headless player companion: join an
//! event, follow its rounds and questions, answer as a team and watch the
//! leaderboard. Exposes modules for the binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
