pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod player;
pub mod servers;
pub mod storage;
pub mod theme;
