// src/lib.rs
pub mod autoconnect;
pub mod channel;
pub mod config;
pub mod context;
pub mod handlers;
pub mod models;
pub mod notices;
pub mod scanner;
pub mod selection;
pub mod steam;
pub mod storage;
pub mod utils;
