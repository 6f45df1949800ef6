pub mod account;
pub mod api;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod format;
pub mod guard;
pub mod models;
pub mod session;
pub mod storage;
