// src/utils/mod.rs
pub mod config;
pub mod db_connect;
pub mod env;
pub mod helpers;
