// src/lib.rs
pub mod canonical;
pub mod clustering;
pub mod matching;
pub mod models;
pub mod storage;
pub mod utils;
pub mod writers;
