// src/lib.rs

//! weekplan: imports setup, launch, revision and meeting assignments from
//! three web applications and merges them into one placed working week.

pub mod error;
pub mod extract;
pub mod models;
pub mod page;
pub mod parser;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
