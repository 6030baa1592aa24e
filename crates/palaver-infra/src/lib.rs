//! Infrastructure adapters: SQLite session store, OpenAI-compatible
//! completion backends, config file loading.

pub mod config;
pub mod openai;
pub mod sqlite;
