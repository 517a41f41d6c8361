pub mod config;
pub mod delegate;
pub mod error;
pub mod mcp;
pub mod notify;
pub mod registry;
pub mod roots;
pub mod supervisor;
pub mod tools;
