pub mod config;
mod engine;
pub mod http;
pub mod pipeline;
pub mod store;
pub mod telemetry;

pub use engine::{ClickEngine, ClickEngineBuilder, QueryInputError, StatsQuery};
