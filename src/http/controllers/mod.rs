pub mod counter_controller;
pub mod health_controller;
pub mod stats_controller;

pub use counter_controller::counter_handler;
pub use health_controller::health_handler;
pub use stats_controller::stats_handler;
