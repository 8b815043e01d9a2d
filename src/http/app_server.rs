use crate::http::controllers::{counter_handler, health_handler, stats_handler};
use crate::ClickEngine;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub struct AppServer {
    pub router: Router,
    pub engine: Arc<ClickEngine>,
}

pub const PATH_COUNTER: &str = "/counter/{banner_id}";
pub const PATH_STATS: &str = "/stats/{banner_id}";
pub const PATH_HEALTH: &str = "/health";

impl AppServer {
    pub fn new(engine: ClickEngine) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    pub fn with_engine(engine: Arc<ClickEngine>) -> Self {
        AppServer {
            router: Router::new()
                .route(PATH_COUNTER, get(counter_handler))
                .route(PATH_STATS, post(stats_handler))
                .route(PATH_HEALTH, get(health_handler))
                .with_state(engine.clone()),
            engine,
        }
    }
}
