mod checkins;
mod health;
mod services;

use actix_web::web;
use serde::Deserialize;

macros_utils::routes! {
    module health,
    module checkins,
    module services,
}

/// Every route together with the extractor settings they answer with
pub fn configure(cfg: &mut web::ServiceConfig) {
    crate::error::extractor_configs(cfg);
    routes(cfg);
}

const DEFAULT_LIMIT: usize = 32;
const MAX_LIMIT: usize = 256;

/// `?limit=` on history endpoints
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}
