//! Shared state handed to every connection handler.

use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::source::MetricSource;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn MetricSource>,
    pub broadcaster: Broadcaster,
}
