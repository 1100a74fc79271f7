use std::sync::Arc;

use crate::application::search::SearchService;
use crate::application::trending::TrendingService;
use crate::application::upstream::BearerToken;

#[derive(Clone)]
pub struct ApiState {
    pub trending: Arc<TrendingService>,
    pub search: Arc<SearchService>,
    /// Credential attached to every upstream listing call.
    pub credential: BearerToken,
}
