//! Feed API Handlers
//!
//! HTTP surface over the orchestrator. The viewer identity is set upstream by
//! the gateway in `x-user-id`; a missing or malformed header means anonymous.

use actix_web::{get, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FeedRankingError, Result};
use crate::metrics;
use crate::models::{MediaType, PageRequest, RankingMode};
use crate::services::FeedOrchestrator;

pub const VIEWER_HEADER: &str = "x-user-id";

const MAX_QUERY_LEN: usize = 256;

pub struct AppState {
    pub orchestrator: Arc<FeedOrchestrator>,
}

/// Query parameters for GET /home and GET /explore
#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    #[serde(default = "default_page")]
    pub page: u32,
    /// Default 20, max 100
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub mode: RankingMode,
}

/// Query parameters for GET /search
#[derive(Debug, Deserialize)]
pub struct SearchQueryParams {
    pub q: Option<String>,
    pub media_type: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

fn viewer_id(req: &HttpRequest) -> Option<Uuid> {
    let raw = req.headers().get(VIEWER_HEADER)?.to_str().ok()?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            debug!("Ignoring malformed {} header", VIEWER_HEADER);
            None
        }
    }
}

fn page_request(page: u32, limit: u32) -> Result<PageRequest> {
    if limit == 0 {
        return Err(FeedRankingError::InvalidInput(
            "limit must be at least 1".to_string(),
        ));
    }
    Ok(PageRequest::new(page, limit))
}

#[get("/home")]
pub async fn get_home_feed(
    req: HttpRequest,
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = page_request(query.page, query.limit)?;
    let feed = state
        .orchestrator
        .get_home_feed(viewer_id(&req), page, query.mode)
        .await;
    Ok(HttpResponse::Ok().json(feed))
}

#[get("/explore")]
pub async fn get_explore_feed(
    req: HttpRequest,
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = page_request(query.page, query.limit)?;
    let feed = state
        .orchestrator
        .get_explore_feed(viewer_id(&req), page, query.mode)
        .await;
    Ok(HttpResponse::Ok().json(feed))
}

#[get("/search")]
pub async fn search_posts(
    req: HttpRequest,
    query: web::Query<SearchQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let text = query.q.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(FeedRankingError::InvalidInput(
            "q must not be empty".to_string(),
        ));
    }
    if text.len() > MAX_QUERY_LEN {
        return Err(FeedRankingError::InvalidInput(format!(
            "q must be at most {} bytes",
            MAX_QUERY_LEN
        )));
    }

    let media_type = query
        .media_type
        .as_deref()
        .map(MediaType::from_str)
        .transpose()
        .map_err(FeedRankingError::InvalidInput)?;
    let page = page_request(query.page, query.limit)?;

    let results = state
        .orchestrator
        .rank_search_results(viewer_id(&req), text, media_type, page)
        .await;
    Ok(HttpResponse::Ok().json(results))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Routes under `/api/v1/feed` plus `/health` and `/metrics`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .service(
        web::scope("/api/v1/feed")
            .service(get_home_feed)
            .service(get_explore_feed)
            .service(search_posts),
    );
}
