use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use contracts::{
    ApiError, ArenaConfig, BattleOutcome, BattleRecord, Club, ClubFilter, ClubPatch,
    CreateClubRequest, DomainError, ErrorCode, GeoBounds, MemberView, Territory,
    TerritoryDescriptor, UserProfile, SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{ApiOpError, ControlApi, PersistenceError};

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 500;

include!("error.rs");
include!("state.rs");
include!("routes/clubs.rs");
include!("routes/territories.rs");
include!("util.rs");

pub async fn serve(
    addr: SocketAddr,
    config: ArenaConfig,
    sqlite_path: Option<String>,
) -> Result<(), ServerError> {
    let mut api = ControlApi::from_config(config);
    if let Some(path) = sqlite_path.filter(|path| !path.trim().is_empty()) {
        api.attach_sqlite_store(path)?;
    }

    let state = AppState::new(api);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/clubs", post(create_club).get(list_clubs))
        .route("/api/v1/clubs/leave", post(leave_club))
        .route("/api/v1/clubs/{club_id}", get(get_club).patch(update_club))
        .route("/api/v1/clubs/{club_id}/join", post(join_club))
        .route("/api/v1/clubs/{club_id}/members", get(get_members))
        .route(
            "/api/v1/clubs/{club_id}/officers/{user_id}",
            post(promote_officer),
        )
        .route("/api/v1/leaderboard", get(get_leaderboard))
        .route("/api/v1/territories", get(list_territories))
        .route(
            "/api/v1/territories/{territory_id}",
            get(get_territory).put(sync_territory),
        )
        .route(
            "/api/v1/territories/{territory_id}/claim",
            post(claim_territory),
        )
        .route(
            "/api/v1/territories/{territory_id}/challenge",
            post(challenge_territory),
        )
        .route(
            "/api/v1/territories/{territory_id}/defend",
            post(defend_territory),
        )
        .route(
            "/api/v1/territories/{territory_id}/battles",
            get(get_territory_battles),
        )
        .route("/api/v1/users/{user_id}", put(sync_profile))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
