#[derive(Debug, Serialize)]
struct MessageResponse {
    schema_version: String,
    message: String,
}

impl MessageResponse {
    fn new(message: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message,
        }
    }
}

async fn create_club(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateClubRequest>,
) -> Result<Json<Club>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let club = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.create_club(&caller, &request)
            .map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(club))
}

#[derive(Debug, Deserialize, Default)]
struct ListClubsQuery {
    recruiting: Option<bool>,
    joinable_at_level: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ClubListResponse {
    schema_version: String,
    clubs: Vec<Club>,
}

async fn list_clubs(
    State(state): State<AppState>,
    Query(query): Query<ListClubsQuery>,
) -> Result<Json<ClubListResponse>, HttpApiError> {
    let filter = ClubFilter {
        recruiting: query.recruiting,
        joinable_at_level: query.joinable_at_level,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);

    let clubs = {
        let api = state.inner.lock().await;
        api.list_clubs(&filter, limit)
    };

    Ok(Json(ClubListResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        clubs,
    }))
}

async fn get_club(
    Path(club_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Club>, HttpApiError> {
    let club = {
        let api = state.inner.lock().await;
        api.get_club(&club_id).map_err(HttpApiError::from_domain)?
    };

    Ok(Json(club))
}

async fn update_club(
    Path(club_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<ClubPatch>,
) -> Result<Json<Club>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let club = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.update_club(&caller, &club_id, &patch)
            .map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(club))
}

async fn join_club(
    Path(club_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let message = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.join_club(&caller, &club_id).map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(MessageResponse::new(message)))
}

async fn leave_club(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let message = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.leave_club(&caller).map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(MessageResponse::new(message)))
}

#[derive(Debug, Serialize)]
struct MembersResponse {
    schema_version: String,
    club_id: String,
    members: Vec<MemberView>,
}

async fn get_members(
    Path(club_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MembersResponse>, HttpApiError> {
    let members = {
        let api = state.inner.lock().await;
        api.members(&club_id).map_err(HttpApiError::from_domain)?
    };

    Ok(Json(MembersResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        club_id,
        members,
    }))
}

async fn promote_officer(
    Path((club_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Club>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let club = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.promote_officer(&caller, &club_id, &user_id)
            .map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(club))
}

#[derive(Debug, Deserialize, Default)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LeaderboardResponse {
    schema_version: String,
    clubs: Vec<Club>,
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, HttpApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);

    let clubs = {
        let api = state.inner.lock().await;
        api.leaderboard(limit)
    };

    Ok(Json(LeaderboardResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        clubs,
    }))
}

async fn sync_profile(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, HttpApiError> {
    if profile.user_id != user_id {
        return Err(HttpApiError::invalid_query(
            "body user_id does not match the path",
            Some(format!("path={user_id} body={}", profile.user_id)),
        ));
    }

    let synced = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.sync_profile(&profile).map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(synced))
}
