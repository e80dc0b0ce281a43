#[derive(Debug, Deserialize, Default)]
struct ListTerritoriesQuery {
    min_latitude: Option<f64>,
    max_latitude: Option<f64>,
    min_longitude: Option<f64>,
    max_longitude: Option<f64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TerritoryListResponse {
    schema_version: String,
    territories: Vec<Territory>,
}

fn bounds_from(query: &ListTerritoriesQuery) -> Result<Option<GeoBounds>, HttpApiError> {
    match (
        query.min_latitude,
        query.max_latitude,
        query.min_longitude,
        query.max_longitude,
    ) {
        (None, None, None, None) => Ok(None),
        (Some(min_latitude), Some(max_latitude), Some(min_longitude), Some(max_longitude)) => {
            Ok(Some(GeoBounds {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            }))
        }
        _ => Err(HttpApiError::invalid_query(
            "bounding filter requires all four of min/max latitude/longitude",
            None,
        )),
    }
}

async fn list_territories(
    State(state): State<AppState>,
    Query(query): Query<ListTerritoriesQuery>,
) -> Result<Json<TerritoryListResponse>, HttpApiError> {
    let bounds = bounds_from(&query)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);

    let territories = {
        let api = state.inner.lock().await;
        api.list_territories(bounds.as_ref(), limit)
    };

    Ok(Json(TerritoryListResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        territories,
    }))
}

async fn get_territory(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Territory>, HttpApiError> {
    let territory = {
        let api = state.inner.lock().await;
        api.get_territory(&territory_id)
            .map_err(HttpApiError::from_domain)?
    };

    Ok(Json(territory))
}

async fn sync_territory(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(descriptor): Json<TerritoryDescriptor>,
) -> Result<Json<Territory>, HttpApiError> {
    if descriptor.territory_id != territory_id {
        return Err(HttpApiError::invalid_query(
            "body territory_id does not match the path",
            Some(format!("path={territory_id} body={}", descriptor.territory_id)),
        ));
    }

    let territory = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.sync_territory(&descriptor).map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(territory))
}

async fn claim_territory(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let message = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.claim(&caller, &territory_id).map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(MessageResponse::new(message)))
}

async fn challenge_territory(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BattleOutcome>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let outcome = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.challenge(&caller, &territory_id)
            .map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(outcome))
}

async fn defend_territory(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, HttpApiError> {
    let caller = require_caller(&headers)?;
    let message = with_deadline(&headers, async {
        let mut api = state.inner.lock().await;
        api.add_defender(&caller, &territory_id)
            .map_err(HttpApiError::from_op)
    })
    .await?;

    Ok(Json(MessageResponse::new(message)))
}

#[derive(Debug, Deserialize, Default)]
struct BattlePageQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BattlePage {
    schema_version: String,
    territory_id: String,
    cursor: usize,
    next_cursor: Option<usize>,
    battles: Vec<BattleRecord>,
}

/// Newest-first page over the append-only battle log for one territory.
async fn get_territory_battles(
    Path(territory_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<BattlePageQuery>,
) -> Result<Json<BattlePage>, HttpApiError> {
    let page = {
        let api = state.inner.lock().await;
        // surface NotFound for unknown territories rather than an empty page
        api.get_territory(&territory_id)
            .map_err(HttpApiError::from_domain)?;
        let records = api.battles_for_territory(&territory_id);
        let (start, end, next_cursor) = paginate(records.len(), query.cursor, query.page_size)?;

        BattlePage {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            territory_id,
            cursor: start,
            next_cursor,
            battles: records[start..end].to_vec(),
        }
    };

    Ok(Json(page))
}
