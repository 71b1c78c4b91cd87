use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    products::{
        self, BulkError,
        store::{self, ListProductsParams, ProductCursor, ProductStoreError},
    },
    state::AppState,
    types::{
        BulkDeleteRequest, BulkDeleteResponse, BulkUpdateRequest, BulkUpdateResponse,
        CreateProductRequest, ListProductsResponse, Product, ProductStatus, UpdateProductRequest,
    },
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    limit: Option<i64>,
    before: Option<String>,
    status: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    updated_at: String,
    id: String,
}

pub async fn list_products_handler(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ListProductsResponse>, ApiError> {
    let limit = parse_limit(query.limit)?;
    let before = match query.before {
        Some(raw) => Some(decode_cursor(&raw)?),
        None => None,
    };
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            ProductStatus::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown status: {raw}")))?,
        ),
        None => None,
    };
    let search = query
        .search
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty());

    let params = ListProductsParams {
        limit,
        before,
        status,
        search,
    };

    let result = store::list_products(&state.pool, &params)
        .await
        .map_err(map_store_error)?;

    let next_before = match result.next_before {
        Some(cursor) => Some(encode_cursor(&cursor)?),
        None => None,
    };

    Ok(Json(ListProductsResponse {
        products: result.products,
        next_before,
    }))
}

pub async fn create_product_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if req.sku.trim().is_empty() {
        return Err(ApiError::validation("sku is required"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let product = store::create_product(&state.pool, &req)
        .await
        .map_err(map_store_error)?;

    state.bus.product_created(&product).await;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = store::get_product(&state.pool, id)
        .await
        .map_err(map_store_error)?;
    Ok(Json(product))
}

pub async fn update_product_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    if req.sku.as_deref().is_some_and(|sku| sku.trim().is_empty()) {
        return Err(ApiError::validation("sku must be non-empty"));
    }
    if req
        .name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ApiError::validation("name must be non-empty"));
    }

    let product = store::update_product(&state.pool, id, &req)
        .await
        .map_err(map_store_error)?;

    state.bus.product_updated(&product).await;

    Ok(Json(product))
}

pub async fn delete_product_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = store::delete_product(&state.pool, id)
        .await
        .map_err(map_store_error)?;

    state.bus.product_deleted(&product).await;

    Ok(Json(product))
}

pub async fn bulk_update_handler(
    State(state): State<AppState>,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<(StatusCode, Json<BulkUpdateResponse>), ApiError> {
    if req.updates.is_empty() {
        return Err(ApiError::validation("updates must be non-empty"));
    }

    let response = products::bulk_update(&state.pool, &state.bus, &state.queue, &req)
        .await
        .map_err(map_bulk_error)?;

    let status = match &response {
        BulkUpdateResponse::Completed(_) => StatusCode::OK,
        BulkUpdateResponse::Accepted(_) => StatusCode::ACCEPTED,
    };

    Ok((status, Json(response)))
}

pub async fn bulk_delete_handler(
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<(StatusCode, Json<BulkDeleteResponse>), ApiError> {
    if !req.delete_all && req.ids.is_empty() {
        return Err(ApiError::validation("provide ids or set delete_all"));
    }

    let response = products::bulk_delete(&state.pool, &state.bus, &state.queue, &req)
        .await
        .map_err(map_bulk_error)?;

    let status = match &response {
        BulkDeleteResponse::Completed(_) => StatusCode::OK,
        BulkDeleteResponse::Accepted(_) => StatusCode::ACCEPTED,
    };

    Ok((status, Json(response)))
}

fn parse_limit(limit: Option<i64>) -> Result<i64, ApiError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(value) if (1..=MAX_LIMIT).contains(&value) => Ok(value),
        Some(_) => Err(ApiError::validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
    }
}

fn encode_cursor(cursor: &ProductCursor) -> Result<String, ApiError> {
    let payload = CursorPayload {
        updated_at: cursor.updated_at.clone(),
        id: cursor.id.to_string(),
    };
    let bytes = serde_json::to_vec(&payload)
        .map_err(|err| ApiError::internal(format!("failed to encode cursor: {err}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn decode_cursor(raw: &str) -> Result<ProductCursor, ApiError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|_| ApiError::validation("invalid before cursor"))?;
    let payload: CursorPayload =
        serde_json::from_slice(&bytes).map_err(|_| ApiError::validation("invalid before cursor"))?;
    let id = Uuid::parse_str(&payload.id).map_err(|_| ApiError::validation("invalid before cursor"))?;
    Ok(ProductCursor {
        updated_at: payload.updated_at,
        id,
    })
}

fn map_store_error(err: ProductStoreError) -> ApiError {
    match err {
        ProductStoreError::NotFound => ApiError::not_found("product not found"),
        ProductStoreError::Conflict(message) => ApiError::Conflict(message),
        ProductStoreError::Db(db) => ApiError::Db(db),
        ProductStoreError::Parse(message) => ApiError::Internal(message),
    }
}

fn map_bulk_error(err: BulkError) -> ApiError {
    match err {
        BulkError::Store(store_err) => map_store_error(store_err),
        BulkError::Tracker(tracker_err) => ApiError::internal(tracker_err.to_string()),
        BulkError::Queue(queue_err) => ApiError::internal(queue_err.to_string()),
    }
}
