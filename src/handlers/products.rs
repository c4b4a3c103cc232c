use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{Product, ProductFields},
    AppState,
};

const NOT_FOUND: &str = "Product not found";

/// Reads the leading integer of a path segment: `" 7"`, `"7abc"` and `"7.5"`
/// all address product 7. Segments without leading digits can never match a
/// stored product, so they are reported as missing rather than malformed.
fn parse_id(raw: &str) -> AppResult<i64> {
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(&['+', '-'][..]));
    let digits_len = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return Err(not_found());
    }
    trimmed[..sign_len + digits_len]
        .parse()
        .map_err(|_| not_found())
}

fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND.to_string())
}

fn parse_body(body: &Bytes) -> AppResult<ProductFields> {
    ProductFields::from_json_bytes(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Vec<Product>>)> {
    let products = state.store.list().await?;

    info!(count = products.len(), "Listed products");

    Ok((StatusCode::OK, Json(products)))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_product(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Product>)> {
    let fields = parse_body(&body)?;
    let product = state.store.add(fields).await?;

    info!(id = product.id, "Created product");

    Ok((StatusCode::CREATED, Json(product)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let id = parse_id(&id)?;
    let product = state.store.get_by_id(id).await?.ok_or_else(not_found)?;

    info!(id, "Fetched product");

    Ok((StatusCode::OK, Json(product)))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Product>)> {
    let id = parse_id(&id)?;
    let changes = parse_body(&body)?;
    let product = state.store.update(id, changes).await?.ok_or_else(not_found)?;

    info!(id, "Updated product");

    Ok((StatusCode::OK, Json(product)))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    if !state.store.remove(id).await? {
        return Err(not_found());
    }

    info!(id, "Deleted product");

    Ok((StatusCode::OK, Json(json!({ "message": "Product deleted" }))))
}
