use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::geo::parse_point;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order).get(list_orders))
        .route("/orders/:id", get(get_order).patch(take_order))
}

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub origin: Vec<String>,
    pub destination: Vec<String>,
}

#[derive(Deserialize)]
pub struct TakeOrderRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct TakeOrderResponse {
    pub status: &'static str,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl TryFrom<PageParams> for Page {
    type Error = AppError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        let page: i64 = params
            .page
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| AppError::BadRequest("Invalid page provided".to_string()))?;
        let limit: i64 = params
            .limit
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| AppError::BadRequest("Invalid limit provided".to_string()))?;

        if page < 1 {
            return Err(AppError::BadRequest(
                "page should be greater or equal to 1".to_string(),
            ));
        }
        if limit < 0 {
            return Err(AppError::BadRequest(
                "limit should be greater or equal to 0".to_string(),
            ));
        }

        let out_of_range = || AppError::BadRequest("page or limit too large".to_string());
        let limit = u32::try_from(limit).map_err(|_| out_of_range())?;
        let offset = (page - 1)
            .checked_mul(i64::from(limit))
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or_else(out_of_range)?;

        Ok(Page { offset, limit })
    }
}

fn parse_order_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
        .ok_or_else(|| AppError::BadRequest("order_id must be an integer".to_string()))
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Json(payload) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;

    let origin = parse_point(&payload.origin)
        .map_err(|msg| AppError::BadRequest(format!("invalid origin: {msg}")))?;
    let destination = parse_point(&payload.destination)
        .map_err(|msg| AppError::BadRequest(format!("invalid destination: {msg}")))?;

    let order = state.orders.place(origin, destination).await?;
    Ok(Json(order))
}

async fn take_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<TakeOrderRequest>, JsonRejection>,
) -> Result<Json<TakeOrderResponse>, AppError> {
    let id = parse_order_id(&id)?;
    let order = state.orders.get_by_id(id).await?;

    let Json(payload) =
        payload.map_err(|_| AppError::BadRequest("Invalid json provided".to_string()))?;
    if payload.status != OrderStatus::Taken.as_str() {
        return Err(AppError::BadRequest(format!(
            "status must be {}",
            OrderStatus::Taken
        )));
    }

    state.orders.take_order(order).await?;
    debug!(order_id = id, "order taken via api");

    Ok(Json(TakeOrderResponse { status: "SUCCESS" }))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.orders.get_by_id(id).await?))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Vec<Order>>, AppError> {
    let Query(params) = params.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let page = Page::try_from(params)?;

    let orders = state.orders.list_orders(page.offset, page.limit).await?;
    debug!(
        offset = page.offset,
        limit = page.limit,
        order_count = orders.len(),
        "listed orders"
    );
    Ok(Json(orders))
}
