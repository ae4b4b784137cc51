use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapter::driver::request_dto::{
    CancelRequestParams, CreateOrderRequest, CreateRefundRequest, LookupQueryParams,
    OrdersQueryParams, QuoteRequest, ShortageActionRequest, UpdateStatusRequest,
};
use crate::adapter::driver::response_dto::{
    OrderCreatedResponse, OrderDetailResponse, OrderSummaryResponse, QuoteResponse,
    RefundResponse, ShortageActionResponse, ValidationResponse,
};
use crate::application::service::{CheckoutService, OrderApplicationService, OrderQueryService};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{Actor, Money, OrderId, OrderNo, OrderStatus, RefundMethod};
use crate::domain::service::QuoteError;

/// スタッフの識別に使うヘッダー（認証は上流で行う）
pub const ADMIN_USER_HEADER: &str = "x-admin-user";

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    /// 見積もり違反の一覧（POLICY_VIOLATION のときのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<QuoteError>>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderApplicationService>,
    pub checkout_service: Arc<CheckoutService>,
    pub order_query_service: Arc<OrderQueryService>,
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/checkout/quote", post(quote))
        .route("/checkout/validate", post(validate))
        .route("/orders", post(create_order))
        .route("/orders/lookup", get(lookup_order))
        .route("/orders/:order_no/cancel-requests", post(cancel_order))
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:order_id", get(get_order))
        .route(
            "/admin/orders/:order_id/status",
            axum::routing::patch(update_status),
        )
        .route(
            "/admin/orders/:order_id/shortage-actions",
            post(apply_shortage_action),
        )
        .route(
            "/admin/orders/:order_id/refunds",
            get(list_refunds).post(create_refund),
        )
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// 見積もりエンドポイント
async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<QuoteResponse>> {
    let zone_query = request.zone_query().map_err(domain_error)?;
    let quote = state
        .checkout_service
        .quote(&request.session_key, &zone_query, request.requested_slot_start)
        .await
        .map_err(map_application_error)?;
    Ok(Json(QuoteResponse::from_quote(&quote)))
}

// 注文前チェックエンドポイント（見積もりの valid / errors のみ返す）
async fn validate(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<ValidationResponse>> {
    let zone_query = request.zone_query().map_err(domain_error)?;
    let quote = state
        .checkout_service
        .quote(&request.session_key, &zone_query, request.requested_slot_start)
        .await
        .map_err(map_application_error)?;
    Ok(Json(ValidationResponse {
        valid: quote.valid,
        errors: quote.errors,
    }))
}

// 注文作成エンドポイント
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderCreatedResponse>)> {
    let order = state
        .order_service
        .place_order(request.into())
        .await
        .map_err(map_application_error)?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse::from_order(&order)),
    ))
}

// 注文番号と電話番号による照会エンドポイント
async fn lookup_order(
    State(state): State<AppState>,
    Query(params): Query<LookupQueryParams>,
) -> ApiResult<Json<OrderDetailResponse>> {
    let order = state
        .order_query_service
        .lookup(&OrderNo::from_string(params.order_no), &params.phone)
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderDetailResponse::from_order(&order)))
}

// 顧客キャンセルエンドポイント
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_no): Path<String>,
    Query(params): Query<CancelRequestParams>,
) -> ApiResult<Json<OrderDetailResponse>> {
    let order = state
        .order_service
        .cancel_by_customer(&OrderNo::from_string(order_no), &params.phone, params.reason)
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderDetailResponse::from_order(&order)))
}

// 注文一覧取得エンドポイント
async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<OrdersQueryParams>,
) -> ApiResult<Json<Vec<OrderSummaryResponse>>> {
    let status = params
        .status
        .as_deref()
        .map(OrderStatus::from_string)
        .transpose()
        .map_err(domain_error)?;
    let orders = state
        .order_query_service
        .list_orders(status)
        .await
        .map_err(map_application_error)?;
    Ok(Json(
        orders.iter().map(OrderSummaryResponse::from_order).collect(),
    ))
}

// 注文詳細取得エンドポイント
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<OrderDetailResponse>> {
    let order = state
        .order_query_service
        .get_order(OrderId::from_uuid(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderDetailResponse::from_order(&order)))
}

// ステータス変更エンドポイント
async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<OrderDetailResponse>> {
    let status = OrderStatus::from_string(&request.status).map_err(domain_error)?;
    let order = state
        .order_service
        .update_status(
            OrderId::from_uuid(order_id),
            status,
            request.reason,
            admin_actor(&headers),
        )
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderDetailResponse::from_order(&order)))
}

// 欠品処理エンドポイント
async fn apply_shortage_action(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ShortageActionRequest>,
) -> ApiResult<Json<ShortageActionResponse>> {
    let decision = request.into_decision().map_err(domain_error)?;
    let result = state
        .order_service
        .apply_shortage_action(OrderId::from_uuid(order_id), decision, admin_actor(&headers))
        .await
        .map_err(map_application_error)?;
    Ok(Json(ShortageActionResponse::from_result(&result)))
}

// 返金一覧エンドポイント（新しい順）
async fn list_refunds(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RefundResponse>>> {
    let refunds = state
        .order_query_service
        .refunds(OrderId::from_uuid(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(refunds.iter().map(RefundResponse::from_refund).collect()))
}

// 返金作成エンドポイント
async fn create_refund(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<CreateRefundRequest>,
) -> ApiResult<(StatusCode, Json<RefundResponse>)> {
    let amount = Money::new(request.amount).map_err(domain_error)?;
    let method = match request.method.as_deref() {
        Some(method) => RefundMethod::from_string(method).map_err(domain_error)?,
        None => RefundMethod::CodAdjustment,
    };
    let refund = state
        .order_service
        .create_refund(
            OrderId::from_uuid(order_id),
            amount,
            request.reason,
            method,
            admin_actor(&headers),
        )
        .await
        .map_err(map_application_error)?;
    Ok((StatusCode::CREATED, Json(RefundResponse::from_refund(&refund))))
}

/// ヘッダーからスタッフを特定（未指定なら "admin"）
fn admin_actor(headers: &HeaderMap) -> Actor {
    let id = headers
        .get(ADMIN_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("admin");
    Actor::admin(id)
}

fn domain_error(err: DomainError) -> (StatusCode, Json<ApiError>) {
    map_application_error(ApplicationError::DomainError(err))
}

// アプリケーションエラーをHTTPレスポンスにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let code = err.code().to_string();
    match err {
        ApplicationError::DomainError(domain_err) => map_domain_error(domain_err),
        ApplicationError::RepositoryError(repo_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: repo_err.to_string(),
                code,
                errors: None,
            }),
        ),
        ApplicationError::Conflict(msg) => (
            StatusCode::CONFLICT,
            Json(ApiError {
                error: msg,
                code,
                errors: None,
            }),
        ),
        ApplicationError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: msg,
                code,
                errors: None,
            }),
        ),
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> (StatusCode, Json<ApiError>) {
    let status = match &domain_err {
        DomainError::Validation(_)
        | DomainError::InvalidQuantity { .. }
        | DomainError::InvalidSubstitution(_)
        | DomainError::RefundExceedsRemaining { .. } => StatusCode::BAD_REQUEST,
        DomainError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidTransition { .. } | DomainError::OrderNotCancelable(_) => {
            StatusCode::CONFLICT
        }
        DomainError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let errors = match &domain_err {
        DomainError::PolicyViolation(errors) => Some(errors.clone()),
        _ => None,
    };
    (
        status,
        Json(ApiError {
            error: domain_err.to_string(),
            code: domain_err.code().to_string(),
            errors,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Money, OrderItemId};

    #[test]
    fn test_policy_violation_is_unprocessable_with_errors() {
        let (status, Json(body)) = map_domain_error(DomainError::PolicyViolation(vec![
            QuoteError::MinOrderNotMet,
        ]));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, "POLICY_VIOLATION");
        assert_eq!(body.errors, Some(vec![QuoteError::MinOrderNotMet]));
    }

    #[test]
    fn test_domain_error_status_codes() {
        let cases = vec![
            (
                DomainError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Picking,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::RefundExceedsRemaining {
                    requested: Money::won(10),
                    remaining: Money::won(5),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::ItemNotFound(OrderItemId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::OrderNotCancelable("picking".to_string()),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = map_domain_error(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_conflict_and_storage_errors() {
        let (status, Json(body)) =
            map_application_error(ApplicationError::Conflict("stale".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "CONFLICT");

        let (status, Json(body)) = map_application_error(ApplicationError::RepositoryError(
            crate::domain::port::RepositoryError::ConnectionFailed("down".to_string()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "STORAGE_ERROR");
    }

    #[test]
    fn test_admin_actor_defaults_to_admin() {
        let headers = HeaderMap::new();
        assert_eq!(admin_actor(&headers).id(), "admin");

        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_USER_HEADER, "picker-7".parse().unwrap());
        assert_eq!(admin_actor(&headers).id(), "picker-7");
    }
}
