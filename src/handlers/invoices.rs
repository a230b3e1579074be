// src/handlers/invoices.rs
//
// Handlers finos: extratores na assinatura fazem auth, tenancy e RBAC; a
// regra de negócio mora no InvoiceService. Aprovar e rejeitar exigem apenas
// vínculo ativo com a empresa, sem permissão dedicada.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermInvoicesPost, PermInvoicesRead, PermInvoicesWrite, RequirePermission},
        tenancy::CompanyContext,
    },
    models::invoice::{
        CreateInvoicePayload, PaymentPayload, ReviewPayload, UpdateInvoicePayload,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Página, começando em 1
    pub page: Option<i64>,
    /// Itens por página (1 a 100)
    pub per_page: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Faturas",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Fatura criada", body = crate::models::invoice::InvoiceDetail),
        (status = 409, description = "Número de fatura duplicado na empresa"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .create(company.company_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Faturas",
    params(ListParams),
    responses((status = 200, description = "Faturas da empresa, mais recentes primeiro", body = [crate::models::invoice::Invoice])),
    security(("bearer_auth" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesRead>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let invoices = app_state
        .invoice_service
        .list(company.company_id, params.page, params.per_page)
        .await?;
    Ok(Json(invoices))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    responses(
        (status = 200, description = "Fatura com seus itens", body = crate::models::invoice::InvoiceDetail),
        (status = 404, description = "Fatura não encontrada"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.invoice_service.get(company.company_id, id).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    request_body = UpdateInvoicePayload,
    responses(
        (status = 200, description = "Fatura atualizada", body = crate::models::invoice::InvoiceDetail),
        (status = 409, description = "Conflito de concorrência ou número duplicado"),
        (status = 422, description = "Fatura paga ou já contabilizada"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_invoice(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .update(company.company_id, id, payload)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    responses(
        (status = 204, description = "Fatura excluída com seus itens"),
        (status = 422, description = "Fatura paga não pode ser excluída"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_invoice(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.invoice_service.delete(company.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/approve",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Fatura aprovada", body = crate::models::invoice::InvoiceDetail),
        (status = 422, description = "Status não permite aprovação"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    company: CompanyContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .approve(company.company_id, id, user.0.id, payload)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/reject",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Fatura rejeitada", body = crate::models::invoice::InvoiceDetail),
        (status = 422, description = "Status não permite rejeição"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    company: CompanyContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .reject(company.company_id, id, user.0.id, payload)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/pay",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    request_body = PaymentPayload,
    responses(
        (status = 200, description = "Pagamento registrado", body = crate::models::invoice::InvoiceDetail),
        (status = 422, description = "Só faturas aprovadas podem ser pagas"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn pay_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .pay(company.company_id, id, user.0.id, payload)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/process",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    responses(
        (status = 200, description = "Documento processado; em falha de OCR a fatura volta com ocr_error preenchido", body = crate::models::invoice::InvoiceDetail),
        (status = 422, description = "Fatura sem documento anexado"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn process_invoice(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .process_ocr(company.company_id, id)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/post",
    tag = "Faturas",
    params(("id" = Uuid, Path, description = "Id da fatura")),
    responses(
        (status = 200, description = "Fatura contabilizada no ledger", body = crate::models::invoice::InvoiceDetail),
        (status = 422, description = "Contabilização bloqueada, com a razão específica"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn post_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesPost>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .invoice_service
        .post(company.company_id, id, user.0.id)
        .await?;
    Ok(Json(detail))
}

// Corpo bruto (PDF/imagem); fica fora do OpenAPI porque o extrator de bytes
// não tem schema.
pub async fn upload_invoice_file(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermInvoicesWrite>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let file_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let detail = app_state
        .invoice_service
        .attach_file(company.company_id, id, body.to_vec(), file_type)
        .await?;
    Ok(Json(detail))
}
