// src/handlers/ledger.rs
//
// Plano de contas cacheado e sincronização com o provedor externo. A leitura
// das contas nunca toca o provedor; só o sync (com a janela de 7 dias) faz.

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermLedgerSync, RequirePermission},
        tenancy::CompanyContext,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AccountListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/ledger/accounts",
    tag = "Ledger",
    params(AccountListParams),
    responses((status = 200, description = "Contas cacheadas, por código", body = [crate::models::ledger::GlAccount])),
    security(("bearer_auth" = []))
)]
pub async fn list_accounts(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    Query(params): Query<AccountListParams>,
) -> Result<impl IntoResponse, AppError> {
    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let page = params.page.unwrap_or(1).max(1);

    let accounts = app_state
        .ledger_repo
        .list_accounts(
            app_state.ledger_repo.pool(),
            company.company_id,
            per_page,
            (page - 1) * per_page,
        )
        .await?;
    Ok(Json(accounts))
}

#[utoipa::path(
    post,
    path = "/api/ledger/sync",
    tag = "Ledger",
    responses(
        (status = 200, description = "Sincronização executada", body = crate::models::ledger::SyncReport),
        (status = 422, description = "Janela de 7 dias ainda aberta"),
        (status = 502, description = "Provedor externo indisponível"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn sync_accounts(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermLedgerSync>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .ledger_sync_service
        .sync(company.company_id)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/ledger/test-credentials",
    tag = "Ledger",
    responses(
        (status = 200, description = "Resultado do teste de credenciais"),
        (status = 502, description = "Provedor externo indisponível"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn test_credentials(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    _company: CompanyContext,
    _guard: RequirePermission<PermLedgerSync>,
) -> Result<impl IntoResponse, AppError> {
    let valid = app_state.ledger_sync_service.test_credentials().await?;
    Ok(Json(json!({ "valid": valid })))
}
