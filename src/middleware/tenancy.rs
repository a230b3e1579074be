// src/middleware/tenancy.rs

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::{CompanyMember, User},
};

// O nome do nosso cabeçalho HTTP customizado
const COMPANY_ID_HEADER: &str = "x-company-id";

/// Contexto da empresa que a requisição está acessando, já com o vínculo
/// de associação verificado.
#[derive(Debug, Clone)]
pub struct CompanyContext {
    pub company_id: Uuid,
    pub member: CompanyMember,
}

// Roda depois do auth_guard: lê o X-Company-ID, verifica o vínculo ativo do
// usuário com a empresa e insere o contexto nos extensions. Usuário sem
// vínculo recebe 404, para não confirmar que a empresa existe.
pub async fn company_guard(
    State(app_state): State<AppState>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or(AppError::InvalidToken)?;

    let header_value = request
        .headers()
        .get(COMPANY_ID_HEADER)
        .ok_or_else(|| {
            AppError::BadRequest("O cabeçalho X-Company-ID é obrigatório.".to_string())
        })?;

    let value_str = header_value.to_str().map_err(|_| {
        AppError::BadRequest("Cabeçalho X-Company-ID contém caracteres inválidos.".to_string())
    })?;

    let company_id = Uuid::parse_str(value_str).map_err(|_| {
        AppError::BadRequest("Cabeçalho X-Company-ID inválido (não é um UUID).".to_string())
    })?;

    let member = app_state
        .membership_repo
        .find_membership(user.id, company_id)
        .await?
        .ok_or(AppError::NotFound)?;

    request.extensions_mut().insert(CompanyContext { company_id, member });
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CompanyContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CompanyContext>()
            .cloned()
            .ok_or(AppError::NotFound)
    }
}
