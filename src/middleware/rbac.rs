// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::CompanyContext,
    models::auth::User,
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        // A. Extrai Usuário
        let user = parts
            .extensions
            .get::<User>()
            .cloned()
            .ok_or(AppError::InvalidToken)?;

        // B. Extrai a empresa
        let company = parts
            .extensions
            .get::<CompanyContext>()
            .cloned()
            .ok_or(AppError::NotFound)?;

        // C. Pega o slug da permissão
        let required_perm = T::slug();

        // D. Verifica no Banco
        let has_permission = app_state
            .membership_repo
            .user_has_permission(user.id, company.company_id, required_perm)
            .await?;

        if !has_permission {
            return Err(AppError::Forbidden(format!(
                "Você precisa da permissão '{}' para realizar esta ação.",
                required_perm
            )));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermInvoicesRead;
impl PermissionDef for PermInvoicesRead {
    fn slug() -> &'static str { "invoices:read" }
}

pub struct PermInvoicesWrite;
impl PermissionDef for PermInvoicesWrite {
    fn slug() -> &'static str { "invoices:write" }
}

pub struct PermInvoicesPost;
impl PermissionDef for PermInvoicesPost {
    fn slug() -> &'static str { "invoices:post" }
}

pub struct PermVendorsWrite;
impl PermissionDef for PermVendorsWrite {
    fn slug() -> &'static str { "vendors:write" }
}

pub struct PermLedgerSync;
impl PermissionDef for PermLedgerSync {
    fn slug() -> &'static str { "ledger:sync" }
}
