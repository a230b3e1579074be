// src/handlers/vendors.rs
//
// Cadastro de fornecedores e seus templates de fatura. Leitura exige só o
// vínculo com a empresa; escrita exige a permissão vendors:write.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::vendor_repo::TemplateInput,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermVendorsWrite, RequirePermission},
        tenancy::CompanyContext,
    },
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendorPayload {
    #[validate(length(min = 1, max = 200, message = "O nome do fornecedor é obrigatório."))]
    pub name: String,
}

/// Espelha os campos editáveis do template. As dicas de rótulo são texto
/// livre; entram escapadas no parser, nunca como regex do usuário.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    pub invoice_number_label: Option<String>,
    pub invoice_date_label: Option<String>,
    pub due_date_label: Option<String>,
    pub subtotal_label: Option<String>,
    pub tax_label: Option<String>,
    pub total_label: Option<String>,
    pub vendor_label: Option<String>,
    #[serde(default)]
    pub default_tax_rate: Decimal,
    pub default_line_account_id: Option<Uuid>,
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    pub payable_vendors_account_id: Option<Uuid>,
    #[serde(default)]
    pub applies_advance_tax: bool,
    #[serde(default)]
    pub applies_sales_tax_input: bool,
}

impl TemplatePayload {
    fn into_input(self) -> Result<TemplateInput, AppError> {
        if self.default_tax_rate < Decimal::ZERO {
            return Err(AppError::BusinessRule(
                "A alíquota padrão não pode ser negativa.".to_string(),
            ));
        }
        Ok(TemplateInput {
            invoice_number_label: self.invoice_number_label,
            invoice_date_label: self.invoice_date_label,
            due_date_label: self.due_date_label,
            subtotal_label: self.subtotal_label,
            tax_label: self.tax_label,
            total_label: self.total_label,
            vendor_label: self.vendor_label,
            default_tax_rate: self.default_tax_rate,
            default_line_account_id: self.default_line_account_id,
            advance_tax_account_id: self.advance_tax_account_id,
            sales_tax_input_account_id: self.sales_tax_input_account_id,
            payable_vendors_account_id: self.payable_vendors_account_id,
            applies_advance_tax: self.applies_advance_tax,
            applies_sales_tax_input: self.applies_sales_tax_input,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/vendors",
    tag = "Fornecedores",
    request_body = CreateVendorPayload,
    responses((status = 201, description = "Fornecedor criado", body = crate::models::vendor::Vendor)),
    security(("bearer_auth" = []))
)]
pub async fn create_vendor(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermVendorsWrite>,
    Json(payload): Json<CreateVendorPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let vendor = app_state
        .vendor_repo
        .create_vendor(app_state.vendor_repo.pool(), company.company_id, payload.name.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

#[utoipa::path(
    get,
    path = "/api/vendors",
    tag = "Fornecedores",
    responses((status = 200, description = "Fornecedores da empresa", body = [crate::models::vendor::Vendor])),
    security(("bearer_auth" = []))
)]
pub async fn list_vendors(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
) -> Result<impl IntoResponse, AppError> {
    let vendors = app_state
        .vendor_repo
        .list_vendors(app_state.vendor_repo.pool(), company.company_id)
        .await?;
    Ok(Json(vendors))
}

#[utoipa::path(
    post,
    path = "/api/vendors/{vendorId}/templates",
    tag = "Fornecedores",
    params(("vendorId" = Uuid, Path, description = "Id do fornecedor")),
    request_body = TemplatePayload,
    responses(
        (status = 201, description = "Template criado", body = crate::models::vendor::VendorInvoiceTemplate),
        (status = 404, description = "Fornecedor não encontrado"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_template(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermVendorsWrite>,
    Path(vendor_id): Path<Uuid>,
    Json(payload): Json<TemplatePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // Fornecedor precisa existir na empresa antes do template
    app_state
        .vendor_repo
        .find_vendor(app_state.vendor_repo.pool(), company.company_id, vendor_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let input = payload.into_input()?;
    let template = app_state
        .vendor_repo
        .create_template(app_state.vendor_repo.pool(), company.company_id, vendor_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    put,
    path = "/api/templates/{id}",
    tag = "Fornecedores",
    params(("id" = Uuid, Path, description = "Id do template")),
    request_body = TemplatePayload,
    responses(
        (status = 200, description = "Template atualizado", body = crate::models::vendor::VendorInvoiceTemplate),
        (status = 404, description = "Template não encontrado"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_template(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
    _guard: RequirePermission<PermVendorsWrite>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<TemplatePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = payload.into_input()?;
    let template = app_state
        .vendor_repo
        .update_template(app_state.vendor_repo.pool(), company.company_id, template_id, &input)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(template))
}

#[utoipa::path(
    get,
    path = "/api/templates",
    tag = "Fornecedores",
    responses((status = 200, description = "Templates da empresa", body = [crate::models::vendor::VendorInvoiceTemplate])),
    security(("bearer_auth" = []))
)]
pub async fn list_templates(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    company: CompanyContext,
) -> Result<impl IntoResponse, AppError> {
    let templates = app_state
        .vendor_repo
        .list_templates(app_state.vendor_repo.pool(), company.company_id)
        .await?;
    Ok(Json(templates))
}
