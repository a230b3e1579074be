// src/models/vendor.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: Uuid,

    #[schema(ignore)]
    pub company_id: Uuid,

    #[schema(example = "Acme Suprimentos Ltda")]
    pub name: String,

    pub is_active: bool,

    pub created_at: Option<DateTime<Utc>>,
}

/// Configuração por fornecedor: rótulos esperados no OCR, alíquota padrão
/// e contas padrão do ledger. Entrada somente-leitura para a reconciliação
/// e para a validação de contabilização.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VendorInvoiceTemplate {
    pub id: Uuid,

    #[schema(ignore)]
    pub company_id: Uuid,

    pub vendor_id: Uuid,
    pub is_active: bool,

    // Dicas de rótulo (sobrescrevem os rótulos padrão do parser)
    #[schema(example = "Nota Fiscal")]
    pub invoice_number_label: Option<String>,
    pub invoice_date_label: Option<String>,
    pub due_date_label: Option<String>,
    pub subtotal_label: Option<String>,
    pub tax_label: Option<String>,
    pub total_label: Option<String>,
    pub vendor_label: Option<String>,

    #[schema(example = "17.00")]
    pub default_tax_rate: Decimal,

    pub default_line_account_id: Option<Uuid>,
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    // Sempre exigida na contabilização; sem ela o posting é bloqueado
    pub payable_vendors_account_id: Option<Uuid>,

    pub applies_advance_tax: bool,
    pub applies_sales_tax_input: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
