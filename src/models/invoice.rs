// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Enums (Mapeando o Postgres) ---

// Cancelled e Overdue são valores válidos de armazenamento, mas nenhuma
// transição os alcança hoje. Não remover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Paid,
    Cancelled,
    Overdue,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,

    #[schema(ignore)]
    pub company_id: Uuid,

    // Pode ficar vazio até o OCR (ou o usuário) resolver o fornecedor
    pub vendor_id: Option<Uuid>,

    #[schema(example = "INV-2024-001")]
    pub invoice_number: String,

    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub invoice_date: Option<NaiveDate>,
    #[schema(value_type = String, format = Date, example = "2024-03-31")]
    pub due_date: Option<NaiveDate>,

    // Valores derivados dos itens (fonte da verdade), nunca do texto impresso
    #[schema(example = "140000.00")]
    pub sub_total: Decimal,
    #[schema(example = "23800.00")]
    pub tax_amount: Decimal,
    #[schema(example = "163800.00")]
    pub total_amount: Decimal,
    pub advance_tax_amount: Decimal,
    pub sales_tax_input_amount: Decimal,

    pub status: InvoiceStatus,

    // Metadados do OCR
    pub ocr_processed: bool,
    #[schema(example = "85.00")]
    pub ocr_confidence: Decimal,
    pub ocr_raw_text: Option<String>,
    pub ocr_error: Option<String>,

    // Aprovação
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_notes: Option<String>,

    // Pagamento
    #[schema(value_type = String, format = Date)]
    pub payment_date: Option<NaiveDate>,
    pub payment_reference: Option<String>,
    pub paid_by: Option<Uuid>,

    // Contabilização no ledger externo
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    pub posted_to_gl: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<Uuid>,

    // Descritores do arquivo (o conteúdo fica no blob store)
    pub storage_path: Option<String>,
    pub public_url: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,

    // Controle de concorrência otimista nas transições de status
    #[schema(ignore)]
    pub version: i32,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    pub id: Uuid,

    #[schema(ignore)]
    pub invoice_id: Uuid,

    // Único por fatura; itens manuais vêm antes dos extraídos
    pub line_number: i32,

    #[schema(example = "Serviço de consultoria")]
    pub description: String,

    #[schema(example = "2.00")]
    pub quantity: Decimal,
    #[schema(example = "500.00")]
    pub unit_price: Decimal,

    // amount = quantity * unit_price
    #[schema(example = "1000.00")]
    pub amount: Decimal,

    #[schema(example = "17.00")]
    pub tax_rate: Decimal,
    // tax_amount = amount * tax_rate / 100
    pub tax_amount: Decimal,
    // total_amount = amount + tax_amount
    pub total_amount: Decimal,

    pub account_id: Option<Uuid>,

    // Separa o que veio da máquina do que foi digitado à mão.
    // A reconciliação só pode descartar a partição extraída.
    pub is_ocr_extracted: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub line_items: Vec<InvoiceLineItem>,
}

// --- Payloads (Validação na borda com `validator`) ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItemPayload {
    #[validate(length(min = 1, message = "A descrição do item é obrigatória."))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
    pub account_id: Option<Uuid>,
    // Preservado no replace de edição; itens novos entram como manuais.
    #[serde(default)]
    pub is_ocr_extracted: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub vendor_id: Option<Uuid>,
    // Ausente: o serviço gera um placeholder até o OCR extrair o real
    #[validate(length(max = 100, message = "Número de fatura longo demais."))]
    pub invoice_number: Option<String>,
    #[schema(value_type = String, format = Date)]
    pub invoice_date: Option<NaiveDate>,
    #[schema(value_type = String, format = Date)]
    pub due_date: Option<NaiveDate>,
    pub advance_tax_amount: Option<Decimal>,
    pub sales_tax_input_amount: Option<Decimal>,
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    #[validate(nested)]
    #[serde(default)]
    pub line_items: Vec<LineItemPayload>,
}

/// Edição é uma troca completa: campos e itens enviados substituem os
/// atuais. `line_items: None` mantém os itens existentes.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoicePayload {
    pub vendor_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Número de fatura inválido."))]
    pub invoice_number: Option<String>,
    #[schema(value_type = String, format = Date)]
    pub invoice_date: Option<NaiveDate>,
    #[schema(value_type = String, format = Date)]
    pub due_date: Option<NaiveDate>,
    // Só alterna Draft <-> PendingApproval; o resto tem operação própria
    pub status: Option<InvoiceStatus>,
    pub advance_tax_amount: Option<Decimal>,
    pub sales_tax_input_amount: Option<Decimal>,
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    #[validate(nested)]
    pub line_items: Option<Vec<LineItemPayload>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    #[validate(length(max = 2000, message = "Notas longas demais."))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[schema(value_type = String, format = Date)]
    pub payment_date: NaiveDate,
    #[validate(length(max = 200, message = "Referência de pagamento longa demais."))]
    pub payment_reference: Option<String>,
}
