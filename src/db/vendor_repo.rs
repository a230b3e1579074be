// src/db/vendor_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::vendor::{Vendor, VendorInvoiceTemplate},
};

#[derive(Clone)]
pub struct VendorRepository {
    pool: PgPool,
}

/// Campos editáveis de um template, na forma que o serviço recebe do handler.
#[derive(Debug, Clone, Default)]
pub struct TemplateInput {
    pub invoice_number_label: Option<String>,
    pub invoice_date_label: Option<String>,
    pub due_date_label: Option<String>,
    pub subtotal_label: Option<String>,
    pub tax_label: Option<String>,
    pub total_label: Option<String>,
    pub vendor_label: Option<String>,
    pub default_tax_rate: Decimal,
    pub default_line_account_id: Option<Uuid>,
    pub advance_tax_account_id: Option<Uuid>,
    pub sales_tax_input_account_id: Option<Uuid>,
    pub payable_vendors_account_id: Option<Uuid>,
    pub applies_advance_tax: bool,
    pub applies_sales_tax_input: bool,
}

impl VendorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  FORNECEDORES
    // =========================================================================

    pub async fn create_vendor<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        name: &str,
    ) -> Result<Vendor, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let vendor = sqlx::query_as::<_, Vendor>(
            r#"
            INSERT INTO vendors (company_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(name)
        .fetch_one(executor)
        .await?;

        Ok(vendor)
    }

    pub async fn find_vendor<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<Option<Vendor>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let vendor = sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE id = $1 AND company_id = $2",
        )
        .bind(vendor_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(vendor)
    }

    /// Fornecedores ativos na ordem de cadastro. A ordem importa: o matching
    /// por nome do resolver fica com o primeiro que casar.
    pub async fn list_active_vendors<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<Vec<Vendor>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let vendors = sqlx::query_as::<_, Vendor>(
            r#"
            SELECT * FROM vendors
            WHERE company_id = $1 AND is_active = true
            ORDER BY created_at ASC
            "#,
        )
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(vendors)
    }

    pub async fn list_vendors<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<Vec<Vendor>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let vendors = sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE company_id = $1 ORDER BY name ASC",
        )
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(vendors)
    }

    // =========================================================================
    //  TEMPLATES DE FATURA POR FORNECEDOR
    // =========================================================================

    pub async fn create_template<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        vendor_id: Uuid,
        input: &TemplateInput,
    ) -> Result<VendorInvoiceTemplate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let template = sqlx::query_as::<_, VendorInvoiceTemplate>(
            r#"
            INSERT INTO vendor_invoice_templates (
                company_id, vendor_id,
                invoice_number_label, invoice_date_label, due_date_label,
                subtotal_label, tax_label, total_label, vendor_label,
                default_tax_rate, default_line_account_id,
                advance_tax_account_id, sales_tax_input_account_id,
                payable_vendors_account_id,
                applies_advance_tax, applies_sales_tax_input
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(vendor_id)
        .bind(&input.invoice_number_label)
        .bind(&input.invoice_date_label)
        .bind(&input.due_date_label)
        .bind(&input.subtotal_label)
        .bind(&input.tax_label)
        .bind(&input.total_label)
        .bind(&input.vendor_label)
        .bind(input.default_tax_rate)
        .bind(input.default_line_account_id)
        .bind(input.advance_tax_account_id)
        .bind(input.sales_tax_input_account_id)
        .bind(input.payable_vendors_account_id)
        .bind(input.applies_advance_tax)
        .bind(input.applies_sales_tax_input)
        .fetch_one(executor)
        .await?;

        Ok(template)
    }

    pub async fn update_template<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        template_id: Uuid,
        input: &TemplateInput,
    ) -> Result<Option<VendorInvoiceTemplate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let template = sqlx::query_as::<_, VendorInvoiceTemplate>(
            r#"
            UPDATE vendor_invoice_templates SET
                invoice_number_label = $3,
                invoice_date_label = $4,
                due_date_label = $5,
                subtotal_label = $6,
                tax_label = $7,
                total_label = $8,
                vendor_label = $9,
                default_tax_rate = $10,
                default_line_account_id = $11,
                advance_tax_account_id = $12,
                sales_tax_input_account_id = $13,
                payable_vendors_account_id = $14,
                applies_advance_tax = $15,
                applies_sales_tax_input = $16,
                updated_at = now()
            WHERE id = $1 AND company_id = $2
            RETURNING *
            "#,
        )
        .bind(template_id)
        .bind(company_id)
        .bind(&input.invoice_number_label)
        .bind(&input.invoice_date_label)
        .bind(&input.due_date_label)
        .bind(&input.subtotal_label)
        .bind(&input.tax_label)
        .bind(&input.total_label)
        .bind(&input.vendor_label)
        .bind(input.default_tax_rate)
        .bind(input.default_line_account_id)
        .bind(input.advance_tax_account_id)
        .bind(input.sales_tax_input_account_id)
        .bind(input.payable_vendors_account_id)
        .bind(input.applies_advance_tax)
        .bind(input.applies_sales_tax_input)
        .fetch_optional(executor)
        .await?;

        Ok(template)
    }

    pub async fn list_templates<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<Vec<VendorInvoiceTemplate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let templates = sqlx::query_as::<_, VendorInvoiceTemplate>(
            "SELECT * FROM vendor_invoice_templates WHERE company_id = $1 ORDER BY created_at ASC",
        )
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(templates)
    }

    pub async fn find_active_template_by_vendor<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<Option<VendorInvoiceTemplate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let template = sqlx::query_as::<_, VendorInvoiceTemplate>(
            r#"
            SELECT * FROM vendor_invoice_templates
            WHERE company_id = $1 AND vendor_id = $2 AND is_active = true
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .bind(vendor_id)
        .fetch_optional(executor)
        .await?;

        Ok(template)
    }
}
