// src/db/invoice_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::invoice::{Invoice, InvoiceLineItem},
};

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  FATURAS
    // =========================================================================

    pub async fn create_invoice<'e, E>(
        &self,
        executor: E,
        invoice: &Invoice,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                id, company_id, vendor_id, invoice_number, invoice_date, due_date,
                sub_total, tax_amount, total_amount,
                advance_tax_amount, sales_tax_input_amount,
                status,
                advance_tax_account_id, sales_tax_input_account_id,
                storage_path, public_url, file_size, file_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.company_id)
        .bind(invoice.vendor_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.sub_total)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.advance_tax_amount)
        .bind(invoice.sales_tax_input_amount)
        .bind(invoice.status)
        .bind(invoice.advance_tax_account_id)
        .bind(invoice.sales_tax_input_account_id)
        .bind(&invoice.storage_path)
        .bind(&invoice.public_url)
        .bind(invoice.file_size)
        .bind(&invoice.file_type)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateInvoiceNumber(invoice.invoice_number.clone());
                }
            }
            e.into()
        })?;

        Ok(created)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND company_id = $2",
        )
        .bind(invoice_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn find_by_number<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE company_id = $1 AND invoice_number = $2",
        )
        .bind(company_id)
        .bind(invoice_number)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE company_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    /// Regrava todos os campos mutáveis com compare-and-swap na versão.
    /// `None` significa que outro chamador alterou a fatura primeiro.
    pub async fn update_invoice<'e, E>(
        &self,
        executor: E,
        invoice: &Invoice,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                vendor_id = $4,
                invoice_number = $5,
                invoice_date = $6,
                due_date = $7,
                sub_total = $8,
                tax_amount = $9,
                total_amount = $10,
                advance_tax_amount = $11,
                sales_tax_input_amount = $12,
                status = $13,
                ocr_processed = $14,
                ocr_confidence = $15,
                ocr_raw_text = $16,
                ocr_error = $17,
                approved_by = $18,
                approved_at = $19,
                approval_notes = $20,
                payment_date = $21,
                payment_reference = $22,
                paid_by = $23,
                advance_tax_account_id = $24,
                sales_tax_input_account_id = $25,
                storage_path = $26,
                public_url = $27,
                file_size = $28,
                file_type = $29,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND company_id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.company_id)
        .bind(invoice.version)
        .bind(invoice.vendor_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.sub_total)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.advance_tax_amount)
        .bind(invoice.sales_tax_input_amount)
        .bind(invoice.status)
        .bind(invoice.ocr_processed)
        .bind(invoice.ocr_confidence)
        .bind(&invoice.ocr_raw_text)
        .bind(&invoice.ocr_error)
        .bind(invoice.approved_by)
        .bind(invoice.approved_at)
        .bind(&invoice.approval_notes)
        .bind(invoice.payment_date)
        .bind(&invoice.payment_reference)
        .bind(invoice.paid_by)
        .bind(invoice.advance_tax_account_id)
        .bind(invoice.sales_tax_input_account_id)
        .bind(&invoice.storage_path)
        .bind(&invoice.public_url)
        .bind(invoice.file_size)
        .bind(&invoice.file_type)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateInvoiceNumber(invoice.invoice_number.clone());
                }
            }
            AppError::from(e)
        })?;

        Ok(updated)
    }

    /// Marca como contabilizada. O filtro `posted_to_gl = false` garante que
    /// uma repostagem concorrente não passe duas vezes.
    pub async fn mark_posted<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        invoice_id: Uuid,
        posted_by: Uuid,
        expected_version: i32,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let posted = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                posted_to_gl = true,
                posted_at = now(),
                posted_by = $4,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND company_id = $2 AND version = $3
              AND posted_to_gl = false
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(company_id)
        .bind(expected_version)
        .bind(posted_by)
        .fetch_optional(executor)
        .await?;

        Ok(posted)
    }

    /// Caminho de recuperação do OCR: grava apenas as flags de erro por cima
    /// do estado já commitado, sem tocar nos demais campos.
    pub async fn mark_ocr_failure<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        invoice_id: Uuid,
        raw_text: Option<&str>,
        message: &str,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                ocr_processed = true,
                ocr_confidence = 0,
                ocr_raw_text = COALESCE($3, ocr_raw_text),
                ocr_error = $4,
                updated_at = now()
            WHERE id = $1 AND company_id = $2
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(company_id)
        .bind(raw_text)
        .bind(message)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn delete_invoice<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Os itens caem junto via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND company_id = $2")
            .bind(invoice_id)
            .bind(company_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  ITENS DA FATURA
    // =========================================================================

    pub async fn list_line_items<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLineItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InvoiceLineItem>(
            "SELECT * FROM invoice_line_items WHERE invoice_id = $1 ORDER BY line_number ASC",
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn delete_line_items<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn insert_line_item<'e, E>(
        &self,
        executor: E,
        item: &InvoiceLineItem,
    ) -> Result<InvoiceLineItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            INSERT INTO invoice_line_items (
                id, invoice_id, line_number, description,
                quantity, unit_price, amount,
                tax_rate, tax_amount, total_amount,
                account_id, is_ocr_extracted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.invoice_id)
        .bind(item.line_number)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .bind(item.tax_rate)
        .bind(item.tax_amount)
        .bind(item.total_amount)
        .bind(item.account_id)
        .bind(item.is_ocr_extracted)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::UniqueConstraintViolation(format!(
                        "Item de linha {} duplicado na fatura.",
                        item.line_number
                    ));
                }
            }
            AppError::from(e)
        })?;

        Ok(inserted)
    }
}
