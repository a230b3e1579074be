// src/services/invoice_service.rs
//
// Orquestrador das operações de fatura. A lógica de decisão mora nos módulos
// puros (parser, reconciliation, lifecycle, posting); aqui ficam o controle
// transacional, o CAS de versão e os colaboradores externos.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{InvoiceRepository, VendorRepository},
    models::invoice::{
        CreateInvoicePayload, Invoice, InvoiceDetail, InvoiceLineItem, InvoiceStatus,
        LineItemPayload, PaymentPayload, ReviewPayload, UpdateInvoicePayload,
    },
    services::{
        external::{BlobStore, NotificationEvent, Notifier, TextExtractor},
        lifecycle, posting,
        parser::{InvoiceParser, ParserConfig},
        reconciliation::reconcile,
        template_resolver::resolve_vendor,
    },
};

const CONFLICT_MESSAGE: &str =
    "A fatura foi alterada por outra operação. Recarregue e tente novamente.";

#[derive(Clone)]
pub struct InvoiceService {
    invoices: InvoiceRepository,
    vendors: VendorRepository,
    extractor: Arc<dyn TextExtractor>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
}

/// Número provisório até o OCR (ou o usuário) informar o real.
fn placeholder_number(invoice_id: Uuid) -> String {
    let simple = invoice_id.simple().to_string();
    format!("DRAFT-{}", &simple[..8])
}

/// Materializa os itens do payload com os campos derivados calculados aqui,
/// nunca confiados ao cliente.
fn build_line_items(
    invoice_id: Uuid,
    payload_items: &[LineItemPayload],
) -> Result<Vec<InvoiceLineItem>, AppError> {
    let mut items = Vec::with_capacity(payload_items.len());

    for (index, payload) in payload_items.iter().enumerate() {
        if payload.quantity < Decimal::ZERO || payload.unit_price < Decimal::ZERO {
            return Err(AppError::BusinessRule(
                "Quantidade e preço unitário não podem ser negativos.".to_string(),
            ));
        }

        let tax_rate = payload.tax_rate.unwrap_or(Decimal::ZERO);
        if tax_rate < Decimal::ZERO {
            return Err(AppError::BusinessRule(
                "A alíquota de imposto não pode ser negativa.".to_string(),
            ));
        }

        let amount = payload.quantity * payload.unit_price;
        let tax_amount = amount * tax_rate / Decimal::from(100);

        items.push(InvoiceLineItem {
            id: Uuid::new_v4(),
            invoice_id,
            line_number: (index + 1) as i32,
            description: payload.description.clone(),
            quantity: payload.quantity,
            unit_price: payload.unit_price,
            amount,
            tax_rate,
            tax_amount,
            total_amount: amount + tax_amount,
            account_id: payload.account_id,
            is_ocr_extracted: payload.is_ocr_extracted,
        });
    }

    Ok(items)
}

fn apply_totals(invoice: &mut Invoice, items: &[InvoiceLineItem]) {
    invoice.sub_total = items.iter().map(|i| i.amount).sum();
    invoice.tax_amount = items.iter().map(|i| i.tax_amount).sum();
    invoice.total_amount =
        invoice.sub_total + invoice.advance_tax_amount + invoice.sales_tax_input_amount;
}

impl InvoiceService {
    pub fn new(
        invoices: InvoiceRepository,
        vendors: VendorRepository,
        extractor: Arc<dyn TextExtractor>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { invoices, vendors, extractor, blobs, notifier }
    }

    async fn load(&self, company_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
        self.invoices
            .find_by_id(self.invoices.pool(), company_id, invoice_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn detail(&self, invoice: Invoice) -> Result<InvoiceDetail, AppError> {
        let line_items = self
            .invoices
            .list_line_items(self.invoices.pool(), invoice.id)
            .await?;
        Ok(InvoiceDetail { invoice, line_items })
    }

    /// Notificação em segundo plano: falha vira warning, nunca erro da
    /// operação que já foi commitada.
    fn notify_background(&self, event: NotificationEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(event).await {
                tracing::warn!("Falha ao entregar notificação: {:#}", e);
            }
        });
    }

    // =========================================================================
    //  CRUD
    // =========================================================================

    pub async fn create(
        &self,
        company_id: Uuid,
        payload: CreateInvoicePayload,
    ) -> Result<InvoiceDetail, AppError> {
        payload.validate()?;

        let invoice_id = Uuid::new_v4();
        let invoice_number = payload
            .invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_number(invoice_id));

        if self
            .invoices
            .find_by_number(self.invoices.pool(), company_id, &invoice_number)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateInvoiceNumber(invoice_number));
        }

        let line_items = build_line_items(invoice_id, &payload.line_items)?;

        let mut invoice = Invoice {
            id: invoice_id,
            company_id,
            vendor_id: payload.vendor_id,
            invoice_number,
            invoice_date: payload.invoice_date,
            due_date: payload.due_date,
            sub_total: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            advance_tax_amount: payload.advance_tax_amount.unwrap_or(Decimal::ZERO),
            sales_tax_input_amount: payload.sales_tax_input_amount.unwrap_or(Decimal::ZERO),
            status: InvoiceStatus::Draft,
            ocr_processed: false,
            ocr_confidence: Decimal::ZERO,
            ocr_raw_text: None,
            ocr_error: None,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            payment_date: None,
            payment_reference: None,
            paid_by: None,
            advance_tax_account_id: payload.advance_tax_account_id,
            sales_tax_input_account_id: payload.sales_tax_input_account_id,
            posted_to_gl: false,
            posted_at: None,
            posted_by: None,
            storage_path: None,
            public_url: None,
            file_size: None,
            file_type: None,
            version: 1,
            created_at: None,
            updated_at: None,
        };
        apply_totals(&mut invoice, &line_items);

        let mut tx = self.invoices.pool().begin().await?;
        let created = self.invoices.create_invoice(&mut *tx, &invoice).await?;
        let mut persisted_items = Vec::with_capacity(line_items.len());
        for item in &line_items {
            persisted_items.push(self.invoices.insert_line_item(&mut *tx, item).await?);
        }
        tx.commit().await?;

        tracing::info!(%company_id, invoice_id = %created.id, "fatura criada");
        Ok(InvoiceDetail { invoice: created, line_items: persisted_items })
    }

    pub async fn get(&self, company_id: Uuid, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        let invoice = self.load(company_id, invoice_id).await?;
        self.detail(invoice).await
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Vec<Invoice>, AppError> {
        let per_page = per_page.unwrap_or(20).clamp(1, 100);
        let page = page.unwrap_or(1).max(1);
        let offset = (page - 1) * per_page;

        self.invoices
            .list(self.invoices.pool(), company_id, per_page, offset)
            .await
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        payload: UpdateInvoicePayload,
    ) -> Result<InvoiceDetail, AppError> {
        payload.validate()?;

        let current = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_edit(&current)?;

        let mut invoice = current.clone();

        if let Some(requested) = payload.status {
            lifecycle::ensure_valid_edit_status(current.status, requested)?;
            invoice.status = requested;
        }

        if let Some(number) = payload.invoice_number.as_deref().map(str::trim) {
            if number != current.invoice_number {
                if let Some(other) = self
                    .invoices
                    .find_by_number(self.invoices.pool(), company_id, number)
                    .await?
                {
                    if other.id != invoice_id {
                        return Err(AppError::DuplicateInvoiceNumber(number.to_string()));
                    }
                }
            }
            invoice.invoice_number = number.to_string();
        }

        if payload.vendor_id.is_some() {
            invoice.vendor_id = payload.vendor_id;
        }
        if payload.invoice_date.is_some() {
            invoice.invoice_date = payload.invoice_date;
        }
        if payload.due_date.is_some() {
            invoice.due_date = payload.due_date;
        }
        if let Some(amount) = payload.advance_tax_amount {
            invoice.advance_tax_amount = amount;
        }
        if let Some(amount) = payload.sales_tax_input_amount {
            invoice.sales_tax_input_amount = amount;
        }
        if payload.advance_tax_account_id.is_some() {
            invoice.advance_tax_account_id = payload.advance_tax_account_id;
        }
        if payload.sales_tax_input_account_id.is_some() {
            invoice.sales_tax_input_account_id = payload.sales_tax_input_account_id;
        }

        // Itens enviados substituem o conjunto inteiro; ausentes, os atuais
        // ficam e só os totais são recalculados.
        let replacement = match &payload.line_items {
            Some(items) => Some(build_line_items(invoice_id, items)?),
            None => None,
        };
        let totals_basis = match &replacement {
            Some(items) => items.clone(),
            None => {
                self.invoices
                    .list_line_items(self.invoices.pool(), invoice_id)
                    .await?
            }
        };
        apply_totals(&mut invoice, &totals_basis);

        let mut tx = self.invoices.pool().begin().await?;
        let updated = self
            .invoices
            .update_invoice(&mut *tx, &invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        let line_items = if let Some(items) = &replacement {
            self.invoices.delete_line_items(&mut *tx, invoice_id).await?;
            let mut persisted = Vec::with_capacity(items.len());
            for item in items {
                persisted.push(self.invoices.insert_line_item(&mut *tx, item).await?);
            }
            persisted
        } else {
            totals_basis
        };
        tx.commit().await?;

        Ok(InvoiceDetail { invoice: updated, line_items })
    }

    pub async fn delete(&self, company_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_delete(invoice.status)?;

        let deleted = self
            .invoices
            .delete_invoice(self.invoices.pool(), company_id, invoice_id)
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }

        tracing::info!(%company_id, %invoice_id, "fatura excluída");
        Ok(())
    }

    // =========================================================================
    //  TRANSIÇÕES DE STATUS
    // =========================================================================

    pub async fn approve(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        user_id: Uuid,
        payload: ReviewPayload,
    ) -> Result<InvoiceDetail, AppError> {
        payload.validate()?;

        let mut invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_approve(invoice.status)?;

        invoice.status = InvoiceStatus::Approved;
        invoice.approved_by = Some(user_id);
        invoice.approved_at = Some(Utc::now());
        invoice.approval_notes = payload.notes;

        let updated = self
            .invoices
            .update_invoice(self.invoices.pool(), &invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        self.notify_background(NotificationEvent::InvoiceApproved { company_id, invoice_id });
        self.detail(updated).await
    }

    pub async fn reject(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        user_id: Uuid,
        payload: ReviewPayload,
    ) -> Result<InvoiceDetail, AppError> {
        payload.validate()?;

        let mut invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_reject(invoice.status)?;

        invoice.status = InvoiceStatus::Rejected;
        invoice.approved_by = Some(user_id);
        invoice.approved_at = Some(Utc::now());
        invoice.approval_notes = payload.notes;

        let updated = self
            .invoices
            .update_invoice(self.invoices.pool(), &invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        self.notify_background(NotificationEvent::InvoiceRejected { company_id, invoice_id });
        self.detail(updated).await
    }

    pub async fn pay(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        user_id: Uuid,
        payload: PaymentPayload,
    ) -> Result<InvoiceDetail, AppError> {
        payload.validate()?;

        let mut invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_pay(invoice.status)?;

        invoice.status = InvoiceStatus::Paid;
        invoice.payment_date = Some(payload.payment_date);
        invoice.payment_reference = payload.payment_reference;
        invoice.paid_by = Some(user_id);

        let updated = self
            .invoices
            .update_invoice(self.invoices.pool(), &invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        self.notify_background(NotificationEvent::InvoicePaid { company_id, invoice_id });
        self.detail(updated).await
    }

    // =========================================================================
    //  OCR
    // =========================================================================

    /// Extrai, parseia e reconcilia o documento anexado. Falha de OCR não
    /// derruba a fatura: o estado commitado fica como está e só as flags de
    /// erro são gravadas por cima.
    pub async fn process_ocr(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        let mut invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_edit(&invoice)?;

        let Some(storage_path) = invoice.storage_path.clone() else {
            return Err(AppError::BusinessRule(
                "A fatura não tem documento anexado para processar.".to_string(),
            ));
        };
        let file_type = invoice.file_type.clone().unwrap_or_default();

        let text = match self.extractor.extract_text(&storage_path, &file_type).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%invoice_id, "extração de texto falhou: {:#}", e);
                return self
                    .persist_ocr_failure(company_id, invoice_id, None, &format!("{:#}", e))
                    .await;
            }
        };

        if text.trim().is_empty() {
            return self
                .persist_ocr_failure(
                    company_id,
                    invoice_id,
                    Some(&text),
                    "O documento não contém texto extraível.",
                )
                .await;
        }

        // Template do fornecedor pré-selecionado, se houver. O vendor_id da
        // fatura é autoritativo; o nome extraído só entra quando ele falta.
        let mut template = match invoice.vendor_id {
            Some(vendor_id) => {
                self.vendors
                    .find_active_template_by_vendor(self.vendors.pool(), company_id, vendor_id)
                    .await?
            }
            None => None,
        };

        let parser = InvoiceParser::new(&ParserConfig::from_template(template.as_ref()));
        let mut parsed = parser.parse(&text);

        // A decisão de fornecedor é pura: vendor_id gravado é autoritativo,
        // o nome extraído só resolve quando ele falta.
        let actives = self
            .vendors
            .list_active_vendors(self.vendors.pool(), company_id)
            .await?;
        let resolved_vendor =
            resolve_vendor(invoice.vendor_id, parsed.vendor_name.as_deref(), &actives);

        if resolved_vendor != invoice.vendor_id {
            invoice.vendor_id = resolved_vendor;
            if let Some(vendor_id) = resolved_vendor {
                template = self
                    .vendors
                    .find_active_template_by_vendor(self.vendors.pool(), company_id, vendor_id)
                    .await?;
                // Com dicas de rótulo disponíveis, o parse refeito tende
                // a extrair mais campos do mesmo texto.
                if template.is_some() {
                    let parser =
                        InvoiceParser::new(&ParserConfig::from_template(template.as_ref()));
                    parsed = parser.parse(&text);
                }
            }
        }

        if !parsed.is_usable() {
            invoice.ocr_processed = true;
            invoice.ocr_confidence = parsed.confidence;
            invoice.ocr_raw_text = Some(text);
            invoice.ocr_error = Some(
                "O OCR não extraiu os campos mínimos (número, data e total).".to_string(),
            );

            let updated = self
                .invoices
                .update_invoice(self.invoices.pool(), &invoice)
                .await?
                .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;
            return self.detail(updated).await;
        }

        let existing_items = self
            .invoices
            .list_line_items(self.invoices.pool(), invoice_id)
            .await?;

        let mut outcome = reconcile(&invoice, &existing_items, &parsed, template.as_ref());
        outcome.invoice.ocr_raw_text = Some(text);

        // Troca atômica: fatura e itens na mesma transação, nunca um estado
        // meio-reconciliado visível.
        let mut tx = self.invoices.pool().begin().await?;
        let updated = self
            .invoices
            .update_invoice(&mut *tx, &outcome.invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;
        self.invoices.delete_line_items(&mut *tx, invoice_id).await?;
        let mut persisted = Vec::with_capacity(outcome.line_items.len());
        for item in &outcome.line_items {
            persisted.push(self.invoices.insert_line_item(&mut *tx, item).await?);
        }
        tx.commit().await?;

        tracing::info!(
            %invoice_id,
            confidence = %updated.ocr_confidence,
            items = persisted.len(),
            "OCR reconciliado"
        );
        Ok(InvoiceDetail { invoice: updated, line_items: persisted })
    }

    async fn persist_ocr_failure(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        raw_text: Option<&str>,
        message: &str,
    ) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .invoices
            .mark_ocr_failure(self.invoices.pool(), company_id, invoice_id, raw_text, message)
            .await?
            .ok_or(AppError::NotFound)?;
        self.detail(invoice).await
    }

    // =========================================================================
    //  CONTABILIZAÇÃO
    // =========================================================================

    pub async fn post(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        user_id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        let invoice = self.load(company_id, invoice_id).await?;
        let line_items = self
            .invoices
            .list_line_items(self.invoices.pool(), invoice_id)
            .await?;
        let template = match invoice.vendor_id {
            Some(vendor_id) => {
                self.vendors
                    .find_active_template_by_vendor(self.vendors.pool(), company_id, vendor_id)
                    .await?
            }
            None => None,
        };

        posting::validate_posting(&invoice, &line_items, template.as_ref())
            .map_err(|block| AppError::PostingBlocked(block.to_string()))?;

        let posted = self
            .invoices
            .mark_posted(
                self.invoices.pool(),
                company_id,
                invoice_id,
                user_id,
                invoice.version,
            )
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        tracing::info!(%company_id, %invoice_id, "fatura contabilizada no ledger");
        self.notify_background(NotificationEvent::InvoicePosted { company_id, invoice_id });
        Ok(InvoiceDetail { invoice: posted, line_items })
    }

    // =========================================================================
    //  ARQUIVO DO DOCUMENTO
    // =========================================================================

    pub async fn attach_file(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        bytes: Vec<u8>,
        file_type: String,
    ) -> Result<InvoiceDetail, AppError> {
        if bytes.is_empty() {
            return Err(AppError::BusinessRule("O arquivo enviado está vazio.".to_string()));
        }

        let mut invoice = self.load(company_id, invoice_id).await?;
        lifecycle::ensure_can_edit(&invoice)?;

        let stored = self.blobs.store(&bytes, &file_type).await?;

        invoice.storage_path = Some(stored.storage_path);
        invoice.public_url = Some(stored.public_url);
        invoice.file_size = Some(stored.size);
        invoice.file_type = Some(file_type);

        let updated = self
            .invoices
            .update_invoice(self.invoices.pool(), &invoice)
            .await?
            .ok_or_else(|| AppError::Conflict(CONFLICT_MESSAGE.to_string()))?;
        self.detail(updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn placeholder_numbers_are_prefixed_and_short() {
        let id = Uuid::new_v4();
        let number = placeholder_number(id);

        assert!(number.starts_with("DRAFT-"));
        assert_eq!(number.len(), "DRAFT-".len() + 8);
    }

    #[test]
    fn derived_item_fields_are_computed_server_side() {
        let items = build_line_items(
            Uuid::new_v4(),
            &[LineItemPayload {
                description: "Consultoria".to_string(),
                quantity: dec!(2),
                unit_price: dec!(500),
                tax_rate: Some(dec!(17)),
                account_id: None,
                is_ocr_extracted: false,
            }],
        )
        .unwrap();

        assert_eq!(items[0].line_number, 1);
        assert_eq!(items[0].amount, dec!(1000));
        assert_eq!(items[0].tax_amount, dec!(170));
        assert_eq!(items[0].total_amount, dec!(1170));
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let result = build_line_items(
            Uuid::new_v4(),
            &[LineItemPayload {
                description: "Estorno".to_string(),
                quantity: dec!(-1),
                unit_price: dec!(10),
                tax_rate: None,
                account_id: None,
                is_ocr_extracted: false,
            }],
        );

        assert!(matches!(result, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn document_taxes_enter_the_total_but_not_the_subtotal() {
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            vendor_id: None,
            invoice_number: "INV-1".to_string(),
            invoice_date: None,
            due_date: None,
            sub_total: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            advance_tax_amount: dec!(15),
            sales_tax_input_amount: dec!(5),
            status: InvoiceStatus::Draft,
            ocr_processed: false,
            ocr_confidence: Decimal::ZERO,
            ocr_raw_text: None,
            ocr_error: None,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            payment_date: None,
            payment_reference: None,
            paid_by: None,
            advance_tax_account_id: None,
            sales_tax_input_account_id: None,
            posted_to_gl: false,
            posted_at: None,
            posted_by: None,
            storage_path: None,
            public_url: None,
            file_size: None,
            file_type: None,
            version: 1,
            created_at: None,
            updated_at: None,
        };

        let items = build_line_items(
            invoice.id,
            &[LineItemPayload {
                description: "Material".to_string(),
                quantity: dec!(1),
                unit_price: dec!(100),
                tax_rate: None,
                account_id: None,
                is_ocr_extracted: false,
            }],
        )
        .unwrap();
        apply_totals(&mut invoice, &items);

        assert_eq!(invoice.sub_total, dec!(100));
        assert_eq!(invoice.total_amount, dec!(120));
    }
}
