// src/services/posting.rs
//
// Decisão pura: esta fatura pode ser contabilizada no ledger?
// As regras rodam em ordem fixa e a primeira que falhar é a razão devolvida
// (fail-fast, uma razão por vez). Nenhuma mutação acontece aqui.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{
    invoice::{Invoice, InvoiceLineItem, InvoiceStatus},
    vendor::VendorInvoiceTemplate,
};

/// Razão específica e acionável pelo usuário; nunca um erro genérico.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingBlock {
    #[error("a fatura já foi contabilizada no ledger")]
    AlreadyPosted,

    #[error("o status {0:?} não permite contabilização (apenas Approved ou Paid)")]
    InvalidStatus(InvoiceStatus),

    #[error("o item {0} está sem conta contábil atribuída")]
    LineItemWithoutAccount(i32),

    #[error("a soma dos itens ({line_total}) difere do subtotal da fatura ({sub_total})")]
    SubTotalMismatch { line_total: Decimal, sub_total: Decimal },

    #[error("há imposto antecipado sem conta de Advance Tax atribuída")]
    MissingAdvanceTaxAccount,

    #[error("há Sales Tax Input sem conta atribuída")]
    MissingSalesTaxInputAccount,

    #[error("o template do fornecedor não define a conta padrão de Fornecedores a Pagar")]
    MissingPayableVendorsAccount,

    #[error("partidas não fecham: débitos {debits} diferem dos créditos {credits}")]
    UnbalancedEntry { debits: Decimal, credits: Decimal },
}

pub fn validate_posting(
    invoice: &Invoice,
    line_items: &[InvoiceLineItem],
    template: Option<&VendorInvoiceTemplate>,
) -> Result<(), PostingBlock> {
    // 1. Contabilização é unidirecional
    if invoice.posted_to_gl {
        return Err(PostingBlock::AlreadyPosted);
    }

    // 2. Apenas Approved ou Paid
    if !matches!(invoice.status, InvoiceStatus::Approved | InvoiceStatus::Paid) {
        return Err(PostingBlock::InvalidStatus(invoice.status));
    }

    // 3. Todo item existente precisa de conta contábil
    for item in line_items {
        if item.account_id.is_none() {
            return Err(PostingBlock::LineItemWithoutAccount(item.line_number));
        }
    }

    // 4. Igualdade decimal exata entre itens e subtotal
    let line_total: Decimal = line_items.iter().map(|i| i.amount).sum();
    if line_total != invoice.sub_total {
        return Err(PostingBlock::SubTotalMismatch {
            line_total,
            sub_total: invoice.sub_total,
        });
    }

    // 5. Sem template, a conta de Advance Tax é exigida por padrão
    let requires_advance_tax = template.map(|t| t.applies_advance_tax).unwrap_or(true);
    if requires_advance_tax
        && invoice.advance_tax_amount > Decimal::ZERO
        && invoice.advance_tax_account_id.is_none()
    {
        return Err(PostingBlock::MissingAdvanceTaxAccount);
    }

    // 6. Mesma regra para Sales Tax Input
    let requires_sales_tax_input = template.map(|t| t.applies_sales_tax_input).unwrap_or(true);
    if requires_sales_tax_input
        && invoice.sales_tax_input_amount > Decimal::ZERO
        && invoice.sales_tax_input_account_id.is_none()
    {
        return Err(PostingBlock::MissingSalesTaxInputAccount);
    }

    // 7. Exigência de template, não de fatura: a conta de Fornecedores a
    // Pagar precisa estar definida; template ausente também bloqueia.
    if template.and_then(|t| t.payable_vendors_account_id).is_none() {
        return Err(PostingBlock::MissingPayableVendorsAccount);
    }

    // 8. Partida dobrada: débitos (itens + impostos do documento) devem
    // igualar os créditos (total da fatura), exatos.
    let debits = line_total + invoice.advance_tax_amount + invoice.sales_tax_input_amount;
    let credits = invoice.total_amount;
    if debits != credits {
        return Err(PostingBlock::UnbalancedEntry { debits, credits });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn invoice(status: InvoiceStatus) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            vendor_id: Some(Uuid::new_v4()),
            invoice_number: "INV-1".to_string(),
            invoice_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
            due_date: None,
            sub_total: dec!(100),
            tax_amount: Decimal::ZERO,
            total_amount: dec!(100),
            advance_tax_amount: Decimal::ZERO,
            sales_tax_input_amount: Decimal::ZERO,
            status,
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
        }
    }

    fn item(invoice_id: Uuid, number: i32, amount: Decimal, account: Option<Uuid>) -> InvoiceLineItem {
        InvoiceLineItem {
            id: Uuid::new_v4(),
            invoice_id,
            line_number: number,
            description: format!("Item {}", number),
            quantity: Decimal::ONE,
            unit_price: amount,
            amount,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: amount,
            account_id: account,
            is_ocr_extracted: false,
        }
    }

    fn template_with_payable() -> VendorInvoiceTemplate {
        VendorInvoiceTemplate {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            is_active: true,
            invoice_number_label: None,
            invoice_date_label: None,
            due_date_label: None,
            subtotal_label: None,
            tax_label: None,
            total_label: None,
            vendor_label: None,
            default_tax_rate: Decimal::ZERO,
            default_line_account_id: None,
            advance_tax_account_id: None,
            sales_tax_input_account_id: None,
            payable_vendors_account_id: Some(Uuid::new_v4()),
            applies_advance_tax: false,
            applies_sales_tax_input: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn a_valid_approved_invoice_passes() {
        let inv = invoice(InvoiceStatus::Approved);
        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];
        let template = template_with_payable();

        assert_eq!(validate_posting(&inv, &items, Some(&template)), Ok(()));
    }

    #[test]
    fn already_posted_is_the_first_rule() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.posted_to_gl = true;

        let result = validate_posting(&inv, &[], None);
        assert_eq!(result, Err(PostingBlock::AlreadyPosted));
    }

    #[test]
    fn only_approved_or_paid_may_post() {
        let template = template_with_payable();
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::PendingApproval,
            InvoiceStatus::Rejected,
            InvoiceStatus::Cancelled,
            InvoiceStatus::Overdue,
        ] {
            let inv = invoice(status);
            assert_eq!(
                validate_posting(&inv, &[], Some(&template)),
                Err(PostingBlock::InvalidStatus(status))
            );
        }

        let mut inv = invoice(InvoiceStatus::Paid);
        inv.sub_total = Decimal::ZERO;
        inv.total_amount = Decimal::ZERO;
        assert_eq!(validate_posting(&inv, &[], Some(&template)), Ok(()));
    }

    #[test]
    fn missing_line_account_is_reported_before_the_balance_check() {
        let mut inv = invoice(InvoiceStatus::Approved);
        // Também desbalanceada de propósito: total não fecha com os itens
        inv.total_amount = dec!(999);

        let items = vec![
            item(inv.id, 1, dec!(60), Some(Uuid::new_v4())),
            item(inv.id, 2, dec!(40), None),
        ];

        let result = validate_posting(&inv, &items, Some(&template_with_payable()));
        assert_eq!(result, Err(PostingBlock::LineItemWithoutAccount(2)));
    }

    #[test]
    fn subtotal_must_equal_the_line_sum_exactly() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.sub_total = dec!(100.01);

        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];
        let result = validate_posting(&inv, &items, Some(&template_with_payable()));

        assert_eq!(
            result,
            Err(PostingBlock::SubTotalMismatch {
                line_total: dec!(100),
                sub_total: dec!(100.01),
            })
        );
    }

    #[test]
    fn advance_tax_account_required_without_template() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.advance_tax_amount = dec!(10);
        inv.total_amount = dec!(110);

        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];
        let result = validate_posting(&inv, &items, None);

        assert_eq!(result, Err(PostingBlock::MissingAdvanceTaxAccount));
    }

    #[test]
    fn template_toggle_waives_the_advance_tax_account() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.advance_tax_amount = dec!(10);
        inv.total_amount = dec!(110);

        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];
        // applies_advance_tax = false: a conta não é exigida
        let result = validate_posting(&inv, &items, Some(&template_with_payable()));

        assert_eq!(result, Ok(()));
    }

    #[test]
    fn missing_template_blocks_posting_via_payable_vendors_rule() {
        let inv = invoice(InvoiceStatus::Approved);
        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];

        let result = validate_posting(&inv, &items, None);
        assert_eq!(result, Err(PostingBlock::MissingPayableVendorsAccount));
    }

    #[test]
    fn debits_must_equal_credits_exactly() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.advance_tax_amount = dec!(10);
        inv.advance_tax_account_id = Some(Uuid::new_v4());
        // total esquecido em 100: 110 de débitos vs 100 de créditos
        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];

        let result = validate_posting(&inv, &items, Some(&template_with_payable()));
        assert_eq!(
            result,
            Err(PostingBlock::UnbalancedEntry {
                debits: dec!(110),
                credits: dec!(100),
            })
        );
    }

    #[test]
    fn the_decision_is_deterministic_for_unchanged_state() {
        let mut inv = invoice(InvoiceStatus::Approved);
        inv.sub_total = dec!(50);

        let items = vec![item(inv.id, 1, dec!(100), Some(Uuid::new_v4()))];
        let first = validate_posting(&inv, &items, None);
        let second = validate_posting(&inv, &items, None);

        assert_eq!(first, second);
    }
}
