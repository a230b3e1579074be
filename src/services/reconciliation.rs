// src/services/reconciliation.rs
//
// Funde o resultado do parse + template resolvido na fatura persistida.
// Função pura: devolve uma fatura nova e uma lista imutável de itens que o
// serviço aplica em uma única troca transacional. Os totais saem sempre dos
// itens (fonte da verdade), nunca dos números impressos no documento - eles
// podem embutir outros impostos, vir mal lidos ou referir outra linha.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    models::{
        invoice::{Invoice, InvoiceLineItem},
        vendor::VendorInvoiceTemplate,
    },
    services::parser::ParsedInvoice,
};

#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub invoice: Invoice,
    pub line_items: Vec<InvoiceLineItem>,
}

pub fn reconcile(
    invoice: &Invoice,
    existing_items: &[InvoiceLineItem],
    parsed: &ParsedInvoice,
    template: Option<&VendorInvoiceTemplate>,
) -> ReconciliationOutcome {
    let mut invoice = invoice.clone();

    // (1) Campos extraídos sobrescrevem os anteriores quando presentes;
    // ausentes não apagam nada.
    if let Some(number) = &parsed.invoice_number {
        invoice.invoice_number = number.clone();
    }
    if let Some(date) = parsed.invoice_date {
        invoice.invoice_date = Some(date);
    }
    if let Some(due) = parsed.due_date {
        invoice.due_date = Some(due);
    }

    // (2) Só a partição extraída pela máquina é descartada; o que foi
    // digitado à mão sobrevive a qualquer reprocessamento.
    let manual: Vec<InvoiceLineItem> = existing_items
        .iter()
        .filter(|item| !item.is_ocr_extracted)
        .cloned()
        .collect();

    // (3) Itens novos recebem alíquota e conta padrão do template quando
    // não trazem as suas.
    let default_tax_rate = template.map(|t| t.default_tax_rate).unwrap_or(Decimal::ZERO);
    let default_account = template.and_then(|t| t.default_line_account_id);

    let new_items = parsed.line_items.iter().map(|parsed_item| {
        let amount = parsed_item.quantity * parsed_item.unit_price;
        let tax_amount = amount * default_tax_rate / Decimal::from(100);

        InvoiceLineItem {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            line_number: 0, // renumerado abaixo
            description: parsed_item.description.clone(),
            quantity: parsed_item.quantity,
            unit_price: parsed_item.unit_price,
            amount,
            tax_rate: default_tax_rate,
            tax_amount,
            total_amount: amount + tax_amount,
            account_id: default_account,
            is_ocr_extracted: true,
        }
    });

    // (4) União com os manuais na frente, renumerada sequencialmente.
    let mut line_items: Vec<InvoiceLineItem> = manual.into_iter().chain(new_items).collect();
    for (index, item) in line_items.iter_mut().enumerate() {
        item.line_number = (index + 1) as i32;
    }

    // (5) Totais recalculados sobre o conjunto completo.
    invoice.sub_total = line_items.iter().map(|i| i.amount).sum();
    invoice.tax_amount = line_items.iter().map(|i| i.tax_amount).sum();

    // (6) AdvanceTax e SalesTaxInput são linhas de imposto do documento,
    // independentes dos itens.
    invoice.total_amount =
        invoice.sub_total + invoice.advance_tax_amount + invoice.sales_tax_input_amount;

    // (7) Contas auto-populadas do template apenas quando vazias - uma
    // escolha humana anterior nunca é sobrescrita.
    if invoice.advance_tax_account_id.is_none() {
        invoice.advance_tax_account_id = template.and_then(|t| t.advance_tax_account_id);
    }
    if invoice.sales_tax_input_account_id.is_none() {
        invoice.sales_tax_input_account_id = template.and_then(|t| t.sales_tax_input_account_id);
    }

    invoice.ocr_processed = true;
    invoice.ocr_confidence = parsed.confidence;
    invoice.ocr_error = None;

    ReconciliationOutcome { invoice, line_items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceStatus;
    use crate::services::parser::ParsedLineItem;
    use rust_decimal_macros::dec;

    fn base_invoice() -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            vendor_id: None,
            invoice_number: "DRAFT-abc123".to_string(),
            invoice_date: None,
            due_date: None,
            sub_total: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            advance_tax_amount: Decimal::ZERO,
            sales_tax_input_amount: Decimal::ZERO,
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
        }
    }

    fn line_item(invoice_id: Uuid, number: i32, amount: Decimal, ocr: bool) -> InvoiceLineItem {
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
            account_id: None,
            is_ocr_extracted: ocr,
        }
    }

    fn parsed_item(qty: Decimal, price: Decimal) -> ParsedLineItem {
        ParsedLineItem {
            description: "Extraído".to_string(),
            quantity: qty,
            unit_price: price,
            amount: qty * price,
            confidence: dec!(90),
        }
    }

    fn template() -> VendorInvoiceTemplate {
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
            default_tax_rate: dec!(10),
            default_line_account_id: Some(Uuid::new_v4()),
            advance_tax_account_id: Some(Uuid::new_v4()),
            sales_tax_input_account_id: Some(Uuid::new_v4()),
            payable_vendors_account_id: Some(Uuid::new_v4()),
            applies_advance_tax: true,
            applies_sales_tax_input: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn manual_items_survive_and_machine_items_are_replaced() {
        let invoice = base_invoice();
        let existing = vec![
            line_item(invoice.id, 1, dec!(100), false),
            line_item(invoice.id, 2, dec!(200), false),
            line_item(invoice.id, 3, dec!(10), true),
            line_item(invoice.id, 4, dec!(20), true),
            line_item(invoice.id, 5, dec!(30), true),
        ];
        let parsed = ParsedInvoice {
            line_items: vec![parsed_item(dec!(2), dec!(50))],
            ..ParsedInvoice::default()
        };

        let outcome = reconcile(&invoice, &existing, &parsed, None);

        // 2 manuais + 1 novo, nunca 6
        assert_eq!(outcome.line_items.len(), 3);
        assert!(!outcome.line_items[0].is_ocr_extracted);
        assert!(!outcome.line_items[1].is_ocr_extracted);
        assert!(outcome.line_items[2].is_ocr_extracted);

        // Renumeração sequencial com os manuais na frente
        let numbers: Vec<i32> = outcome.line_items.iter().map(|i| i.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn subtotal_is_the_sum_over_all_items_after_reconciliation() {
        let invoice = base_invoice();
        let existing = vec![
            line_item(invoice.id, 1, dec!(150), false),
            line_item(invoice.id, 2, dec!(75), true),
        ];
        let parsed = ParsedInvoice {
            line_items: vec![parsed_item(dec!(3), dec!(10)), parsed_item(dec!(1), dec!(5))],
            ..ParsedInvoice::default()
        };

        let outcome = reconcile(&invoice, &existing, &parsed, None);

        let expected: Decimal = outcome.line_items.iter().map(|i| i.amount).sum();
        assert_eq!(outcome.invoice.sub_total, expected);
        assert_eq!(outcome.invoice.sub_total, dec!(185));
    }

    #[test]
    fn extracted_fields_overwrite_but_absent_fields_do_not_erase() {
        let mut invoice = base_invoice();
        invoice.invoice_number = "INV-OLD".to_string();
        invoice.due_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 31);

        let parsed = ParsedInvoice {
            invoice_number: Some("INV-NEW".to_string()),
            invoice_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
            due_date: None,
            ..ParsedInvoice::default()
        };

        let outcome = reconcile(&invoice, &[], &parsed, None);

        assert_eq!(outcome.invoice.invoice_number, "INV-NEW");
        assert_eq!(
            outcome.invoice.invoice_date,
            chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        // due_date anterior permanece
        assert_eq!(
            outcome.invoice.due_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31)
        );
    }

    #[test]
    fn template_defaults_apply_to_new_items_only() {
        let invoice = base_invoice();
        let template = template();
        let existing = vec![line_item(invoice.id, 1, dec!(100), false)];
        let parsed = ParsedInvoice {
            line_items: vec![parsed_item(dec!(2), dec!(50))],
            ..ParsedInvoice::default()
        };

        let outcome = reconcile(&invoice, &existing, &parsed, Some(&template));

        let manual = &outcome.line_items[0];
        let machine = &outcome.line_items[1];

        assert_eq!(manual.tax_rate, Decimal::ZERO);
        assert_eq!(machine.tax_rate, dec!(10));
        assert_eq!(machine.amount, dec!(100));
        assert_eq!(machine.tax_amount, dec!(10));
        assert_eq!(machine.total_amount, dec!(110));
        assert_eq!(machine.account_id, template.default_line_account_id);
    }

    #[test]
    fn document_level_taxes_enter_the_total_but_not_the_subtotal() {
        let mut invoice = base_invoice();
        invoice.advance_tax_amount = dec!(15);
        invoice.sales_tax_input_amount = dec!(5);

        let parsed = ParsedInvoice {
            line_items: vec![parsed_item(dec!(1), dec!(100))],
            // O total impresso no documento é ignorado de propósito
            total_amount: Some(dec!(999999)),
            ..ParsedInvoice::default()
        };

        let outcome = reconcile(&invoice, &[], &parsed, None);

        assert_eq!(outcome.invoice.sub_total, dec!(100));
        assert_eq!(outcome.invoice.total_amount, dec!(120));
    }

    #[test]
    fn template_accounts_never_overwrite_a_prior_human_choice() {
        let chosen = Uuid::new_v4();
        let mut invoice = base_invoice();
        invoice.advance_tax_account_id = Some(chosen);

        let template = template();
        let outcome = reconcile(&invoice, &[], &ParsedInvoice::default(), Some(&template));

        // Escolha anterior preservada; campo vazio é preenchido
        assert_eq!(outcome.invoice.advance_tax_account_id, Some(chosen));
        assert_eq!(
            outcome.invoice.sales_tax_input_account_id,
            template.sales_tax_input_account_id
        );
    }

    #[test]
    fn reprocessing_is_repeatable() {
        let invoice = base_invoice();
        let parsed = ParsedInvoice {
            line_items: vec![parsed_item(dec!(1), dec!(10))],
            confidence: dec!(40),
            ..ParsedInvoice::default()
        };

        let first = reconcile(&invoice, &[], &parsed, None);
        let second = reconcile(&first.invoice, &first.line_items, &parsed, None);

        // Reprocessar substitui a partição da máquina, sem acumular
        assert_eq!(second.line_items.len(), 1);
        assert_eq!(second.invoice.sub_total, first.invoice.sub_total);
        assert!(second.invoice.ocr_processed);
        assert_eq!(second.invoice.ocr_confidence, dec!(40));
    }
}
