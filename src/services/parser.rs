// src/services/parser.rs
//
// Extração de campos estruturados a partir do texto bruto de OCR.
// Cada campo escalar é localizado por um rótulo configurável seguido de um
// padrão de valor permissivo. Campo não encontrado fica ausente - nunca é
// adivinhado. O parser é puro: texto entra, candidato a fatura sai.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::vendor::VendorInvoiceTemplate;

// Padrões de valor: ids alfanuméricos, datas ISO e decimais com separador
// de milhar. Estilo de tabela de padrões com lazy_static.
const ALNUM_ID: &str = r"([A-Za-z0-9][A-Za-z0-9\-/\.]*)";
const ISO_DATE: &str = r"(\d{4}-\d{2}-\d{2})";
const MONEY: &str = r"((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)";
const REST_OF_LINE: &str = r"(\S[^\r\n]*)";

lazy_static! {
    // Começo da seção de itens: marcador "Items" ou a linha de cabeçalho da tabela
    static ref ITEMS_MARKER: Regex = Regex::new(r"(?i)^\s*(?:line\s+)?items?\b\s*:?\s*$").unwrap();

    // Linha de item: <descrição> <qtd> <preço-unitário> <valor>
    static ref ITEM_ROW: Regex = Regex::new(
        r"^\s*(.+?)\s+(\d+(?:\.\d+)?)\s+((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)\s+((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)\s*$"
    ).unwrap();

    // Linhas de totais encerram a seção de itens
    static ref TOTALS_BOUNDARY: Regex = Regex::new(
        r"(?i)^\s*(?:sub\s?total|total|tax|amount\s+due)\b"
    ).unwrap();
}

// Tokens de cabeçalho da tabela de itens; linhas assim são descartadas.
const HEADER_TOKENS: [&str; 3] = ["description", "item", "qty"];

/// Resultado candidato do parse. Todos os campos são opcionais: o que o
/// texto não entregou fica `None`.
#[derive(Debug, Clone, Default)]
pub struct ParsedInvoice {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vendor_name: Option<String>,
    // Valores impressos, informativos apenas. A reconciliação recalcula
    // os totais a partir dos itens.
    pub sub_total: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub line_items: Vec<ParsedLineItem>,
    // Sinal de triagem 0-100, nunca um gate de corretude
    pub confidence: Decimal,
}

#[derive(Debug, Clone)]
pub struct ParsedLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub confidence: Decimal,
}

impl ParsedInvoice {
    /// Um parse só é utilizável com número, data e um total positivo.
    /// Fora disso é falha parcial - valor, não exceção.
    pub fn is_usable(&self) -> bool {
        self.invoice_number.is_some()
            && self.invoice_date.is_some()
            && self.total_amount.map(|t| t > Decimal::ZERO).unwrap_or(false)
    }
}

/// Rótulos dos campos escalares. Os padrões aceitam alternação estilo regex;
/// as dicas do template entram escapadas por cima dos padrões default.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub invoice_number_label: String,
    pub invoice_date_label: String,
    pub due_date_label: String,
    pub vendor_label: String,
    pub subtotal_label: String,
    pub tax_label: String,
    pub total_label: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            invoice_number_label: r"Invoice\s+Number|Invoice\s+No\.?|Invoice\s*#".to_string(),
            invoice_date_label: r"Invoice\s+Date|Date\s+of\s+Issue".to_string(),
            due_date_label: r"Due\s+Date|Payment\s+Due".to_string(),
            vendor_label: r"Vendor|Supplier|From".to_string(),
            subtotal_label: r"Sub\s?Total".to_string(),
            tax_label: r"Tax\s+Amount|Tax".to_string(),
            total_label: r"Total\s+Amount|Amount\s+Due|Total".to_string(),
        }
    }
}

impl ParserConfig {
    /// Aplica as dicas de rótulo do template por cima dos defaults.
    pub fn from_template(template: Option<&VendorInvoiceTemplate>) -> Self {
        let mut config = Self::default();
        let Some(t) = template else { return config };

        let override_label = |target: &mut String, hint: &Option<String>| {
            if let Some(hint) = hint {
                if !hint.trim().is_empty() {
                    *target = regex::escape(hint.trim());
                }
            }
        };

        override_label(&mut config.invoice_number_label, &t.invoice_number_label);
        override_label(&mut config.invoice_date_label, &t.invoice_date_label);
        override_label(&mut config.due_date_label, &t.due_date_label);
        override_label(&mut config.vendor_label, &t.vendor_label);
        override_label(&mut config.subtotal_label, &t.subtotal_label);
        override_label(&mut config.tax_label, &t.tax_label);
        override_label(&mut config.total_label, &t.total_label);
        config
    }
}

// Uma regra de campo: rótulo + padrão de valor + setter. A lista ordenada
// substitui a cascata de matches ad hoc e deixa cada regra testável.
struct FieldRule {
    pattern: Regex,
    apply: fn(&mut ParsedInvoice, &str),
}

pub struct InvoiceParser {
    rules: Vec<FieldRule>,
}

impl InvoiceParser {
    pub fn new(config: &ParserConfig) -> Self {
        let specs: [(&str, &str, fn(&mut ParsedInvoice, &str)); 7] = [
            (&config.invoice_number_label, ALNUM_ID, |p, v| {
                p.invoice_number = Some(v.to_string());
            }),
            (&config.invoice_date_label, ISO_DATE, |p, v| {
                p.invoice_date = parse_iso_date(v);
            }),
            (&config.due_date_label, ISO_DATE, |p, v| {
                p.due_date = parse_iso_date(v);
            }),
            (&config.vendor_label, REST_OF_LINE, |p, v| {
                p.vendor_name = Some(v.trim().to_string());
            }),
            (&config.subtotal_label, MONEY, |p, v| {
                p.sub_total = parse_decimal(v);
            }),
            (&config.tax_label, MONEY, |p, v| {
                p.tax_amount = parse_decimal(v);
            }),
            (&config.total_label, MONEY, |p, v| {
                p.total_amount = parse_decimal(v);
            }),
        ];

        let rules = specs
            .into_iter()
            .filter_map(|(label, value, apply)| {
                let pattern = format!(r"(?im)^\s*(?:{})\s*[:#]?\s*{}", label, value);
                match Regex::new(&pattern) {
                    Ok(pattern) => Some(FieldRule { pattern, apply }),
                    Err(e) => {
                        // Dica de rótulo inválida no template: a regra é pulada
                        // e o campo fica ausente.
                        tracing::warn!("Regra de parse descartada ({}): {}", label, e);
                        None
                    }
                }
            })
            .collect();

        Self { rules }
    }

    pub fn parse(&self, text: &str) -> ParsedInvoice {
        let mut parsed = ParsedInvoice::default();

        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(text) {
                if let Some(value) = caps.get(1) {
                    (rule.apply)(&mut parsed, value.as_str());
                }
            }
        }

        parsed.line_items = extract_line_items(text);
        parsed.confidence = score_confidence(&parsed);
        parsed
    }
}

impl Default for InvoiceParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Tolera separador de milhar; falha de parse vira `None`, nunca erro.
fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(&value.replace(',', "")).ok()
}

fn looks_like_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    HEADER_TOKENS.iter().any(|token| lower.contains(token))
}

/// Varre a seção delimitada de itens procurando linhas no formato
/// `<descrição> <qtd> <preço-unitário> <valor>`.
fn extract_line_items(text: &str) -> Vec<ParsedLineItem> {
    let mut items = Vec::new();
    let mut in_items = false;

    for line in text.lines() {
        let line = line.trim();

        if !in_items {
            if ITEMS_MARKER.is_match(line) || (looks_like_header(line) && !line.is_empty()) {
                in_items = true;
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }

        // Linha de totais encerra a tabela
        if TOTALS_BOUNDARY.is_match(line) {
            break;
        }

        if let Some(item) = parse_item_row(line) {
            items.push(item);
        }
    }

    items
}

fn parse_item_row(line: &str) -> Option<ParsedLineItem> {
    let caps = ITEM_ROW.captures(line)?;
    let description = caps.get(1)?.as_str().trim().to_string();

    // Cabeçalhos repetidos no meio da tabela também são descartados
    if looks_like_header(&description) {
        return None;
    }

    // Falha numérica pula a linha, não derruba o parse
    let quantity = parse_decimal(caps.get(2)?.as_str())?;
    let unit_price = parse_decimal(caps.get(3)?.as_str())?;
    let amount = parse_decimal(caps.get(4)?.as_str())?;

    // Heurística de consistência: linha que fecha a conta merece mais confiança
    let confidence = if quantity * unit_price == amount {
        Decimal::from(90)
    } else {
        Decimal::from(60)
    };

    Some(ParsedLineItem {
        description,
        quantity,
        unit_price,
        amount,
        confidence,
    })
}

/// Soma ponderada e limitada da presença de campos. Campos de documento
/// pesam mais que itens. Sinal de triagem apenas.
fn score_confidence(parsed: &ParsedInvoice) -> Decimal {
    let mut score = Decimal::ZERO;

    if parsed.invoice_number.is_some() {
        score += Decimal::from(25);
    }
    if parsed.invoice_date.is_some() {
        score += Decimal::from(20);
    }
    if parsed.total_amount.is_some() {
        score += Decimal::from(20);
    }
    if parsed.due_date.is_some() {
        score += Decimal::from(10);
    }
    if parsed.vendor_name.is_some() {
        score += Decimal::from(10);
    }
    if parsed.sub_total.is_some() {
        score += Decimal::from(5);
    }
    if parsed.tax_amount.is_some() {
        score += Decimal::from(5);
    }
    score += Decimal::from(3) * Decimal::from(parsed.line_items.len());

    score.min(Decimal::from(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        Acme Office Supplies
        Invoice Number: INV-2024-001
        Invoice Date: 2024-03-01
        Vendor: Acme Office Supplies Ltd

        Description            Qty    Unit Price    Amount
        Paper A4 box           10     1,200.00      12,000.00
        Toner cartridge        2      4,000.00      8,000.00

        Sub Total: 20,000.00
        Tax: 3,400.00
        Total Amount: 163,800.00
    "#;

    #[test]
    fn extracts_labeled_fields_and_leaves_missing_ones_absent() {
        let parser = InvoiceParser::default();
        let parsed = parser.parse(SAMPLE);

        assert_eq!(parsed.invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(
            parsed.invoice_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        // Sem linha de vencimento: o campo fica ausente, não é adivinhado
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.total_amount, Some(dec!(163800.00)));
        assert_eq!(parsed.sub_total, Some(dec!(20000.00)));
    }

    #[test]
    fn parses_item_rows_and_discards_table_headers() {
        let parser = InvoiceParser::default();
        let parsed = parser.parse(SAMPLE);

        assert_eq!(parsed.line_items.len(), 2);
        assert_eq!(parsed.line_items[0].description, "Paper A4 box");
        assert_eq!(parsed.line_items[0].quantity, dec!(10));
        assert_eq!(parsed.line_items[0].unit_price, dec!(1200.00));
        assert_eq!(parsed.line_items[0].amount, dec!(12000.00));
        // 10 x 1200 == 12000: linha consistente
        assert_eq!(parsed.line_items[0].confidence, dec!(90));
    }

    #[test]
    fn totals_line_ends_the_items_section() {
        let parser = InvoiceParser::default();
        let parsed = parser.parse(SAMPLE);

        // "Sub Total"/"Tax"/"Total Amount" não viram itens
        assert!(parsed
            .line_items
            .iter()
            .all(|i| !i.description.to_lowercase().contains("total")));
    }

    #[test]
    fn unusable_without_number_date_and_positive_total() {
        let parser = InvoiceParser::default();

        let parsed = parser.parse("Vendor: Acme\nTotal Amount: 100.00");
        assert!(!parsed.is_usable());

        let parsed = parser.parse(
            "Invoice Number: X-1\nInvoice Date: 2024-01-10\nTotal Amount: 0",
        );
        assert!(!parsed.is_usable());

        let parsed = parser.parse(
            "Invoice Number: X-1\nInvoice Date: 2024-01-10\nTotal Amount: 50.00",
        );
        assert!(parsed.is_usable());
    }

    #[test]
    fn skips_rows_with_unparseable_numbers() {
        let text = r#"
            Items:
            Widget   abc   10.00   10.00
            Gadget   2     5.00    10.00
        "#;
        let parser = InvoiceParser::default();
        let parsed = parser.parse(text);

        assert_eq!(parsed.line_items.len(), 1);
        assert_eq!(parsed.line_items[0].description, "Gadget");
    }

    #[test]
    fn confidence_is_capped_at_one_hundred() {
        let mut text = String::from(
            "Invoice Number: A-1\nInvoice Date: 2024-01-01\nDue Date: 2024-02-01\n\
             Vendor: Acme\nSub Total: 10.00\nTax: 1.00\nTotal Amount: 11.00\nItems:\n",
        );
        for i in 0..40 {
            text.push_str(&format!("Widget{} 1 1.00 1.00\n", i));
        }

        let parser = InvoiceParser::default();
        let parsed = parser.parse(&text);
        assert_eq!(parsed.confidence, dec!(100));
    }

    #[test]
    fn template_label_hint_overrides_the_default() {
        let config = ParserConfig {
            invoice_number_label: regex::escape("Nota Fiscal"),
            ..ParserConfig::default()
        };
        let parser = InvoiceParser::new(&config);

        let parsed = parser.parse("Nota Fiscal: NF-555\nInvoice Date: 2024-05-05");
        assert_eq!(parsed.invoice_number.as_deref(), Some("NF-555"));
    }

    #[test]
    fn document_fields_outweigh_line_items_in_confidence() {
        let parser = InvoiceParser::default();

        let doc_only = parser.parse("Invoice Number: A-1\nInvoice Date: 2024-01-01");
        let items_only = parser.parse("Items:\nWidget 1 5.00 5.00\nGadget 1 5.00 5.00");

        assert!(doc_only.confidence > items_only.confidence);
    }
}
