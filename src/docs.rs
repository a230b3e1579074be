// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Faturas ---
        handlers::invoices::create_invoice,
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::update_invoice,
        handlers::invoices::delete_invoice,
        handlers::invoices::approve_invoice,
        handlers::invoices::reject_invoice,
        handlers::invoices::pay_invoice,
        handlers::invoices::process_invoice,
        handlers::invoices::post_invoice,

        // --- Fornecedores ---
        handlers::vendors::create_vendor,
        handlers::vendors::list_vendors,
        handlers::vendors::create_template,
        handlers::vendors::update_template,
        handlers::vendors::list_templates,

        // --- Ledger ---
        handlers::ledger::list_accounts,
        handlers::ledger::sync_accounts,
        handlers::ledger::test_credentials,
    ),
    components(
        schemas(
            // --- Faturas ---
            models::invoice::InvoiceStatus,
            models::invoice::Invoice,
            models::invoice::InvoiceLineItem,
            models::invoice::InvoiceDetail,
            models::invoice::CreateInvoicePayload,
            models::invoice::UpdateInvoicePayload,
            models::invoice::LineItemPayload,
            models::invoice::ReviewPayload,
            models::invoice::PaymentPayload,

            // --- Fornecedores ---
            models::vendor::Vendor,
            models::vendor::VendorInvoiceTemplate,
            handlers::vendors::CreateVendorPayload,
            handlers::vendors::TemplatePayload,

            // --- Ledger ---
            models::ledger::GlAccount,
            models::ledger::LedgerConnection,
            models::ledger::SyncReport,

            // --- Auth ---
            models::auth::User,
            models::auth::CompanyMember,
        )
    ),
    tags(
        (name = "Faturas", description = "Ciclo de vida de faturas de fornecedor: OCR, aprovação, pagamento e contabilização"),
        (name = "Fornecedores", description = "Cadastro de fornecedores e templates de extração"),
        (name = "Ledger", description = "Plano de contas cacheado e sincronização com o provedor externo"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
