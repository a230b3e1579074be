// src/config.rs
//
// Estado compartilhado da aplicação. Tudo que os handlers precisam é montado
// uma vez aqui a partir das variáveis de ambiente e clonado barato (Arc/pools
// por baixo) para dentro do axum.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{InvoiceRepository, LedgerRepository, MembershipRepository, VendorRepository},
    services::{
        external::{
            BlobStore, HttpLedgerProvider, HttpTextExtractor, LedgerProvider, LocalBlobStore,
            Notifier, TextExtractor, WebhookNotifier,
        },
        invoice_service::InvoiceService,
        ledger_sync::LedgerSyncService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_secret: String,
    pub invoice_service: InvoiceService,
    pub ledger_sync_service: LedgerSyncService,
    pub vendor_repo: VendorRepository,
    pub ledger_repo: LedgerRepository,
    pub membership_repo: MembershipRepository,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL não definida no ambiente")?;
        let jwt_secret =
            std::env::var("JWT_SECRET").context("JWT_SECRET não definida no ambiente")?;
        let ocr_service_url = std::env::var("OCR_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8300".to_string());
        let ledger_api_url = std::env::var("LEDGER_API_URL")
            .unwrap_or_else(|_| "http://localhost:8400".to_string());
        let ledger_api_token = std::env::var("LEDGER_API_TOKEN").unwrap_or_default();
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        // Sem WEBHOOK_URL as notificações são descartadas com log
        let webhook_url = std::env::var("WEBHOOK_URL").ok();

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await
            .context("Não foi possível conectar ao banco de dados")?;

        let invoice_repo = InvoiceRepository::new(pool.clone());
        let vendor_repo = VendorRepository::new(pool.clone());
        let ledger_repo = LedgerRepository::new(pool.clone());
        let membership_repo = MembershipRepository::new(pool.clone());

        let extractor: Arc<dyn TextExtractor> = Arc::new(HttpTextExtractor::new(ocr_service_url));
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(upload_dir));
        let provider: Arc<dyn LedgerProvider> =
            Arc::new(HttpLedgerProvider::new(ledger_api_url, ledger_api_token));
        let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(webhook_url));

        let invoice_service = InvoiceService::new(
            invoice_repo,
            vendor_repo.clone(),
            extractor,
            blobs,
            notifier,
        );
        let ledger_sync_service = LedgerSyncService::new(ledger_repo.clone(), provider);

        Ok(Self {
            pool,
            jwt_secret,
            invoice_service,
            ledger_sync_service,
            vendor_repo,
            ledger_repo,
            membership_repo,
        })
    }
}
