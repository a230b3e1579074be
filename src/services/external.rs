// src/services/external.rs
//
// Colaboradores externos atrás de traits, para o serviço não conhecer
// transporte nenhum: OCR via HTTP, blobs em disco, ledger via HTTP e
// notificações por webhook. Os testes substituem tudo por fakes.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::ledger::ProviderAccount;

/// Extrai o texto bruto de um documento já armazenado.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, storage_path: &str, file_type: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub storage_path: String,
    pub public_url: String,
    pub size: i64,
}

/// Guarda o arquivo original da fatura e devolve onde ele ficou.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: &[u8], file_type: &str) -> anyhow::Result<StoredFile>;
}

/// Plano de contas do provedor contábil externo.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    async fn fetch_accounts(&self) -> anyhow::Result<Vec<ProviderAccount>>;
    async fn test_credentials(&self) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum NotificationEvent {
    #[serde(rename_all = "camelCase")]
    InvoiceApproved { company_id: Uuid, invoice_id: Uuid },
    #[serde(rename_all = "camelCase")]
    InvoiceRejected { company_id: Uuid, invoice_id: Uuid },
    #[serde(rename_all = "camelCase")]
    InvoicePaid { company_id: Uuid, invoice_id: Uuid },
    #[serde(rename_all = "camelCase")]
    InvoicePosted { company_id: Uuid, invoice_id: Uuid },
}

/// Notificações são melhor-esforço: falha vira log, nunca erro da operação.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Implementações concretas
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HttpTextExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextExtractor {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ExtractResponse {
    text: String,
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract_text(&self, storage_path: &str, file_type: &str) -> anyhow::Result<String> {
        let url = format!("{}/extract", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&json!({ "storagePath": storage_path, "fileType": file_type }))
            .send()
            .await
            .context("falha ao chamar o serviço de OCR")?
            .error_for_status()
            .context("serviço de OCR devolveu erro")?;

        let body: ExtractResponse = response
            .json()
            .await
            .context("resposta inválida do serviço de OCR")?;

        Ok(body.text)
    }
}

#[derive(Clone)]
pub struct LocalBlobStore {
    upload_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self { upload_dir: upload_dir.into() }
    }
}

fn extension_for(file_type: &str) -> &'static str {
    match file_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        _ => "bin",
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], file_type: &str) -> anyhow::Result<StoredFile> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .context("falha ao criar o diretório de uploads")?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(file_type));
        let path = self.upload_dir.join(&file_name);

        tokio::fs::write(&path, bytes)
            .await
            .context("falha ao gravar o arquivo da fatura")?;

        Ok(StoredFile {
            storage_path: path.to_string_lossy().into_owned(),
            public_url: format!("/uploads/{}", file_name),
            size: bytes.len() as i64,
        })
    }
}

#[derive(Clone)]
pub struct HttpLedgerProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpLedgerProvider {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_token,
        }
    }
}

#[async_trait]
impl LedgerProvider for HttpLedgerProvider {
    async fn fetch_accounts(&self) -> anyhow::Result<Vec<ProviderAccount>> {
        let url = format!("{}/accounts", self.base_url.trim_end_matches('/'));

        let accounts = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("falha ao chamar o provedor do ledger")?
            .error_for_status()
            .context("provedor do ledger devolveu erro")?
            .json::<Vec<ProviderAccount>>()
            .await
            .context("resposta inválida do provedor do ledger")?;

        Ok(accounts)
    }

    async fn test_credentials(&self) -> anyhow::Result<bool> {
        let url = format!("{}/ping", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("falha ao chamar o provedor do ledger")?;

        Ok(response.status().is_success())
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!(?event, "webhook não configurado, notificação descartada");
            return Ok(());
        };

        self.client
            .post(url)
            .json(&event)
            .send()
            .await
            .context("falha ao entregar o webhook")?
            .error_for_status()
            .context("webhook devolveu erro")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mime_types_map_to_their_extensions() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("text/strange"), "bin");
    }

    #[tokio::test]
    async fn notifier_without_url_is_a_noop() {
        let notifier = WebhookNotifier::new(None);
        let result = notifier
            .notify(NotificationEvent::InvoiceApproved {
                company_id: Uuid::new_v4(),
                invoice_id: Uuid::new_v4(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn blob_store_writes_under_the_upload_dir() {
        let dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let store = LocalBlobStore::new(&dir);

        let stored = store.store(b"conteudo", "application/pdf").await.unwrap();

        assert_eq!(stored.size, 8);
        assert!(stored.storage_path.ends_with(".pdf"));
        assert!(stored.public_url.starts_with("/uploads/"));
        assert_eq!(tokio::fs::read(&stored.storage_path).await.unwrap(), b"conteudo");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
