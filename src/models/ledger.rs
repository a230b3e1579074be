// src/models/ledger.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Conta do plano de contas, cacheada localmente a partir do provedor
/// externo. A chave de sincronização é o id numérico do provedor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlAccount {
    pub id: Uuid,

    #[schema(ignore)]
    pub company_id: Uuid,

    #[schema(example = 30100)]
    pub provider_key: i64,

    #[schema(example = "2.1.01")]
    pub code: String,

    #[schema(example = "Fornecedores a Pagar")]
    pub name: String,

    #[schema(example = "LIABILITY")]
    pub account_type: String,

    pub is_active: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Conta como o provedor externo a devolve no "fetch all accounts".
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    pub provider_key: i64,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConnection {
    #[schema(ignore)]
    pub company_id: Uuid,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub total_fetched: usize,
}
