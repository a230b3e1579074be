// src/services/ledger_sync.rs
//
// Sincronização do plano de contas com o provedor externo. O cache local em
// gl_accounts é a fonte que o resto do sistema consulta; o provedor só é
// tocado aqui, no máximo uma vez por janela de 7 dias.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::LedgerRepository,
    models::ledger::{GlAccount, ProviderAccount, SyncReport},
    services::external::LedgerProvider,
};

pub const SYNC_INTERVAL_DAYS: i64 = 7;

/// Janela de ressincronização. Sem registro de sync anterior, sempre pode.
pub fn can_sync(last_synced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_synced_at {
        Some(last) => now - last >= Duration::days(SYNC_INTERVAL_DAYS),
        None => true,
    }
}

#[derive(Debug, Default)]
pub struct AccountDiff {
    pub to_insert: Vec<ProviderAccount>,
    /// (id local, dados novos do provedor)
    pub to_update: Vec<(Uuid, ProviderAccount)>,
}

/// Diff puro entre o retorno do provedor e o cache local, chaveado por
/// provider_key. Contas que sumiram no provedor ficam como estão: o cache
/// nunca apaga uma conta que alguma fatura pode referenciar.
pub fn diff_accounts(fetched: Vec<ProviderAccount>, cached: &[GlAccount]) -> AccountDiff {
    let mut diff = AccountDiff::default();

    for account in fetched {
        match cached.iter().find(|c| c.provider_key == account.provider_key) {
            None => diff.to_insert.push(account),
            Some(local) => {
                let changed = local.code != account.code
                    || local.name != account.name
                    || local.account_type != account.account_type
                    || local.is_active != account.is_active;
                if changed {
                    diff.to_update.push((local.id, account));
                }
            }
        }
    }

    diff
}

#[derive(Clone)]
pub struct LedgerSyncService {
    repo: LedgerRepository,
    provider: Arc<dyn LedgerProvider>,
}

impl LedgerSyncService {
    pub fn new(repo: LedgerRepository, provider: Arc<dyn LedgerProvider>) -> Self {
        Self { repo, provider }
    }

    pub async fn sync(&self, company_id: Uuid) -> Result<SyncReport, AppError> {
        let connection = self.repo.get_connection(self.repo.pool(), company_id).await?;
        let last_synced_at = connection.and_then(|c| c.last_synced_at);

        if !can_sync(last_synced_at, Utc::now()) {
            return Err(AppError::BusinessRule(format!(
                "Plano de contas sincronizado há menos de {} dias. Aguarde a próxima janela.",
                SYNC_INTERVAL_DAYS
            )));
        }

        let fetched = self
            .provider
            .fetch_accounts()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;
        let total_fetched = fetched.len();

        let cached = self.repo.list_all_accounts(self.repo.pool(), company_id).await?;
        let diff = diff_accounts(fetched, &cached);

        let mut tx = self.repo.pool().begin().await?;

        let inserted = diff.to_insert.len();
        for account in &diff.to_insert {
            self.repo.insert_account(&mut *tx, company_id, account).await?;
        }

        let updated = diff.to_update.len();
        for (id, account) in &diff.to_update {
            self.repo.update_account(&mut *tx, *id, account).await?;
        }

        self.repo.touch_synced(&mut *tx, company_id).await?;
        tx.commit().await?;

        tracing::info!(%company_id, inserted, updated, total_fetched, "plano de contas sincronizado");

        Ok(SyncReport { inserted, updated, total_fetched })
    }

    pub async fn test_credentials(&self) -> Result<bool, AppError> {
        self.provider
            .test_credentials()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_account(key: i64, code: &str, name: &str) -> ProviderAccount {
        ProviderAccount {
            provider_key: key,
            code: code.to_string(),
            name: name.to_string(),
            account_type: "EXPENSE".to_string(),
            is_active: true,
        }
    }

    fn cached_account(key: i64, code: &str, name: &str) -> GlAccount {
        GlAccount {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            provider_key: key,
            code: code.to_string(),
            name: name.to_string(),
            account_type: "EXPENSE".to_string(),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn sync_window_blocks_before_seven_days() {
        let now = Utc::now();

        assert!(!can_sync(Some(now - Duration::days(3)), now));
        assert!(can_sync(Some(now - Duration::days(8)), now));
        assert!(can_sync(Some(now - Duration::days(7)), now));
        assert!(can_sync(None, now));
    }

    #[test]
    fn unknown_provider_keys_become_inserts() {
        let cached = vec![cached_account(1, "1.01", "Caixa")];
        let fetched = vec![
            provider_account(1, "1.01", "Caixa"),
            provider_account(2, "2.01", "Fornecedores"),
        ];

        let diff = diff_accounts(fetched, &cached);

        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].provider_key, 2);
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn changed_fields_become_updates_and_identical_rows_are_skipped() {
        let cached = vec![
            cached_account(1, "1.01", "Caixa"),
            cached_account(2, "2.01", "Fornecedores"),
        ];
        let fetched = vec![
            provider_account(1, "1.01", "Caixa"),
            provider_account(2, "2.01", "Fornecedores a Pagar"),
        ];

        let diff = diff_accounts(fetched, &cached);

        assert!(diff.to_insert.is_empty());
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].0, cached[1].id);
        assert_eq!(diff.to_update[0].1.name, "Fornecedores a Pagar");
    }

    #[test]
    fn accounts_missing_from_the_provider_are_left_alone() {
        let cached = vec![cached_account(9, "9.99", "Conta Antiga")];
        let diff = diff_accounts(vec![], &cached);

        assert!(diff.to_insert.is_empty());
        assert!(diff.to_update.is_empty());
    }
}
