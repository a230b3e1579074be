// src/db/membership_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::auth::CompanyMember};

#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Vínculo ativo do usuário com a empresa. `None` vira 404 lá em cima,
    /// para não vazar a existência da empresa.
    pub async fn find_membership(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<CompanyMember>, AppError> {
        let member = sqlx::query_as::<_, CompanyMember>(
            r#"
            SELECT * FROM company_members
            WHERE user_id = $1 AND company_id = $2 AND is_active = true
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    pub async fn user_has_permission(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        permission_slug: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM company_members cm
                JOIN roles r ON cm.role_id = r.id
                JOIN role_permissions rp ON r.id = rp.role_id
                JOIN permissions p ON rp.permission_id = p.id
                WHERE cm.user_id = $1
                  AND cm.company_id = $2
                  AND cm.is_active = true
                  AND p.slug = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(permission_slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
