use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::invoice::InvoiceStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Token inválido")]
    InvalidToken,

    // Ausência de vínculo com a empresa vira 404 para não vazar existência.
    #[error("Recurso não encontrado")]
    NotFound,

    #[error("Permissão insuficiente: {0}")]
    Forbidden(String),

    #[error("Já existe uma fatura com o número '{0}' nesta empresa")]
    DuplicateInvoiceNumber(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Transição de status inválida: {action} a partir de {from:?}")]
    InvalidTransition { from: InvoiceStatus, action: &'static str },

    // CAS de versão falhou: outro chamador alterou a fatura primeiro.
    #[error("Conflito de concorrência: {0}")]
    Conflict(String),

    #[error("Regra de negócio violada: {0}")]
    BusinessRule(String),

    #[error("Contabilização bloqueada: {0}")]
    PostingBlocked(String),

    // Falha de dependência externa já capturada e registrada; a mensagem
    // original segue no corpo do resultado.
    #[error("Falha em serviço externo: {0}")]
    ExternalService(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Recurso não encontrado.".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::DuplicateInvoiceNumber(num) => (
                StatusCode::CONFLICT,
                format!("Já existe uma fatura com o número '{}' nesta empresa.", num),
            ),
            AppError::UniqueConstraintViolation(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidTransition { from, action } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Não é possível executar '{}' com a fatura em {:?}.", action, from),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BusinessRule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PostingBlocked(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Contabilização bloqueada: {}", reason),
            ),
            AppError::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Falha em serviço externo: {}", msg),
            ),

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` loga a mensagem detalhada que o `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_and_version_conflicts_answer_409() {
        let cases = [
            AppError::UniqueConstraintViolation("Item de linha 2 duplicado na fatura.".to_string()),
            AppError::DuplicateInvoiceNumber("INV-1".to_string()),
            AppError::Conflict("versão defasada".to_string()),
        ];
        for error in cases {
            assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn business_rules_and_blocked_posting_answer_422() {
        let business = AppError::BusinessRule("janela de sincronização".to_string());
        assert_eq!(business.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let blocked = AppError::PostingBlocked("item sem conta contábil".to_string());
        assert_eq!(blocked.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
