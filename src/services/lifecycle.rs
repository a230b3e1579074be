// src/services/lifecycle.rs
//
// Máquina de estados da fatura. Guardas puras: quem grava é o serviço, via
// compare-and-swap de versão no repositório.
//
// Cancelled e Overdue são estados declarados sem transição de chegada; as
// guardas os tratam como qualquer outro estado inválido para a ação.

use crate::{
    common::error::AppError,
    models::invoice::{Invoice, InvoiceStatus},
};

/// Aprovação sai de Draft ou PendingApproval.
pub fn ensure_can_approve(status: InvoiceStatus) -> Result<(), AppError> {
    match status {
        InvoiceStatus::Draft | InvoiceStatus::PendingApproval => Ok(()),
        from => Err(AppError::InvalidTransition { from, action: "aprovar" }),
    }
}

/// Rejeição sai de Draft, PendingApproval ou Approved. Rejeitar uma fatura
/// já aprovada é intencional, não um bug.
pub fn ensure_can_reject(status: InvoiceStatus) -> Result<(), AppError> {
    match status {
        InvoiceStatus::Draft | InvoiceStatus::PendingApproval | InvoiceStatus::Approved => Ok(()),
        from => Err(AppError::InvalidTransition { from, action: "rejeitar" }),
    }
}

/// Pagamento só sai de Approved.
pub fn ensure_can_pay(status: InvoiceStatus) -> Result<(), AppError> {
    match status {
        InvoiceStatus::Approved => Ok(()),
        from => Err(AppError::InvalidTransition { from, action: "pagar" }),
    }
}

/// Edição (troca completa de campos e itens) é livre enquanto não Paid.
/// Depois da contabilização os campos financeiros são imutáveis.
pub fn ensure_can_edit(invoice: &Invoice) -> Result<(), AppError> {
    if invoice.posted_to_gl {
        return Err(AppError::BusinessRule(
            "Fatura já contabilizada no ledger não pode ser editada.".to_string(),
        ));
    }
    match invoice.status {
        InvoiceStatus::Paid => Err(AppError::InvalidTransition {
            from: InvoiceStatus::Paid,
            action: "editar",
        }),
        _ => Ok(()),
    }
}

/// Exclusão é permitida enquanto não Paid.
pub fn ensure_can_delete(status: InvoiceStatus) -> Result<(), AppError> {
    match status {
        InvoiceStatus::Paid => Err(AppError::InvalidTransition {
            from: InvoiceStatus::Paid,
            action: "excluir",
        }),
        _ => Ok(()),
    }
}

/// A edição pode alternar Draft <-> PendingApproval; qualquer outro alvo de
/// status exige a operação dedicada (aprovar, rejeitar, pagar, contabilizar).
pub fn ensure_valid_edit_status(
    current: InvoiceStatus,
    requested: InvoiceStatus,
) -> Result<(), AppError> {
    if requested == current {
        return Ok(());
    }
    match (current, requested) {
        (InvoiceStatus::Draft, InvoiceStatus::PendingApproval)
        | (InvoiceStatus::PendingApproval, InvoiceStatus::Draft) => Ok(()),
        (from, _) => Err(AppError::InvalidTransition { from, action: "alterar status via edição" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InvoiceStatus; 7] = [
        InvoiceStatus::Draft,
        InvoiceStatus::PendingApproval,
        InvoiceStatus::Approved,
        InvoiceStatus::Rejected,
        InvoiceStatus::Paid,
        InvoiceStatus::Cancelled,
        InvoiceStatus::Overdue,
    ];

    #[test]
    fn pay_only_from_approved() {
        for status in ALL {
            let result = ensure_can_pay(status);
            if status == InvoiceStatus::Approved {
                assert!(result.is_ok());
            } else {
                assert!(result.is_err(), "pagar deveria falhar a partir de {:?}", status);
            }
        }
    }

    #[test]
    fn approve_from_draft_and_pending_only() {
        assert!(ensure_can_approve(InvoiceStatus::Draft).is_ok());
        assert!(ensure_can_approve(InvoiceStatus::PendingApproval).is_ok());
        assert!(ensure_can_approve(InvoiceStatus::Approved).is_err());
        assert!(ensure_can_approve(InvoiceStatus::Paid).is_err());
        assert!(ensure_can_approve(InvoiceStatus::Cancelled).is_err());
    }

    #[test]
    fn an_approved_invoice_remains_rejectable() {
        assert!(ensure_can_reject(InvoiceStatus::Approved).is_ok());
        assert!(ensure_can_reject(InvoiceStatus::Paid).is_err());
        assert!(ensure_can_reject(InvoiceStatus::Rejected).is_err());
    }

    #[test]
    fn paid_blocks_edit_and_delete() {
        assert!(ensure_can_delete(InvoiceStatus::Paid).is_err());
        for status in ALL {
            if status != InvoiceStatus::Paid {
                assert!(ensure_can_delete(status).is_ok());
            }
        }
    }

    #[test]
    fn edit_may_only_toggle_draft_and_pending() {
        assert!(ensure_valid_edit_status(InvoiceStatus::Draft, InvoiceStatus::PendingApproval).is_ok());
        assert!(ensure_valid_edit_status(InvoiceStatus::PendingApproval, InvoiceStatus::Draft).is_ok());
        assert!(ensure_valid_edit_status(InvoiceStatus::Approved, InvoiceStatus::Approved).is_ok());
        assert!(ensure_valid_edit_status(InvoiceStatus::Draft, InvoiceStatus::Approved).is_err());
        assert!(ensure_valid_edit_status(InvoiceStatus::Approved, InvoiceStatus::Paid).is_err());
    }
}
