// src/services/template_resolver.rs

use uuid::Uuid;

use crate::models::vendor::Vendor;

/// Fornecedor efetivo do reprocessamento. O vendor_id já gravado na fatura
/// (pré-selecionado no upload) é autoritativo: o nome extraído do OCR nunca
/// o sobrescreve, mesmo que case com outro fornecedor. Só quando ele falta o
/// nome extraído resolve por matching.
pub fn resolve_vendor(
    preset: Option<Uuid>,
    parsed_name: Option<&str>,
    vendors: &[Vendor],
) -> Option<Uuid> {
    if preset.is_some() {
        return preset;
    }
    parsed_name
        .and_then(|name| match_vendor_by_name(name, vendors))
        .map(|vendor| vendor.id)
}

/// Matching bidirecional de substring, sem diferenciar maiúsculas, entre o
/// nome de fornecedor extraído do OCR e os fornecedores ativos da empresa.
/// Fica com o primeiro que casar, na ordem de entrada - heurística de melhor
/// esforço, não um match garantidamente único.
pub fn match_vendor_by_name<'a>(parsed_name: &str, vendors: &'a [Vendor]) -> Option<&'a Vendor> {
    let needle = parsed_name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    vendors.iter().find(|vendor| {
        let candidate = vendor.name.to_lowercase();
        candidate.contains(&needle) || needle.contains(&candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn vendor(name: &str) -> Vendor {
        Vendor {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: name.to_string(),
            is_active: true,
            created_at: None,
        }
    }

    #[test]
    fn matches_case_insensitively_in_both_directions() {
        let vendors = vec![vendor("Acme Suprimentos Ltda"), vendor("Beta Corp")];

        // Nome extraído mais curto que o cadastrado
        let hit = match_vendor_by_name("acme suprimentos", &vendors);
        assert_eq!(hit.map(|v| v.name.as_str()), Some("Acme Suprimentos Ltda"));

        // Nome extraído mais longo que o cadastrado
        let hit = match_vendor_by_name("BETA CORP FILIAL SUL", &vendors);
        assert_eq!(hit.map(|v| v.name.as_str()), Some("Beta Corp"));
    }

    #[test]
    fn first_match_wins_on_ambiguity() {
        let vendors = vec![vendor("Alfa Transportes"), vendor("Alfa Transportes SP")];

        let hit = match_vendor_by_name("Alfa Transportes", &vendors);
        assert_eq!(hit.map(|v| v.name.as_str()), Some("Alfa Transportes"));
    }

    #[test]
    fn no_match_and_empty_input_yield_none() {
        let vendors = vec![vendor("Acme")];

        assert!(match_vendor_by_name("Fornecedor Desconhecido", &vendors).is_none());
        assert!(match_vendor_by_name("   ", &vendors).is_none());
    }

    #[test]
    fn a_preset_vendor_id_wins_over_a_matching_name() {
        let vendors = vec![vendor("Acme Suprimentos Ltda")];
        // Outro fornecedor, escolhido no upload; o texto casa com a Acme
        let preset = Uuid::new_v4();

        let resolved = resolve_vendor(Some(preset), Some("Acme Suprimentos"), &vendors);

        assert_eq!(resolved, Some(preset));
        assert_ne!(resolved, Some(vendors[0].id));
    }

    #[test]
    fn without_preset_the_extracted_name_resolves() {
        let vendors = vec![vendor("Acme Suprimentos Ltda")];

        assert_eq!(
            resolve_vendor(None, Some("acme suprimentos"), &vendors),
            Some(vendors[0].id)
        );
        assert_eq!(resolve_vendor(None, None, &vendors), None);
        assert_eq!(resolve_vendor(None, Some("Desconhecido"), &vendors), None);
    }
}
