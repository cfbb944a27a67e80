//! Prompt construction per conference type

use crate::types::ConferenceType;

/// Fields the AI service is asked to check, per document category
fn checked_fields(conference_type: ConferenceType) -> &'static [&'static str] {
    match conference_type {
        ConferenceType::Invoice => &[
            "invoice_number",
            "issue_date",
            "exporter",
            "importer",
            "incoterm",
            "currency",
            "payment_terms",
            "country_of_origin",
            "total_value",
        ],
        ConferenceType::PackingList => &[
            "packing_list_number",
            "exporter",
            "importer",
            "package_count",
            "gross_weight",
            "net_weight",
            "marks_and_numbers",
        ],
        ConferenceType::BillOfLading => &[
            "bl_number",
            "shipper",
            "consignee",
            "notify_party",
            "port_of_loading",
            "port_of_discharge",
            "vessel",
            "container_numbers",
            "freight_terms",
        ],
        ConferenceType::CertificateOfOrigin => &[
            "certificate_number",
            "exporter",
            "importer",
            "country_of_origin",
            "origin_criterion",
            "issuing_authority",
            "signature",
        ],
        ConferenceType::ImportDeclaration => &[
            "declaration_number",
            "importer",
            "customs_regime",
            "hs_codes",
            "customs_value",
            "taxes",
        ],
    }
}

/// Build the analysis prompt for a document of the given type
pub fn build_prompt(conference_type: ConferenceType) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are a foreign-trade compliance analyst reviewing a {}.\n\n",
        conference_type.display_name()
    ));

    prompt.push_str("## Fields to check\n\n");
    for field in checked_fields(conference_type) {
        prompt.push_str(&format!("- {}\n", field));
    }
    prompt.push('\n');

    prompt.push_str("## Rules\n\n");
    prompt.push_str("1. Only report what is present in the document; never invent values\n");
    prompt.push_str("2. A missing mandatory field is a critical_error\n");
    prompt.push_str("3. Inconsistent or unusual values are alerts\n");
    prompt.push_str("4. Remarks that need no action are observations\n");
    prompt.push_str("5. summary.status is \"error\" if any critical_error exists, else \"alert\" if any alert exists, else \"ok\"\n\n");

    prompt.push_str("## Response format\n\n");
    prompt.push_str("Reply with a single JSON object and nothing else:\n");
    prompt.push_str(
        r#"{"summary": {"status": "ok|alert|error", "critical_error_count": 0, "observation_count": 0, "alert_count": 0, "conclusion": "..."},
 "items": [{"field": "...", "status": "ok|alert|error", "kind": "ok|observation|alert|critical_error", "extracted_value": "...", "description": "..."}]"#,
    );

    if conference_type.has_line_items() {
        prompt.push_str(
            r#",
 "line_items": [{"code": "...", "description": "...", "hs_code": "...", "quantity": "...", "unit": "...", "unit_price": "...", "total_value": "..."}]"#,
        );
    }
    prompt.push_str("}\n");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_items_only_for_tabular_types() {
        assert!(build_prompt(ConferenceType::Invoice).contains("line_items"));
        assert!(build_prompt(ConferenceType::PackingList).contains("line_items"));
        assert!(!build_prompt(ConferenceType::BillOfLading).contains("line_items"));
    }

    #[test]
    fn test_prompt_names_document_and_fields() {
        let prompt = build_prompt(ConferenceType::CertificateOfOrigin);
        assert!(prompt.contains("Certificate of Origin"));
        assert!(prompt.contains("- origin_criterion"));
    }
}
