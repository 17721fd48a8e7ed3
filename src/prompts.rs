//! Prompts for purchase-order extraction.
//!
//! Every instruction sent to the hosted model lives here so a prompt change
//! is a one-file diff and tests can inspect the exact text.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::prompt`]; the constants here are used
//! only when no override is provided.

/// Default instruction sent with every purchase-order document.
pub const PO_EXTRACTION_PROMPT: &str = r#"You are an expert in reading Purchase Orders.
Extract the following details from the Purchase Order document:
- Vendor Name
- Vendor City
- Item Code
- Item Name
- Number of Items Requested
- Unit Price
- Total Price

If any of the above details are missing, please fill them with Null().
Present the information as a clean, table-like DataFrame output in plain text.
Do not include any code or extra lines.
Format the table as pipe-delimited rows: one header row, then one row per item.
Map Vendor Name and Vendor City to all the other details."#;

/// Build the user-message text for a PDF whose text layer was extracted.
///
/// The instruction comes first so the document text cannot push it out of
/// the model's attention window.
pub fn pdf_text_message(prompt: &str, document_text: &str) -> String {
    format!(
        "{prompt}\n\nPurchase Order document text:\n\"\"\"\n{}\n\"\"\"",
        document_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PO_FIELDS: [&str; 7] = [
        "Vendor Name",
        "Vendor City",
        "Item Code",
        "Item Name",
        "Number of Items Requested",
        "Unit Price",
        "Total Price",
    ];

    #[test]
    fn prompt_names_every_field() {
        for field in PO_FIELDS {
            assert!(
                PO_EXTRACTION_PROMPT.contains(field),
                "prompt is missing field {field:?}"
            );
        }
    }

    #[test]
    fn prompt_asks_for_nulls_and_vendor_mapping() {
        assert!(PO_EXTRACTION_PROMPT.contains("Null()"));
        assert!(PO_EXTRACTION_PROMPT.contains("Map Vendor Name and Vendor City"));
    }

    #[test]
    fn pdf_message_keeps_prompt_first() {
        let msg = pdf_text_message("PROMPT", "  ACME Corp\nWidget  \n");
        assert!(msg.starts_with("PROMPT"));
        assert!(msg.contains("\"\"\"\nACME Corp\nWidget\n\"\"\""));
    }
}
