use crate::currency::{format_percent, percent_of_cents, subtotal_cents};
use crate::error::RenderError;
use serde::{Deserialize, Serialize};

/// Invoice record handed to the renderer. Strings are display-ready: the
/// engine performs no date formatting, lookups or currency conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub date: String,
    pub due_date: String,
    pub client: Client,
    pub line_items: Vec<LineItem>,
    /// Display-only; never recomputed from the line items.
    pub total_cents: i64,
    pub currency: String,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
    #[serde(default)]
    pub crypto_details: Option<CryptoDetails>,
    #[serde(default)]
    pub processing_fee_cents: Option<i64>,
    #[serde(default)]
    pub processing_fee_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    #[serde(default)]
    pub sub_description: Option<String>,
    pub quantity: i64,
    pub unit_amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub legal_name: String,
    #[serde(default)]
    pub address: Vec<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_name: String,
    pub iban: String,
    #[serde(alias = "bic")]
    pub swift_code: String,
    #[serde(default)]
    pub bank_address: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoDetails {
    pub network: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingType {
    Retainer,
    Sprint,
}

impl BillingType {
    pub fn default_description(self) -> &'static str {
        match self {
            BillingType::Retainer => "Design & Development Retainer",
            BillingType::Sprint => "Sprint Development",
        }
    }
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_amount_cents: i64) -> Self {
        Self {
            description: description.into(),
            sub_description: None,
            quantity,
            unit_amount_cents,
        }
    }

    /// Single-unit line for a billing category, e.g. a retainer period.
    pub fn for_billing(billing: BillingType, amount_cents: i64) -> Self {
        Self::new(billing.default_description(), 1, amount_cents)
    }

    pub fn with_sub_description(mut self, text: impl Into<String>) -> Self {
        self.sub_description = Some(text.into());
        self
    }

    pub fn amount_cents(&self) -> i64 {
        crate::currency::line_total_cents(self.quantity, self.unit_amount_cents)
    }
}

/// The synthetic surcharge row appended after the line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeLine {
    pub label: String,
    pub amount_cents: i64,
}

impl InvoiceDocument {
    pub fn from_json(raw: &str) -> Result<Self, RenderError> {
        let document: InvoiceDocument = serde_json::from_str(raw)?;
        Ok(document)
    }

    /// Checks everything the layout depends on. Runs before any sink is
    /// opened so a bad record never produces partial output.
    pub fn validate(&self) -> Result<&Company, RenderError> {
        let company = self
            .company
            .as_ref()
            .ok_or_else(|| RenderError::invalid("company details are required"))?;
        if company.legal_name.trim().is_empty() {
            return Err(RenderError::invalid("company legal name is required"));
        }
        if company.email.trim().is_empty() {
            return Err(RenderError::invalid("company email is required"));
        }
        if company.address.iter().all(|line| line.trim().is_empty()) {
            return Err(RenderError::invalid("company address is required"));
        }
        if self.line_items.is_empty() {
            return Err(RenderError::invalid("at least one line item is required"));
        }
        if self.invoice_number.trim().is_empty() {
            return Err(RenderError::invalid("invoice number is required"));
        }
        if self.currency.trim().is_empty() {
            return Err(RenderError::invalid("currency code is required"));
        }
        for (idx, item) in self.line_items.iter().enumerate() {
            if item.quantity < 0 || item.unit_amount_cents < 0 {
                return Err(RenderError::invalid(format!(
                    "line item {} has a negative quantity or amount",
                    idx + 1
                )));
            }
        }
        if self.total_cents < 0 {
            return Err(RenderError::invalid("total must not be negative"));
        }
        if self.processing_fee_cents.is_some_and(|cents| cents < 0) {
            return Err(RenderError::invalid("processing fee must not be negative"));
        }
        if self
            .processing_fee_percent
            .is_some_and(|percent| !percent.is_finite() || percent < 0.0)
        {
            return Err(RenderError::invalid(
                "processing fee percent must be a non-negative number",
            ));
        }
        Ok(company)
    }

    pub fn subtotal_cents(&self) -> i64 {
        subtotal_cents(
            self.line_items
                .iter()
                .map(|item| (item.quantity, item.unit_amount_cents)),
        )
    }

    /// Explicit fee cents win over a percentage of the subtotal.
    pub fn processing_fee(&self) -> Option<FeeLine> {
        let label = match self.processing_fee_percent {
            Some(percent) => format!("Processing fee ({}%)", format_percent(percent)),
            None => "Processing fee".to_string(),
        };
        let amount_cents = match (self.processing_fee_cents, self.processing_fee_percent) {
            (Some(cents), _) => cents,
            (None, Some(percent)) => percent_of_cents(self.subtotal_cents(), percent),
            (None, None) => return None,
        };
        Some(FeeLine {
            label,
            amount_cents,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn parses_camel_case_payload() {
        let raw = r#"{
            "invoiceNumber": "ABC-0002",
            "date": "Feb 1, 2026",
            "dueDate": "Feb 15, 2026",
            "client": { "name": "Acme", "email": "ap@acme.example" },
            "lineItems": [
                { "description": "Sprint Development", "subDescription": "Two weeks", "quantity": 1, "unitAmountCents": 250000 }
            ],
            "totalCents": 250000,
            "currency": "usd",
            "company": { "legalName": "Outpace", "address": ["1 Road"], "email": "a@b.c" },
            "bankDetails": { "bankName": "Bank", "iban": "DE00", "bic": "DEUT", "bankAddress": [] },
            "processingFeePercent": 4.4
        }"#;
        let doc = InvoiceDocument::from_json(raw).expect("valid payload");
        assert_eq!(doc.line_items[0].sub_description.as_deref(), Some("Two weeks"));
        assert_eq!(doc.bank_details.as_ref().map(|b| b.swift_code.as_str()), Some("DEUT"));
        assert!(doc.client.address.is_empty());
        assert!(doc.crypto_details.is_none());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = InvoiceDocument::from_json("{").expect_err("truncated");
        assert!(matches!(err, RenderError::Json(_)));
    }

    #[test]
    fn missing_company_fails_validation() {
        let mut doc = invoice(vec![LineItem::new("Work", 1, 100)], 100);
        doc.company = None;
        let err = doc.validate().expect_err("company required");
        assert!(matches!(err, RenderError::InvalidInput(_)));
        assert!(err.to_string().contains("company"));
    }

    #[test]
    fn empty_line_items_fail_validation() {
        let doc = invoice(Vec::new(), 0);
        let err = doc.validate().expect_err("items required");
        assert!(err.to_string().contains("line item"));
    }

    #[test]
    fn blank_invoice_number_and_currency_fail_validation() {
        let mut doc = invoice(vec![LineItem::new("Work", 1, 100)], 100);
        doc.invoice_number = "  ".to_string();
        let err = doc.validate().expect_err("number required");
        assert!(err.to_string().contains("invoice number"));

        let mut doc = invoice(vec![LineItem::new("Work", 1, 100)], 100);
        doc.currency = String::new();
        let err = doc.validate().expect_err("currency required");
        assert!(err.to_string().contains("currency code"));
    }

    #[test]
    fn negative_amounts_fail_validation() {
        let doc = invoice(vec![LineItem::new("Refund", 1, -100)], 0);
        assert!(matches!(doc.validate(), Err(RenderError::InvalidInput(_))));
    }

    #[test]
    fn processing_fee_prefers_explicit_cents() {
        let mut doc = invoice(vec![LineItem::new("Work", 1, 250000)], 261000);
        doc.processing_fee_percent = Some(4.4);
        doc.processing_fee_cents = Some(11000);
        let fee = doc.processing_fee().expect("fee present");
        assert_eq!(fee.label, "Processing fee (4.4%)");
        assert_eq!(fee.amount_cents, 11000);

        doc.processing_fee_cents = None;
        doc.line_items = vec![LineItem::new("Work", 2, 12345)];
        // 24690 * 4.4% = 1086.36
        assert_eq!(doc.processing_fee().map(|f| f.amount_cents), Some(1086));

        doc.processing_fee_percent = None;
        assert!(doc.processing_fee().is_none());
    }

    #[test]
    fn billing_types_supply_default_descriptions() {
        let item = LineItem::for_billing(BillingType::Retainer, 500000);
        assert_eq!(item.description, "Design & Development Retainer");
        assert_eq!(item.amount_cents(), 500000);
        assert_eq!(
            BillingType::Sprint.default_description(),
            "Sprint Development"
        );
    }
}
