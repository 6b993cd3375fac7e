use serde::Deserialize;

use crate::errors::{AppError, Result};

/// Daraja STK push result envelope, delivered asynchronously to the
/// registered callback URL.
#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,

    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,

    #[serde(rename = "ResultCode")]
    pub result_code: i32,

    #[serde(rename = "ResultDesc")]
    pub result_desc: String,

    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

impl StkCallbackEnvelope {
    /// The provider posts arbitrary JSON; a payload without the nested
    /// `Body.stkCallback` structure is an integration fault and must be
    /// reported, not dropped.
    pub fn parse(payload: serde_json::Value) -> Result<Self> {
        serde_json::from_value(payload)
            .map_err(|e| AppError::MalformedCallback(e.to_string()))
    }
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }

    /// `MpesaReceiptNumber` metadata entry, when present.
    pub fn receipt_number(&self) -> Option<String> {
        self.metadata_value("MpesaReceiptNumber")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// `Amount` metadata entry. Daraja reports the amount actually
    /// charged, which is authoritative over the client-supplied one.
    pub fn amount(&self) -> Option<f64> {
        self.metadata_value("Amount").and_then(|v| v.as_f64())
    }

    /// `PhoneNumber` metadata entry. Arrives as a number, not a string.
    pub fn phone_number(&self) -> Option<String> {
        self.metadata_value("PhoneNumber").map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
