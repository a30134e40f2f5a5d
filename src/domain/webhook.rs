//! Inbound webhook envelopes, provider field names preserved.
//!
//! The provider reports details as flat lists of key/value items whose
//! presence is not guaranteed; everything the business logic reads goes
//! through one defensive decode step with an explicit default per field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope returned to the provider for every webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }

    pub fn rejected(desc: impl Into<String>) -> Self {
        Self {
            result_code: 1,
            result_desc: desc.into(),
        }
    }
}

/// Collection (STK push) result webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionCallback {
    #[serde(rename = "Body")]
    pub body: CollectionCallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

/// Payment details extracted from a successful collection callback, every
/// field defaulted when the corresponding item is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub amount: f64,
    pub mpesa_receipt_number: String,
    pub transaction_date: String,
    pub phone_number: String,
}

impl StkCallback {
    pub fn payment_details(&self) -> PaymentDetails {
        let map = self
            .callback_metadata
            .as_ref()
            .map(|metadata| key_value_map(metadata.item.iter().map(|i| (&i.name, &i.value))))
            .unwrap_or_default();

        PaymentDetails {
            amount: number_or_default(&map, "Amount"),
            mpesa_receipt_number: string_or_default(&map, "MpesaReceiptNumber"),
            transaction_date: string_or_default(&map, "TransactionDate"),
            phone_number: string_or_default(&map, "PhoneNumber"),
        }
    }
}

/// Disbursement (B2C) result and timeout webhooks share one envelope; the
/// timeout variant simply never carries result parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisbursementCallback {
    #[serde(rename = "Result")]
    pub result: DisbursementResult,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisbursementResult {
    #[serde(rename = "ResultType")]
    pub result_type: i64,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    #[serde(rename = "ConversationID")]
    pub conversation_id: String,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    #[serde(rename = "ResultParameters")]
    pub result_parameters: Option<ResultParameters>,
    #[serde(rename = "ReferenceData")]
    pub reference_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultParameters {
    #[serde(rename = "ResultParameter")]
    pub result_parameter: Vec<ResultParameter>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultParameter {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

/// Refund details recorded on the ticket when a disbursement completes.
/// Falls back to what the ticket already knows where the provider omits a
/// parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundMetadata {
    pub transaction_id: String,
    pub transaction_amount: f64,
    pub transaction_receipt: String,
    pub recipient_phone_number: String,
    pub b2c_utility_account_available_funds: Option<f64>,
    pub b2c_working_account_available_funds: Option<f64>,
    pub transaction_completed_date_time: String,
}

impl DisbursementResult {
    pub fn refund_metadata(
        &self,
        fallback_amount: f64,
        fallback_phone_number: &str,
        fallback_completed_at: &str,
    ) -> RefundMetadata {
        let map = self
            .result_parameters
            .as_ref()
            .map(|params| {
                key_value_map(params.result_parameter.iter().map(|p| (&p.key, &p.value)))
            })
            .unwrap_or_default();

        RefundMetadata {
            transaction_id: self.transaction_id.clone(),
            transaction_amount: map
                .get("TransactionAmount")
                .and_then(|v| v.as_f64())
                .unwrap_or(fallback_amount),
            transaction_receipt: map
                .get("TransactionReceipt")
                .and_then(value_as_string)
                .unwrap_or_else(|| self.transaction_id.clone()),
            recipient_phone_number: map
                .get("ReceiverPartyPublicName")
                .and_then(value_as_string)
                .unwrap_or_else(|| fallback_phone_number.to_string()),
            b2c_utility_account_available_funds: map
                .get("B2CUtilityAccountAvailableFunds")
                .and_then(|v| v.as_f64()),
            b2c_working_account_available_funds: map
                .get("B2CWorkingAccountAvailableFunds")
                .and_then(|v| v.as_f64()),
            transaction_completed_date_time: map
                .get("TransactionCompletedDateTime")
                .and_then(value_as_string)
                .unwrap_or_else(|| fallback_completed_at.to_string()),
        }
    }
}

fn key_value_map<'a>(
    items: impl Iterator<Item = (&'a String, &'a Option<Value>)>,
) -> HashMap<&'a str, &'a Value> {
    items
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.as_str(), v)))
        .collect()
}

fn string_or_default(map: &HashMap<&str, &Value>, key: &str) -> String {
    map.get(key).and_then(value_as_string).unwrap_or_default()
}

fn number_or_default(map: &HashMap<&str, &Value>, key: &str) -> f64 {
    map.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

// The provider is inconsistent about numeric fields arriving as numbers or
// strings; accept both.
fn value_as_string(value: &&Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
