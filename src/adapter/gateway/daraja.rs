//! M-Pesa Daraja gateway adapter.
//!
//! Collection is an STK push (`CustomerPayBillOnline`); disbursement is a
//! B2C `BusinessPayment`. Both return an acknowledgement immediately; the
//! settlement arrives on the callback URLs carried in each request.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::domain::{CheckoutRequestId, ConversationId, GatewayError};
use crate::port::{CollectAck, CollectRequest, DisburseAck, DisburseRequest, PaymentGateway};

/// Everything the gateway adapter needs, injected at construction so request
/// logic never reads the process environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub initiator_name: String,
    pub security_credential: String,
    pub base_url: String,
    /// Collection result webhook.
    pub callback_url: String,
    /// Disbursement result webhook.
    pub result_url: String,
    /// Disbursement timeout webhook.
    pub timeout_url: String,
}

struct CachedCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct DarajaGateway {
    http: reqwest::Client,
    config: GatewayConfig,
    credential: RwLock<Option<CachedCredential>>,
}

#[derive(Deserialize)]
struct OauthResponse {
    access_token: String,
    /// The provider sends this as a string, e.g. "3599".
    expires_in: String,
}

#[derive(Serialize)]
struct StkPushRequest<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: &'a str,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: &'a str,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    #[serde(rename = "AccountReference")]
    account_reference: &'a str,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: &'a str,
}

#[derive(Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Serialize)]
struct B2cRequest<'a> {
    #[serde(rename = "InitiatorName")]
    initiator_name: &'a str,
    #[serde(rename = "SecurityCredential")]
    security_credential: &'a str,
    #[serde(rename = "CommandID")]
    command_id: &'a str,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: &'a str,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "Remarks")]
    remarks: &'a str,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: &'a str,
    #[serde(rename = "ResultURL")]
    result_url: &'a str,
    #[serde(rename = "Occasion")]
    occasion: &'a str,
}

#[derive(Deserialize)]
struct B2cResponse {
    #[serde(rename = "ConversationID")]
    conversation_id: Option<String>,
    #[serde(rename = "OriginatorConversationID")]
    originator_conversation_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

impl DarajaGateway {
    pub fn new(http: reqwest::Client, config: GatewayConfig) -> Self {
        Self {
            http,
            config,
            credential: RwLock::new(None),
        }
    }

    /// Return the cached bearer token, fetching a fresh one when absent or
    /// within a minute of expiry.
    async fn access_token(&self) -> Result<String, GatewayError> {
        {
            let credential = self.credential.read().await;
            if let Some(cached) = credential.as_ref() {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut credential = self.credential.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = credential.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Credential(format!(
                "credential endpoint returned {}",
                response.status()
            )));
        }

        let oauth: OauthResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Credential(e.to_string()))?;

        let ttl = oauth.expires_in.parse::<i64>().unwrap_or(3600);
        let token = oauth.access_token.clone();
        *credential = Some(CachedCredential {
            token: oauth.access_token,
            expires_at: Utc::now() + Duration::seconds(ttl - 60),
        });

        Ok(token)
    }

    async fn invalidate_credential(&self) {
        let mut credential = self.credential.write().await;
        *credential = None;
    }

    /// POST with a bearer token; on a 401 the cached credential is dropped
    /// and the request retried once with a fresh one.
    async fn post_authorized<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("gateway rejected bearer token, refreshing credential");
        self.invalidate_credential().await;
        let token = self.access_token().await?;
        Ok(self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?)
    }

    fn stk_password(&self, timestamp: &str) -> String {
        BASE64.encode(format!(
            "{}{}{}",
            self.config.shortcode, self.config.passkey, timestamp
        ))
    }
}

#[async_trait]
impl PaymentGateway for DarajaGateway {
    async fn collect(&self, request: CollectRequest) -> Result<CollectAck, GatewayError> {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let body = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: self.stk_password(&timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: request.amount.round() as i64,
            party_a: &request.phone_number,
            party_b: &self.config.shortcode,
            phone_number: &request.phone_number,
            callback_url: &self.config.callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.description,
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self.post_authorized(&url, &body).await?;
        let ack: StkPushResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        debug!(
            code = ack.response_code.as_deref().unwrap_or("-"),
            "collection request acknowledged"
        );

        if ack.response_code.as_deref() == Some("0") {
            Ok(CollectAck {
                accepted: true,
                merchant_request_id: ack.merchant_request_id,
                checkout_request_id: ack.checkout_request_id.map(CheckoutRequestId::new),
                rejection_reason: None,
            })
        } else {
            Ok(CollectAck {
                accepted: false,
                merchant_request_id: ack.merchant_request_id,
                checkout_request_id: None,
                rejection_reason: ack
                    .response_description
                    .or(ack.error_message)
                    .or_else(|| Some("Payment request failed".to_string())),
            })
        }
    }

    async fn disburse(&self, request: DisburseRequest) -> Result<DisburseAck, GatewayError> {
        let body = B2cRequest {
            initiator_name: &self.config.initiator_name,
            security_credential: &self.config.security_credential,
            command_id: "BusinessPayment",
            amount: request.amount.round() as i64,
            party_a: &self.config.shortcode,
            party_b: &request.phone_number,
            remarks: &request.remarks,
            queue_timeout_url: &self.config.timeout_url,
            result_url: &self.config.result_url,
            occasion: &request.occasion,
        };

        let url = format!("{}/mpesa/b2c/v1/paymentrequest", self.config.base_url);
        let response = self.post_authorized(&url, &body).await?;
        let ack: B2cResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        debug!(
            code = ack.response_code.as_deref().unwrap_or("-"),
            "disbursement request acknowledged"
        );

        if ack.response_code.as_deref() == Some("0") {
            Ok(DisburseAck {
                accepted: true,
                conversation_id: ack.conversation_id.map(ConversationId::new),
                originator_conversation_id: ack
                    .originator_conversation_id
                    .map(ConversationId::new),
                rejection_reason: None,
            })
        } else {
            Ok(DisburseAck {
                accepted: false,
                conversation_id: None,
                originator_conversation_id: None,
                rejection_reason: ack
                    .response_description
                    .or(ack.error_message)
                    .or_else(|| Some("Refund request failed".to_string())),
            })
        }
    }
}
