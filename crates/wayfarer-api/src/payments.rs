// Payment provider boundary: checkout sessions out, webhook back in.
// Decision: The webhook is the only path that marks a booking paid; its
// signature is checked against the raw request body before parsing.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;
use wayfarer_core::Error;
use wayfarer_storage::{CreateBooking, TourRow};

use crate::error::ApiError;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "checkout-signature";

type HmacSha256 = Hmac<Sha256>;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/webhook-checkout", post(webhook_checkout))
        .with_state(state)
}

/// Checkout session handed back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub tour_id: Uuid,
    pub amount: f64,
    pub currency: String,
}

/// Client for the external checkout provider.
pub struct CheckoutClient {
    client: reqwest::Client,
    /// Provider endpoint; when unset, sessions are synthesized locally
    api_url: Option<String>,
    webhook_secret: String,
    success_url: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    reference: String,
    customer_email: &'a str,
    amount: f64,
    currency: &'a str,
    description: &'a str,
    success_url: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: String,
}

impl CheckoutClient {
    pub fn from_env() -> Self {
        let api_url = std::env::var("PAYMENT_API_URL")
            .ok()
            .filter(|s| !s.is_empty());
        if api_url.is_none() {
            tracing::warn!("PAYMENT_API_URL not set, checkout sessions will be synthesized");
        }

        let webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default();
        if webhook_secret.is_empty() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, webhook requests will be rejected");
        }

        let success_url = std::env::var("PAYMENT_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:9000/".to_string());

        Self {
            client: reqwest::Client::new(),
            api_url,
            webhook_secret,
            success_url,
        }
    }

    pub async fn create_checkout_session(
        &self,
        tour: &TourRow,
        user_id: Uuid,
        customer_email: &str,
    ) -> Result<CheckoutSession> {
        let reference = format!("{}:{}", tour.id, user_id);

        let Some(api_url) = &self.api_url else {
            // Local synthesis keeps development flows usable end to end
            return Ok(CheckoutSession {
                id: format!("dev_{}", hex::encode(rand::random::<[u8; 8]>())),
                url: self.success_url.clone(),
                tour_id: tour.id,
                amount: tour.price,
                currency: "usd".to_string(),
            });
        };

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", api_url))
            .json(&CreateSessionRequest {
                reference,
                customer_email,
                amount: tour.price,
                currency: "usd",
                description: &tour.summary,
                success_url: &self.success_url,
            })
            .send()
            .await
            .context("Failed to reach checkout provider")?;

        if !response.status().is_success() {
            anyhow::bail!("Checkout provider returned {}", response.status());
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .context("Invalid checkout provider response")?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
            tour_id: tour.id,
            amount: tour.price,
            currency: "usd".to_string(),
        })
    }

    /// Check the webhook signature: hex HMAC-SHA256 of the raw body.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        if self.webhook_secret.is_empty() {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /webhook-checkout - Provider callback after successful payment
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::validation("Missing webhook signature"))?;

    if !state.payments.verify_signature(&body, signature) {
        return Err(Error::validation("Invalid webhook signature").into());
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| Error::validation("Malformed webhook payload"))?;

    if event.event != "checkout.session.completed" {
        tracing::debug!(event = %event.event, "Ignoring webhook event");
        return Ok(Json(WebhookAck { received: true }));
    }

    state
        .db
        .create_booking(CreateBooking {
            tour_id: event.tour_id,
            user_id: event.user_id,
            price: event.amount,
            paid: true,
        })
        .await?;

    tracing::info!(tour_id = %event.tour_id, user_id = %event.user_id, "Booking recorded from webhook");
    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_secret(secret: &str) -> CheckoutClient {
        CheckoutClient {
            client: reqwest::Client::new(),
            api_url: None,
            webhook_secret: secret.to_string(),
            success_url: "http://localhost/".to_string(),
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_accepts_valid() {
        let client = client_with_secret("whsec_test");
        let body = br#"{"event":"checkout.session.completed"}"#;
        let signature = sign("whsec_test", body);
        assert!(client.verify_signature(body, &signature));
    }

    #[test]
    fn test_verify_signature_rejects_wrong_secret() {
        let client = client_with_secret("whsec_test");
        let body = b"payload";
        let signature = sign("other-secret", body);
        assert!(!client.verify_signature(body, &signature));
    }

    #[test]
    fn test_verify_signature_rejects_tampered_body() {
        let client = client_with_secret("whsec_test");
        let signature = sign("whsec_test", b"original");
        assert!(!client.verify_signature(b"tampered", &signature));
    }

    #[test]
    fn test_verify_signature_rejects_bad_hex() {
        let client = client_with_secret("whsec_test");
        assert!(!client.verify_signature(b"body", "not-hex!"));
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        let client = client_with_secret("");
        let signature = sign("", b"body");
        assert!(!client.verify_signature(b"body", &signature));
    }

    #[tokio::test]
    async fn test_synthesized_session_without_provider() {
        let client = client_with_secret("whsec_test");
        let tour = TourRow {
            id: Uuid::nil(),
            name: "Test Tour".to_string(),
            slug: "test-tour".to_string(),
            duration: 3,
            max_group_size: 10,
            difficulty: "easy".to_string(),
            ratings_average: 4.5,
            ratings_quantity: 0,
            price: 299.0,
            summary: "A test tour".to_string(),
            description: None,
            image_cover: None,
            images: vec![],
            start_dates: vec![],
            start_location_address: None,
            start_location_lat: None,
            start_location_lng: None,
            secret: false,
            created_at: chrono::Utc::now(),
        };

        let session = client
            .create_checkout_session(&tour, Uuid::nil(), "user@example.com")
            .await
            .unwrap();

        assert!(session.id.starts_with("dev_"));
        assert_eq!(session.amount, 299.0);
        assert_eq!(session.tour_id, tour.id);
    }
}
