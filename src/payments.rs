//! Balance top-ups: manual bank/wallet transfers reviewed by admins, and crypto invoices
//! settled through gateway callbacks.
//!
//! Every credit is guarded by a conditional `pending -> completed` transition, so a payment
//! is credited at most once no matter how often it is approved or notified.

use serde::Deserialize;
use smm_types::account::{LedgerKind, payment_reference};
use smm_types::money::MoneyAmount;
use smm_types::payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
use smm_types::settings::Settings;
use smm_upstream::CryptoGateway;
use smm_upstream::crypto::{InvoiceRequest, IpnStatus};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::Store;

pub const MAX_REFERENCE_LEN: usize = 128;
pub const MAX_NOTE_LEN: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct ManualPayment {
    pub amount: MoneyAmount,
    /// Transfer id or memo the customer used, checked by admins.
    pub reference: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoDeposit {
    pub amount: MoneyAmount,
}

/// Gateway client plus the currency invoices are priced in.
pub struct CryptoCheckout {
    pub gateway: CryptoGateway,
    pub price_currency: String,
}

pub struct PaymentDesk {
    store: Arc<dyn Store>,
    crypto: Option<CryptoCheckout>,
}

fn clean_note(note: Option<String>) -> Result<Option<String>, ApiError> {
    match note.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(note) if note.chars().count() > MAX_NOTE_LEN => {
            Err(ApiError::validation("note is too long"))
        }
        Some(note) => Ok(Some(note.to_string())),
    }
}

fn check_minimum(amount: MoneyAmount, settings: &Settings) -> Result<(), ApiError> {
    if amount.as_decimal() < settings.min_deposit {
        return Err(ApiError::validation(format!(
            "minimum deposit is {} {}",
            settings.min_deposit, settings.currency
        )));
    }
    Ok(())
}

impl PaymentDesk {
    pub fn new(store: Arc<dyn Store>, crypto: Option<CryptoCheckout>) -> Self {
        Self { store, crypto }
    }

    pub fn crypto_enabled(&self) -> bool {
        self.crypto.is_some()
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn submit_manual(
        &self,
        user_id: Uuid,
        request: ManualPayment,
    ) -> Result<Payment, ApiError> {
        let settings = self.store.get_settings().await?;
        check_minimum(request.amount, &settings)?;
        let reference = request.reference.trim();
        if reference.is_empty() {
            return Err(ApiError::validation("reference is required"));
        }
        if reference.chars().count() > MAX_REFERENCE_LEN {
            return Err(ApiError::validation("reference is too long"));
        }
        if self
            .store
            .find_payment_by_reference(PaymentMethod::Manual, reference)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(
                "this reference was already submitted".to_string(),
            ));
        }
        let payment = self
            .store
            .insert_payment(NewPayment {
                user_id,
                method: PaymentMethod::Manual,
                amount: request.amount.as_decimal(),
                currency: settings.currency,
                reference: Some(reference.to_string()),
                note: clean_note(request.note)?,
            })
            .await?;
        tracing::info!(payment_id = payment.id, amount = %payment.amount, "Manual payment submitted");
        Ok(payment)
    }

    /// Admin approval of a manual payment; credits the customer's balance.
    #[instrument(skip_all, fields(payment_id = payment_id))]
    pub async fn approve(&self, payment_id: i64, note: Option<String>) -> Result<Payment, ApiError> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("payment"))?;
        if payment.method != PaymentMethod::Manual {
            return Err(ApiError::BadRequest(
                "crypto payments are settled by the gateway".to_string(),
            ));
        }
        let note = clean_note(note)?;
        self.complete(payment_id, note)
            .await?
            .ok_or_else(|| ApiError::Conflict("payment already processed".to_string()))
    }

    #[instrument(skip_all, fields(payment_id = payment_id))]
    pub async fn reject(&self, payment_id: i64, note: Option<String>) -> Result<Payment, ApiError> {
        let note = clean_note(note)?;
        let payment = self
            .store
            .transition_payment(
                payment_id,
                PaymentStatus::Pending,
                PaymentStatus::Rejected,
                note,
            )
            .await?
            .ok_or_else(|| ApiError::Conflict("payment already processed".to_string()))?;
        tracing::info!("Payment rejected");
        Ok(payment)
    }

    /// Opens a hosted crypto invoice for a deposit.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn create_crypto_invoice(
        &self,
        user_id: Uuid,
        request: CryptoDeposit,
    ) -> Result<Payment, ApiError> {
        let Some(crypto) = self.crypto.as_ref() else {
            return Err(ApiError::Unavailable(
                "crypto payments are not enabled".to_string(),
            ));
        };
        let settings = self.store.get_settings().await?;
        check_minimum(request.amount, &settings)?;

        let payment = self
            .store
            .insert_payment(NewPayment {
                user_id,
                method: PaymentMethod::Crypto,
                amount: request.amount.as_decimal(),
                currency: settings.currency.clone(),
                reference: None,
                note: None,
            })
            .await?;

        let invoice = crypto
            .gateway
            .create_invoice(&InvoiceRequest {
                price_amount: payment.amount,
                price_currency: crypto.price_currency.clone(),
                order_id: payment.id.to_string(),
                order_description: format!("{} balance top-up", settings.site_name),
            })
            .await;
        match invoice {
            Ok(invoice) => {
                let payment = self
                    .store
                    .attach_invoice(payment.id, &invoice.id, &invoice.invoice_url)
                    .await?;
                tracing::info!(payment_id = payment.id, invoice_id = %invoice.id, "Crypto invoice created");
                Ok(payment)
            }
            Err(err) => {
                self.store
                    .transition_payment(
                        payment.id,
                        PaymentStatus::Pending,
                        PaymentStatus::Failed,
                        Some("invoice creation failed".to_string()),
                    )
                    .await?;
                Err(err.into())
            }
        }
    }

    /// Applies a signed gateway notification.
    #[instrument(skip_all)]
    pub async fn handle_ipn(&self, body: &[u8], signature: Option<&str>) -> Result<(), ApiError> {
        let Some(crypto) = self.crypto.as_ref() else {
            return Err(ApiError::Unavailable(
                "crypto payments are not enabled".to_string(),
            ));
        };
        let event = crypto.gateway.verify_ipn(body, signature)?;
        let payment_id: i64 = event
            .order_id
            .parse()
            .map_err(|_| ApiError::not_found("payment"))?;
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .filter(|p| p.method == PaymentMethod::Crypto)
            .ok_or_else(|| ApiError::not_found("payment"))?;

        tracing::info!(
            payment_id,
            gateway_payment_id = %event.payment_id,
            status = ?event.payment_status,
            "Crypto payment notification"
        );
        match event.payment_status {
            IpnStatus::Finished => {
                if self.complete(payment.id, None).await?.is_none() {
                    tracing::info!(payment_id, "Notification replay ignored");
                }
            }
            IpnStatus::Failed => {
                self.store
                    .transition_payment(payment.id, PaymentStatus::Pending, PaymentStatus::Failed, None)
                    .await?;
            }
            IpnStatus::Expired => {
                self.store
                    .transition_payment(payment.id, PaymentStatus::Pending, PaymentStatus::Expired, None)
                    .await?;
            }
            other => {
                tracing::debug!(payment_id, status = ?other, "Notification needs no action");
            }
        }
        Ok(())
    }

    /// `pending -> completed` followed by the balance credit. `None` if not pending.
    async fn complete(
        &self,
        payment_id: i64,
        note: Option<String>,
    ) -> Result<Option<Payment>, ApiError> {
        let Some(payment) = self
            .store
            .transition_payment(
                payment_id,
                PaymentStatus::Pending,
                PaymentStatus::Completed,
                note,
            )
            .await?
        else {
            return Ok(None);
        };
        self.store
            .apply_balance_change(
                payment.user_id,
                payment.amount,
                LedgerKind::Deposit,
                Some(payment_reference(payment.id)),
            )
            .await
            .inspect_err(|e| {
                tracing::error!(payment_id, error = %e, "Payment completed but credit failed");
            })?;
        tracing::info!(payment_id, amount = %payment.amount, user_id = %payment.user_id, "Balance credited");
        Ok(Some(payment))
    }
}
