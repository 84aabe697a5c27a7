//! Gift service: direct transfers and custodial escrow.
//!
//! The fiat value of a gift is frozen when it is sent and becomes the
//! recipient's cost basis. Every ledger leg uses a `gift:<id>:<leg>`
//! reference, so a retried step is applied at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::reconciler::{LedgerReconciler, Movement};
use crate::config::GiftConfig;
use crate::decimal::{self, Asset};
use crate::domain::{
    ClaimToken, EventBus, GiftEscrow, GiftId, GiftStatus, Holding, LedgerEvent, LedgerKind, TxRef,
    UserId,
};
use crate::error::GatewayError;
use crate::ports::{EscrowStore, PriceReference, RecipientDirectory};

/// How a sent gift reached its recipient.
#[derive(Debug, Clone)]
pub enum GiftDelivery {
    /// The recipient is a known user and was credited immediately.
    Direct {
        /// Credited user.
        recipient_id: UserId,
    },
    /// Held in escrow until the claim token is presented.
    Escrowed {
        /// Single-use claim token to deliver to the recipient.
        claim_token: ClaimToken,
        /// End of the claim window.
        expires_at: DateTime<Utc>,
    },
}

/// Result of [`GiftService::send_gift`].
#[derive(Debug, Clone)]
pub struct SentGift {
    /// Gift identifier.
    pub gift_id: GiftId,
    /// Quantity sent.
    pub amount_token: Decimal,
    /// Frozen fiat value.
    pub amount_fiat: Decimal,
    /// Delivery path.
    pub delivery: GiftDelivery,
    /// Sender's holding after the debit.
    pub sender_holding: Holding,
}

/// Result of [`GiftService::claim_gift`].
#[derive(Debug, Clone)]
pub struct ClaimedGift {
    /// The escrow, now claimed.
    pub gift: GiftEscrow,
    /// Claimer's holding after the credit.
    pub holding: Holding,
}

/// Sends, claims and expires gifts.
#[derive(Debug, Clone)]
pub struct GiftService {
    ledger: Arc<LedgerReconciler>,
    escrows: Arc<dyn EscrowStore>,
    directory: Arc<dyn RecipientDirectory>,
    prices: Arc<dyn PriceReference>,
    events: EventBus,
    config: GiftConfig,
}

impl GiftService {
    /// Creates a new `GiftService`.
    #[must_use]
    pub fn new(
        ledger: Arc<LedgerReconciler>,
        escrows: Arc<dyn EscrowStore>,
        directory: Arc<dyn RecipientDirectory>,
        prices: Arc<dyn PriceReference>,
        events: EventBus,
        config: GiftConfig,
    ) -> Self {
        Self {
            ledger,
            escrows,
            directory,
            prices,
            events,
            config,
        }
    }

    /// Sends `amount_token` of gold from `sender` to `recipient_email`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidAmount`] / [`GatewayError::InvalidRequest`]
    ///   for a bad amount, a malformed email, or a gift to oneself.
    /// - [`GatewayError::InsufficientBalance`] when the sender holds less;
    ///   nothing is created.
    /// - [`GatewayError::PriceUnavailable`] when the gift cannot be valued.
    /// - [`GatewayError::PersistenceError`] when the escrow cannot be
    ///   stored; the sender is refunded.
    pub async fn send_gift(
        &self,
        sender: UserId,
        amount_token: Decimal,
        recipient_email: &str,
        message: Option<String>,
    ) -> Result<SentGift, GatewayError> {
        let amount_token = decimal::validate_amount(Asset::Gold, amount_token)?;
        let email = recipient_email.trim().to_ascii_lowercase();
        if email.len() < 3 || !email.contains('@') {
            return Err(GatewayError::InvalidRequest(format!(
                "not an email address: {recipient_email}"
            )));
        }
        let recipient = self.directory.lookup_email(&email).await?;
        if recipient == Some(sender) {
            return Err(GatewayError::InvalidRequest(
                "cannot send a gift to yourself".to_string(),
            ));
        }
        let amount_fiat = self.freeze_value(sender, amount_token).await?;
        let gift_id = GiftId::new();

        let debit = self
            .ledger
            .reconcile(Movement {
                user_id: sender,
                kind: LedgerKind::GiftOut,
                amount_token,
                amount_fiat,
                tx_ref: TxRef::gift(gift_id, "out"),
                chain_tx: None,
            })
            .await?;
        tracing::info!(%gift_id, %sender, %amount_token, %amount_fiat, "gift debited");

        let ttl = chrono::Duration::from_std(self.config.claim_ttl)
            .map_err(|e| GatewayError::Internal(format!("gift ttl out of range: {e}")))?;
        let mut escrow = GiftEscrow::new(
            gift_id,
            sender,
            email,
            (amount_token, amount_fiat),
            message,
            ttl,
        );

        let delivery = match recipient {
            Some(recipient_id) => {
                let credit = self
                    .ledger
                    .reconcile(Movement {
                        user_id: recipient_id,
                        kind: LedgerKind::GiftIn,
                        amount_token,
                        amount_fiat,
                        tx_ref: TxRef::gift(gift_id, "in"),
                        chain_tx: None,
                    })
                    .await;
                if let Err(e) = credit {
                    tracing::error!(%gift_id, %recipient_id, error = %e, "direct gift credit failed, refunding");
                    self.refund(&escrow).await?;
                    return Err(e);
                }
                escrow.status = GiftStatus::Claimed;
                escrow.claimed_by = Some(recipient_id);
                escrow.resolved_at = Some(Utc::now());
                if let Err(e) = self.escrows.insert(escrow.clone()).await {
                    tracing::warn!(%gift_id, error = %e, "direct gift delivered but not archived");
                }
                GiftDelivery::Direct { recipient_id }
            }
            None => {
                if let Err(e) = self.escrows.insert(escrow.clone()).await {
                    tracing::error!(%gift_id, error = %e, "escrow not stored, refunding");
                    self.refund(&escrow).await?;
                    return Err(e.into());
                }
                GiftDelivery::Escrowed {
                    claim_token: escrow.claim_token.clone(),
                    expires_at: escrow.expires_at,
                }
            }
        };

        let _ = self.events.publish(LedgerEvent::GiftCreated {
            user_id: sender,
            gift_id,
            amount_token: amount_token.to_string(),
            expires_at: escrow.expires_at,
            timestamp: escrow.created_at,
        });
        if let GiftDelivery::Direct { recipient_id } = &delivery {
            let _ = self.events.publish(LedgerEvent::GiftClaimed {
                user_id: *recipient_id,
                sender_id: sender,
                gift_id,
                timestamp: Utc::now(),
            });
        }

        Ok(SentGift {
            gift_id,
            amount_token,
            amount_fiat,
            delivery,
            sender_holding: debit.holding,
        })
    }

    /// Credits the escrow behind `token` to `claimer`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::GiftNotFound`] for an unknown token.
    /// - [`GatewayError::AlreadyClaimed`] once the escrow has been claimed,
    ///   including a repeated claim by the same user.
    /// - [`GatewayError::GiftExpired`] after the claim window; the sender
    ///   is refunded.
    /// - [`GatewayError::InvalidRequest`] when the sender claims their own
    ///   gift.
    pub async fn claim_gift(
        &self,
        token: &ClaimToken,
        claimer: UserId,
    ) -> Result<ClaimedGift, GatewayError> {
        let Some(escrow) = self.escrows.find_by_token(token).await? else {
            return Err(GatewayError::GiftNotFound);
        };
        if escrow.sender_id == claimer {
            return Err(GatewayError::InvalidRequest(
                "cannot claim your own gift".to_string(),
            ));
        }
        if escrow.status != GiftStatus::Delivered {
            return Err(self.settled(&escrow, claimer).await);
        }

        let now = Utc::now();
        if escrow.is_expired_at(now) {
            let current = self.expire(&escrow, now).await?;
            if current.status == GiftStatus::Expired {
                return Err(GatewayError::GiftExpired);
            }
            return Err(self.settled(&current, claimer).await);
        }

        let won = self
            .escrows
            .compare_and_set_status(
                escrow.id,
                GiftStatus::Delivered,
                GiftStatus::Claimed,
                Some(claimer),
                now,
            )
            .await?;
        if !won {
            let current = self.escrows.get(escrow.id).await?.unwrap_or(escrow);
            return Err(self.settled(&current, claimer).await);
        }

        let holding = self.credit_claim(&escrow, claimer).await?;
        tracing::info!(gift_id = %escrow.id, %claimer, "gift claimed");
        let _ = self.events.publish(LedgerEvent::GiftClaimed {
            user_id: claimer,
            sender_id: escrow.sender_id,
            gift_id: escrow.id,
            timestamp: now,
        });

        let gift = GiftEscrow {
            status: GiftStatus::Claimed,
            claimed_by: Some(claimer),
            resolved_at: Some(now),
            ..escrow
        };
        Ok(ClaimedGift { gift, holding })
    }

    /// Gift by id, with expiry applied.
    ///
    /// # Errors
    ///
    /// [`GatewayError::GiftNotFound`] for an unknown id,
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn gift(&self, id: GiftId) -> Result<GiftEscrow, GatewayError> {
        let Some(escrow) = self.escrows.get(id).await? else {
            return Err(GatewayError::GiftNotFound);
        };
        self.observe(escrow).await
    }

    /// Gifts sent by `sender`, newest first, with expiry applied.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn gifts_sent(&self, sender: UserId) -> Result<Vec<GiftEscrow>, GatewayError> {
        let mut gifts = Vec::new();
        for escrow in self.escrows.list_by_sender(sender).await? {
            gifts.push(self.observe(escrow).await?);
        }
        Ok(gifts)
    }

    /// Spot valuation, or the sender's average price when no spot price is
    /// available.
    async fn freeze_value(&self, sender: UserId, amount_token: Decimal) -> Result<Decimal, GatewayError> {
        match self.prices.spot_price(Asset::Gold).await {
            Ok(price) => Ok(decimal::round_fiat(amount_token * price)),
            Err(e) => {
                let holding = self.ledger.holding(sender).await?;
                let Some(avg) = holding.avg_price() else {
                    return Err(e);
                };
                tracing::warn!(%sender, error = %e, "spot price unavailable, valuing gift at average cost");
                Ok(decimal::round_fiat(amount_token * avg))
            }
        }
    }

    /// Maps an escrow that is no longer claimable to the caller's error.
    /// A repeat claim by the recorded claimer re-applies its credit first.
    async fn settled(&self, escrow: &GiftEscrow, claimer: UserId) -> GatewayError {
        match escrow.status {
            GiftStatus::Claimed if escrow.claimed_by == Some(claimer) => {
                match self.credit_claim(escrow, claimer).await {
                    Ok(_) => GatewayError::AlreadyClaimed,
                    Err(e) => e,
                }
            }
            GiftStatus::Expired => match self.refund(escrow).await {
                Ok(()) => GatewayError::GiftExpired,
                Err(e) => e,
            },
            _ => GatewayError::AlreadyClaimed,
        }
    }

    async fn credit_claim(&self, escrow: &GiftEscrow, claimer: UserId) -> Result<Holding, GatewayError> {
        let credited = self
            .ledger
            .reconcile(Movement {
                user_id: claimer,
                kind: LedgerKind::GiftIn,
                amount_token: escrow.amount_token,
                amount_fiat: escrow.amount_fiat,
                tx_ref: TxRef::gift(escrow.id, "claim"),
                chain_tx: None,
            })
            .await?;
        Ok(credited.holding)
    }

    async fn observe(&self, escrow: GiftEscrow) -> Result<GiftEscrow, GatewayError> {
        let now = Utc::now();
        if escrow.status != GiftStatus::Delivered || !escrow.is_expired_at(now) {
            return Ok(escrow);
        }
        self.expire(&escrow, now).await
    }

    /// Moves a lapsed escrow to `Expired` and returns the gold to the sender.
    /// Returns the escrow as stored afterwards, which is `Claimed` when a
    /// concurrent claim won.
    async fn expire(&self, escrow: &GiftEscrow, now: DateTime<Utc>) -> Result<GiftEscrow, GatewayError> {
        let won = self
            .escrows
            .compare_and_set_status(escrow.id, GiftStatus::Delivered, GiftStatus::Expired, None, now)
            .await?;
        if won {
            tracing::info!(gift_id = %escrow.id, sender = %escrow.sender_id, "gift expired");
            let _ = self.events.publish(LedgerEvent::GiftExpired {
                user_id: escrow.sender_id,
                gift_id: escrow.id,
                timestamp: now,
            });
        }
        let current = self.escrows.get(escrow.id).await?.unwrap_or_else(|| GiftEscrow {
            status: GiftStatus::Expired,
            ..escrow.clone()
        });
        if current.status == GiftStatus::Expired {
            self.refund(escrow).await?;
        } else {
            tracing::info!(
                gift_id = %escrow.id,
                status = ?current.status,
                "expiry lost to a concurrent claim"
            );
        }
        Ok(current)
    }

    async fn refund(&self, escrow: &GiftEscrow) -> Result<(), GatewayError> {
        let refunded = self
            .ledger
            .reconcile(Movement {
                user_id: escrow.sender_id,
                kind: LedgerKind::GiftIn,
                amount_token: escrow.amount_token,
                amount_fiat: escrow.amount_fiat,
                tx_ref: TxRef::gift(escrow.id, "refund"),
                chain_tx: None,
            })
            .await?;
        if !refunded.already_processed {
            tracing::info!(gift_id = %escrow.id, sender = %escrow.sender_id, "gift refunded to sender");
        }
        Ok(())
    }
}
