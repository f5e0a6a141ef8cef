use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    Credits, LedgerError, LedgerResult, TransferKind, TransferPlan, TransferReceipt,
    TransferRequest, UserId,
};
use crate::ports::LedgerStore;

/// Moves credits between two accounts as one unit of work.
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Validates, checks the payer can cover the amount, then commits the
    /// balance changes and both ledger entries through the store.
    ///
    /// Nothing is written when this fails with `InvalidAmount`, `SelfTransfer`,
    /// `InvalidEntry`, `AccountNotFound`, `AccountClosed` or `InsufficientFunds`.
    #[instrument(
        skip_all,
        fields(
            from = %request.from_user_id,
            to = %request.to_user_id,
            amount = request.amount,
            category = %request.from_category,
        )
    )]
    pub async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferReceipt> {
        let plan = TransferPlan::new(request)?;

        let from_balance = self.store.get_balance(plan.from_user_id).await?;
        let to_balance = self.store.get_balance(plan.to_user_id).await?;

        if from_balance < plan.amount {
            tracing::info!(
                transfer_id = %plan.transfer_id,
                balance = from_balance,
                "transfer rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                user_id: plan.from_user_id,
                balance: from_balance,
                requested: plan.amount,
            });
        }

        tracing::debug!(
            transfer_id = %plan.transfer_id,
            from_balance,
            to_balance,
            "committing transfer"
        );

        match self.store.commit_transfer(&plan).await {
            Ok(receipt) => {
                tracing::info!(
                    transfer_id = %receipt.transfer_id,
                    payer_balance = receipt.payer_balance(),
                    payee_balance = receipt.payee_balance(),
                    "transfer committed"
                );
                Ok(receipt)
            }
            Err(err) if err.is_critical() => {
                tracing::error!(
                    target: "ledger::reconciliation",
                    transfer_id = %plan.transfer_id,
                    error = %err,
                    "transfer left the ledger inconsistent"
                );
                Err(err)
            }
            Err(err) if err.is_rejection() => {
                tracing::info!(transfer_id = %plan.transfer_id, error = %err, "transfer rejected");
                Err(err)
            }
            Err(err) => {
                tracing::warn!(transfer_id = %plan.transfer_id, error = %err, "transfer failed");
                Err(err)
            }
        }
    }

    pub async fn execute(
        &self,
        kind: TransferKind,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: Credits,
        description: impl Into<String>,
        related_id: Option<Uuid>,
    ) -> LedgerResult<TransferReceipt> {
        self.transfer(TransferRequest::for_kind(
            kind,
            from_user_id,
            to_user_id,
            amount,
            description,
            related_id,
        ))
        .await
    }

    pub async fn pay_subscription(
        &self,
        subscriber: UserId,
        creator: UserId,
        price: Credits,
        tier_id: Uuid,
    ) -> LedgerResult<TransferReceipt> {
        self.execute(
            TransferKind::Subscription,
            subscriber,
            creator,
            price,
            "Subscription payment",
            Some(tier_id),
        )
        .await
    }

    pub async fn tip(
        &self,
        from: UserId,
        creator: UserId,
        amount: Credits,
        message: Option<&str>,
    ) -> LedgerResult<TransferReceipt> {
        let description = match message {
            Some(message) if !message.trim().is_empty() => format!("Tip: {}", message),
            _ => "Tip".to_string(),
        };
        self.execute(TransferKind::Tip, from, creator, amount, description, None)
            .await
    }

    pub async fn chat_tip(
        &self,
        from: UserId,
        creator: UserId,
        amount: Credits,
        conversation_id: Uuid,
    ) -> LedgerResult<TransferReceipt> {
        self.execute(
            TransferKind::ChatTip,
            from,
            creator,
            amount,
            "Chat tip",
            Some(conversation_id),
        )
        .await
    }

    pub async fn unlock_post(
        &self,
        buyer: UserId,
        creator: UserId,
        price: Credits,
        post_id: Uuid,
    ) -> LedgerResult<TransferReceipt> {
        self.execute(
            TransferKind::PostUnlock,
            buyer,
            creator,
            price,
            "Post unlock",
            Some(post_id),
        )
        .await
    }

    pub async fn unlock_message(
        &self,
        buyer: UserId,
        creator: UserId,
        price: Credits,
        message_id: Uuid,
    ) -> LedgerResult<TransferReceipt> {
        self.execute(
            TransferKind::MessageUnlock,
            buyer,
            creator,
            price,
            "Message unlock",
            Some(message_id),
        )
        .await
    }
}
