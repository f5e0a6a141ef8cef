use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::LedgerError;

/// Why a balance changed. Stored as its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Purchase,
    SubscriptionPayment,
    SubscriptionEarning,
    TipSent,
    TipReceived,
    PpvPayment,
    PpvEarning,
    ChatTipSent,
    ChatTipReceived,
    MessagePpvPayment,
    MessagePpvEarning,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Purchase,
        Category::SubscriptionPayment,
        Category::SubscriptionEarning,
        Category::TipSent,
        Category::TipReceived,
        Category::PpvPayment,
        Category::PpvEarning,
        Category::ChatTipSent,
        Category::ChatTipReceived,
        Category::MessagePpvPayment,
        Category::MessagePpvEarning,
    ];

    pub const EARNINGS: [Category; 5] = [
        Category::SubscriptionEarning,
        Category::TipReceived,
        Category::PpvEarning,
        Category::ChatTipReceived,
        Category::MessagePpvEarning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Purchase => "purchase",
            Category::SubscriptionPayment => "subscription_payment",
            Category::SubscriptionEarning => "subscription_earning",
            Category::TipSent => "tip_sent",
            Category::TipReceived => "tip_received",
            Category::PpvPayment => "ppv_payment",
            Category::PpvEarning => "ppv_earning",
            Category::ChatTipSent => "chat_tip_sent",
            Category::ChatTipReceived => "chat_tip_received",
            Category::MessagePpvPayment => "message_ppv_payment",
            Category::MessagePpvEarning => "message_ppv_earning",
        }
    }

    /// Credits paid to a creator by another user.
    pub fn is_earning(&self) -> bool {
        Category::EARNINGS.contains(self)
    }

    /// Entries of this category take credits out of the account.
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            Category::SubscriptionPayment
                | Category::TipSent
                | Category::PpvPayment
                | Category::ChatTipSent
                | Category::MessagePpvPayment
        )
    }

    pub fn is_credit(&self) -> bool {
        !self.is_debit()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidEntry(format!("unknown category '{}'", s)))
    }
}
