use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    /// Coins bought with real money
    Purchase,
    /// Coins spent on a gift to another user
    GiftSent,
    /// Coins earned from a gift sent by another user
    GiftReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: UserId,
    /// Positive for credits, negative for debits
    pub delta: i64,
    pub reason: TransactionReason,
    pub balance_after: i64,
    /// The other side of a gift; None for purchases
    pub counterparty: Option<UserId>,
    /// Catalog gift behind a gift row, if the gift was not a raw amount
    pub gift_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub coins: i64,
    /// Price in integer US cents
    pub price_cents: u64,
    pub bonus_percent: u32,
}

impl CoinPackage {
    /// Coins credited on purchase, bonus rounded down.
    pub fn total_coins(&self) -> i64 {
        self.coins + self.coins * self.bonus_percent as i64 / 100
    }

    pub fn price_usd(&self) -> String {
        format!("{}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gift {
    pub id: &'static str,
    pub name: &'static str,
    /// Cost in coins
    pub price: i64,
}

/// Outcome of a package purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub coins_credited: i64,
    pub new_balance: i64,
    pub transaction_id: u64,
}

/// Outcome of a gift between two users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftReceipt {
    pub coins_spent: i64,
    pub coins_received: i64,
    pub sender_balance: i64,
    pub recipient_balance: i64,
}
