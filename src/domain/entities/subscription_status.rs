use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Terminal states are never left by payment-driven transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Canceled
        )
    }

    /// Pending or active. A user holds at most one open subscription.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Status after a PAID payment is applied. Terminal states stay put.
    pub fn activated(self) -> Self {
        match self {
            SubscriptionStatus::Pending | SubscriptionStatus::Active => SubscriptionStatus::Active,
            terminal => terminal,
        }
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Pending
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}
