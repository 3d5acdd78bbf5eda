//! Messaging Campaign Models

use serde::{Deserialize, Serialize};

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "SCHEDULED" => Some(Self::Scheduled),
            "SENDING" => Some(Self::Sending),
            "PAUSED" => Some(Self::Paused),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Scheduled => "SCHEDULED",
            Self::Sending => "SENDING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// No transitions leave a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Lifecycle transition table
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, next) {
            (Draft, Scheduled) => true,
            (Draft | Scheduled, Sending) => true,
            (Sending, Paused) => true,
            (Paused, Sending) => true,
            (Sending, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignChannel {
    Whatsapp,
    Email,
    Sms,
}

impl CampaignChannel {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "WHATSAPP" => Some(Self::Whatsapp),
            "EMAIL" => Some(Self::Email),
            "SMS" => Some(Self::Sms),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Whatsapp => "WHATSAPP",
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
        }
    }
}

/// Campaign entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub tenant_id: String,
    pub segment_id: i64,
    pub name: String,
    pub channel: CampaignChannel,
    pub subject: Option<String>,
    pub message: String,
    pub status: CampaignStatus,
    pub scheduled_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// Audience count frozen when sending starts
    pub audience_size: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create campaign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCreate {
    pub segment_id: i64,
    pub name: String,
    pub channel: CampaignChannel,
    pub subject: Option<String>,
    pub message: String,
}

/// Update campaign payload (DRAFT only)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub segment_id: Option<i64>,
    pub name: Option<String>,
    pub channel: Option<CampaignChannel>,
    pub subject: Option<String>,
    pub message: Option<String>,
}
