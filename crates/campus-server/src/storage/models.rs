//! Data models for Campus storage.

use serde::{Deserialize, Serialize};

use campus_core::Role;
use campus_core::lifecycle::{
    BootcampStatus, InvoiceStatus, PaymentMethod, PostStatus, RegistrationStatus, TicketStatus,
    TransactionKind,
};
use campus_core::otp::OtpState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl std::str::FromStr for Gender {
    type Err = campus_core::Error;

    fn from_str(s: &str) -> campus_core::Result<Self> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(campus_core::Error::Validation(format!(
                "gender must be 'male' or 'female', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub gender: Gender,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    pub otp_expiry: Option<i64>,
    pub otp_retry_count: i64,
    pub otp_last_sent: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub const fn otp_state(&self) -> OtpState {
        OtpState {
            retry_count: self.otp_retry_count,
            last_sent: self.otp_last_sent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: String,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: i64,
    pub revoked: i64,
    pub created_at: i64,
}

/// One OTP send attempt. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SmsLog {
    pub id: i64,
    pub user_id: i64,
    pub phone: String,
    pub code: String,
    pub status: String,
    pub response: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BootcampCategory {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bootcamp {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub schedule_days: String,
    pub schedule_time: String,
    pub capacity: i64,
    pub status: BootcampStatus,
    pub is_advanced: bool,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BootcampRegistration {
    pub id: i64,
    pub user_id: i64,
    pub bootcamp_id: i64,
    pub status: RegistrationStatus,
    pub payment_receipt: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: i64,
    pub user_id: i64,
    pub created_by: Option<i64>,
    pub title: String,
    pub description: String,
    pub amount: i64,
    pub status: InvoiceStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_gateway: String,
    pub payment_tracking_code: String,
    pub offline_receipt_image: Option<String>,
    pub offline_receipt_code: String,
    pub offline_payment_date: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Ledger entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub invoice_id: Option<i64>,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: i64,
    pub user_id: i64,
    pub bootcamp_id: Option<i64>,
    pub subject: String,
    pub status: TicketStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: i64,
    pub ticket_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub attachment: Option<String>,
    pub is_from_support: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogCategory {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogTag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    pub published_at: Option<i64>,
    pub view_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A post row plus engagement counts, as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub status: PostStatus,
    pub published_at: Option<i64>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogComment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_approved: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
