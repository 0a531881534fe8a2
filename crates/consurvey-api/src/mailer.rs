//! Outbound coupon email.
//!
//! There is no real transport; [`LogMailer`] records each delivery through
//! `tracing` so operators can see what would have been sent.

use thiserror::Error;

/// A coupon code addressed to a respondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponEmail {
    pub to: String,
    pub coupon_code: String,
}

/// Failure to hand a message to the transport.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Sends coupon emails.
pub trait Mailer: Send + Sync + std::fmt::Debug {
    fn send_coupon(&self, email: &CouponEmail) -> Result<(), MailError>;
}

/// Logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_coupon(&self, email: &CouponEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, coupon_code = %email.coupon_code, "coupon email queued");
        Ok(())
    }
}
