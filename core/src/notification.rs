//! Outbound delivery boundary.
//!
//! Every call answers `Ok(true)` for a delivery, `Ok(false)` or
//! `Err(Declined)` for a reported failure (self-correction applies) and
//! `Err(Transport)` for an unexpected fault (logged for manual review).

use crate::{error::NotificationError, types::{CustomerId, Urgency}};

pub type DeliveryResult = Result<bool, NotificationError>;

pub trait NotificationChannel {
    fn name(&self) -> &'static str;
    fn send_email(&self, to: &str, subject: &str, body: &str) -> DeliveryResult;
    fn send_chat(&self, customer_id: CustomerId, message: &str) -> DeliveryResult;
    fn schedule_call(&self, phone: &str, timezone: &str, urgency: Urgency) -> DeliveryResult;
    fn send_offer(&self, email: &str, name: &str, details: &str, urgency: Urgency) -> DeliveryResult;
    fn schedule_demo(&self, email: &str, name: &str, focus: &str, usage_score: f64) -> DeliveryResult;
}

/// Logs every delivery instead of sending it. Rejects addresses that
/// cannot be delivered to so that self-correction gets exercised.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedChannel;

impl SimulatedChannel {
    fn check_email(email: &str) -> DeliveryResult {
        let lower = email.to_lowercase();
        if !lower.contains('@') {
            return Err(NotificationError::Declined { reason: format!("invalid email address '{email}'") });
        }
        if lower.contains("bounced") || lower.contains("invalid") {
            return Err(NotificationError::Declined { reason: format!("mailbox {email} bounced") });
        }
        Ok(true)
    }

    fn check_phone(phone: &str) -> DeliveryResult {
        if phone.trim().len() < 10 {
            return Err(NotificationError::Declined { reason: format!("unreachable phone number '{phone}'") });
        }
        Ok(true)
    }
}

impl NotificationChannel for SimulatedChannel {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> DeliveryResult {
        Self::check_email(to)?;
        log::info!("email to={to} subject=\"{subject}\" ({} chars)", body.len());
        Ok(true)
    }

    fn send_chat(&self, customer_id: CustomerId, message: &str) -> DeliveryResult {
        log::info!("chat customer={customer_id}: {message}");
        Ok(true)
    }

    fn schedule_call(&self, phone: &str, timezone: &str, urgency: Urgency) -> DeliveryResult {
        Self::check_phone(phone)?;
        log::info!("call scheduled phone={phone} tz={timezone} urgency={urgency}");
        Ok(true)
    }

    fn send_offer(&self, email: &str, name: &str, details: &str, urgency: Urgency) -> DeliveryResult {
        Self::check_email(email)?;
        log::info!("offer to={email} ({name}) urgency={urgency}: {details}");
        Ok(true)
    }

    fn schedule_demo(&self, email: &str, name: &str, focus: &str, usage_score: f64) -> DeliveryResult {
        Self::check_email(email)?;
        log::info!("demo scheduled for {name} <{email}> focus={focus} usage={usage_score:.2}");
        Ok(true)
    }
}
