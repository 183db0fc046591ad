// Outbound delivery of account tokens (verification, password reset)
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::accounts::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    EmailVerification,
    PasswordReset,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::EmailVerification => "email-verification",
            NoticeKind::PasswordReset => "password-reset",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hands a raw token to the account owner. Delivery failures are the
    /// notifier's to report; callers do not retry.
    async fn deliver(&self, kind: NoticeKind, recipient: &User, token: &str);
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Default notifier: records that a notice went out, never the token itself.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, kind: NoticeKind, recipient: &User, _token: &str) {
        tracing::info!(
            user_id = %recipient.id,
            kind = kind.as_str(),
            "Account notice ready for delivery"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub email: String,
    pub token: String,
}

/// Keeps every notice in memory; lets tests read the tokens back.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_token(&self, kind: NoticeKind, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.iter()
            .rev()
            .find(|n| n.kind == kind && n.email == email)
            .map(|n| n.token.clone())
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, kind: NoticeKind, recipient: &User, token: &str) {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push(Notice {
            kind,
            email: recipient.email.clone(),
            token: token.to_string(),
        });
    }
}
