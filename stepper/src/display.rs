use std::time::{Duration, Instant};

/// The error message currently on screen. A newer banner replaces an older
/// one, which cancels the older one's expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBanner {
    message: String,
    raised_at: Instant,
    lifetime: Duration,
}

impl ErrorBanner {
    pub fn new(message: impl Into<String>, lifetime: Duration) -> Self {
        Self::at(message, Instant::now(), lifetime)
    }

    pub fn at(message: impl Into<String>, raised_at: Instant, lifetime: Duration) -> Self {
        ErrorBanner {
            message: message.into(),
            raised_at,
            lifetime,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raised_at(&self) -> Instant {
        self.raised_at
    }

    pub fn expires_at(&self) -> Instant {
        self.raised_at + self.lifetime
    }

    pub fn is_visible_at(&self, now: Instant) -> bool {
        now >= self.raised_at && now < self.expires_at()
    }
}
