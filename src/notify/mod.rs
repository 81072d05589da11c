//! Outbound notifications
//!
//! Message formatting, the shared send-rate limiter, transports and the
//! retrying notifier that ties them together.

pub mod limiter;
pub mod message;
pub mod notifier;
pub mod telegram;

pub use limiter::RateLimiter;
pub use message::{escape_markdown_v2, ListingAlert, NotificationMessage, ParseMode};
pub use notifier::{DeliveryError, DeliveryReport, Notifier, RetryPolicy};
pub use telegram::{LogTransport, NotifyTransport, SendOutcome, TelegramTransport};
