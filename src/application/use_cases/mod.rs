pub mod billing;
pub mod event;
pub mod payment;
pub mod payment_webhook;
pub mod registration;
pub mod subscription;
pub mod user;
