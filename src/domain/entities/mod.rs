pub mod event;
pub mod payment_method;
pub mod payment_status;
pub mod subscription_status;
pub mod user;
