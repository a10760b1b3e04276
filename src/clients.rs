pub mod chat;
pub mod identity;
pub mod payment;
