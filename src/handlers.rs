pub mod accounts;
pub mod applications;
pub mod payments;
pub mod reports;
pub mod support;
pub mod tasks;
pub mod verifications;
