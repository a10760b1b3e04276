pub mod account;
pub mod application;
pub mod report;
pub mod task;
pub mod verification;
