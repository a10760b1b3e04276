pub mod account_repo;
pub use account_repo::AccountRepository;
pub mod verification_repo;
pub use verification_repo::VerificationRepository;
pub mod application_repo;
pub use application_repo::ApplicationRepository;
pub mod pricing_repo;
pub use pricing_repo::PricingRepository;
pub mod task_repo;
pub use task_repo::TaskRepository;
pub mod report_repo;
pub use report_repo::ReportRepository;
