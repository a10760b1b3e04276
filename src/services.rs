pub mod account_service;
pub use account_service::AccountService;
pub mod verification_service;
pub use verification_service::VerificationService;
pub mod application_service;
pub use application_service::ApplicationService;
pub mod dispatch_service;
pub use dispatch_service::DispatchService;
pub mod report_service;
pub use report_service::ReportService;
pub mod sync;
