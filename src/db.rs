pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod vendor_repo;
pub use vendor_repo::VendorRepository;
pub mod ledger_repo;
pub use ledger_repo::LedgerRepository;
pub mod membership_repo;
pub use membership_repo::MembershipRepository;
