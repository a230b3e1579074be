pub mod external;
pub mod invoice_service;
pub mod ledger_sync;
pub mod lifecycle;
pub mod parser;
pub mod posting;
pub mod reconciliation;
pub mod template_resolver;
