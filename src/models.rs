pub mod auth;
pub mod invoice;
pub mod ledger;
pub mod vendor;
