pub mod application_service;
pub mod arbitration;
pub mod capacity_ledger;
pub mod expiry_service;
pub mod hackathon_service;
pub mod team_service;
pub mod user_service;

pub use arbitration::{ArbitrationEngine, ArbitrationSection};
