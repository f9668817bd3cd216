//! Vigie kernel : polling SNMP périodique de la santé matérielle d'un parc
//! de serveurs (ventilateurs, alimentations, disques, températures).

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod health;
pub mod http;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod snmp;
pub mod validation;
