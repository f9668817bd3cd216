/*!
# Vigie DevKit - Stubs et Utilitaires pour tests du moteur de polling

Permet de faire tourner de vrais cycles sans réseau ni disque :
- Transport SNMP scripté par (ip, oid) : valeurs, latences, pannes
- Registre de serveurs et sink de métriques en mémoire
- Builders de serveurs/composants
- Harness assemblant coordinateur + scheduler
*/

pub mod fixtures;
pub mod snmp_stub;
pub mod stores;
pub mod test_utils;

pub use fixtures::TargetBuilder;
pub use snmp_stub::{Reply, ScriptedTransport};
pub use stores::{InMemoryRegistry, MemorySink};
pub use test_utils::TestHarness;
