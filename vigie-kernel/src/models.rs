use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

pub type DbId = u64;

/// Valeur écrite à la place d'une lecture SNMP absente
pub const NO_DATA: &str = "N/A";

/// Mode d'authentification SNMP d'un serveur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    /// community string partagée
    #[serde(rename = "v2c")]
    V2c,
    /// utilisateur USM (auth + privacy optionnelle)
    #[serde(rename = "v3")]
    V3,
}

/// Catégories de composants surveillés (liste fermée)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentCategory {
    #[serde(rename = "fan")]
    Fan,
    #[serde(rename = "PSU")]
    Psu,
    #[serde(rename = "harddisk")]
    Harddisk,
    /// température
    #[serde(rename = "suhu")]
    Suhu,
}

impl ComponentCategory {
    pub const ALL: [ComponentCategory; 4] = [Self::Fan, Self::Psu, Self::Harddisk, Self::Suhu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fan => "fan",
            Self::Psu => "PSU",
            Self::Harddisk => "harddisk",
            Self::Suhu => "suhu",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serveur surveillé + ses identifiants SNMP.
/// Les champs d'identifiants sont optionnels : leur présence selon le mode
/// est vérifiée par le client SNMP au moment du GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: DbId,
    pub name: String,
    pub ip: String,
    pub brand: String,
    pub snmp_version: SnmpVersion,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub auth_user: Option<String>,
    #[serde(default)]
    pub auth_pass: Option<String>,
    #[serde(default)]
    pub priv_pass: Option<String>,
    #[serde(default)]
    pub auth_proto: Option<String>,
    #[serde(default)]
    pub priv_proto: Option<String>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: DbId,
    pub name: String,
    pub oid: String,
    pub category: ComponentCategory,
}

/// Une lecture horodatée d'un composant.
/// Les champs serveur/composant sont une copie figée au moment du poll,
/// l'historique survit aux renommages et suppressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricObservation {
    pub cycle_id: Uuid,
    pub server_id: DbId,
    pub component_id: DbId,
    pub oid: String,
    pub value: String,
    pub status: HealthStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub brand: String,
    pub component_name: String,
    pub server_name: String,
    pub server_ip: String,
    pub category: ComponentCategory,
}

impl MetricObservation {
    pub fn new(
        cycle_id: Uuid,
        timestamp: OffsetDateTime,
        target: &Target,
        component: &Component,
        value: String,
        status: HealthStatus,
    ) -> Self {
        Self {
            cycle_id,
            server_id: target.id,
            component_id: component.id,
            oid: component.oid.clone(),
            value,
            status,
            timestamp,
            brand: target.brand.clone(),
            component_name: component.name.clone(),
            server_name: target.name.clone(),
            server_ip: target.ip.clone(),
            category: component.category,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.value == NO_DATA
    }
}
