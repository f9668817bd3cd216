/**
 * CLIENT SNMP - Lecture d'une valeur pour un composant d'un serveur
 *
 * RÔLE :
 * `fetch(target, component)` = un GET SNMP, timeout borné (2s), zéro retry.
 * La cadence de ré-essai est celle du scheduler, pas celle du client.
 *
 * FONCTIONNEMENT :
 * - Credentials::resolve : v2c (community) ou v3 (USM), erreur de config avant réseau
 * - SnmpTransport : trait async, implémenté par Snmp2Transport (réel) et par les stubs du devkit
 * - Le timeout enveloppe tout l'échange (découverte v3 comprise)
 *
 * ERREURS :
 * - Configuration : identifiant ou OID invalide, rien n'est envoyé
 * - Timeout / Unreachable : pas de réponse
 * - Protocol : le serveur a répondu avec une erreur
 */

pub mod credentials;
pub mod transport;

pub use credentials::{AuthAlgorithm, Credentials, PrivAlgorithm, Privacy};
pub use transport::Snmp2Transport;

use crate::models::{Component, Target};
use crate::validation::parse_oid;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Timeout d'un GET, fixe
pub const SNMP_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_SNMP_PORT: u16 = 161;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("target unreachable: {0}")]
    Unreachable(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Configuration(_) => "configuration",
            FetchError::Timeout(_) => "timeout",
            FetchError::Unreachable(_) => "unreachable",
            FetchError::Protocol(_) => "protocol",
        }
    }

    /// true si le serveur a répondu (avec une erreur), false s'il est resté muet
    pub fn responded(&self) -> bool {
        matches!(self, FetchError::Protocol(_))
    }
}

/// Requête GET entièrement résolue, prête pour le transport
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub address: SocketAddr,
    pub oid: Vec<u64>,
    pub credentials: Credentials,
}

impl GetRequest {
    pub fn oid_string(&self) -> String {
        self.oid.iter().map(u64::to_string).collect::<Vec<_>>().join(".")
    }
}

#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Un seul échange requête/réponse, sans retry ni timeout propre
    async fn get(&self, request: &GetRequest) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct SnmpClient {
    transport: Arc<dyn SnmpTransport>,
    port: u16,
    timeout: Duration,
}

impl SnmpClient {
    pub fn new(transport: Arc<dyn SnmpTransport>) -> Self {
        Self { transport, port: DEFAULT_SNMP_PORT, timeout: SNMP_TIMEOUT }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Raccourcit le timeout (tests uniquement : en production il reste à 2s)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Construit la requête sans toucher au réseau
    pub fn prepare(&self, target: &Target, component: &Component) -> Result<GetRequest, FetchError> {
        let credentials = Credentials::resolve(target)?;
        let oid = parse_oid(&component.oid).map_err(|e| FetchError::Configuration(e.to_string()))?;
        let ip: IpAddr = target
            .ip
            .parse()
            .map_err(|_| FetchError::Configuration(format!("invalid IP address {}", target.ip)))?;
        Ok(GetRequest { address: SocketAddr::new(ip, self.port), oid, credentials })
    }

    pub async fn fetch(&self, target: &Target, component: &Component) -> Result<String, FetchError> {
        let request = self.prepare(target, component)?;
        debug!(
            server = %target.name,
            ip = %target.ip,
            oid = %component.oid,
            version = ?target.snmp_version,
            "SNMP GET"
        );

        let value = match tokio::time::timeout(self.timeout, self.transport.get(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };
        debug!(server = %target.name, component = %component.name, %value, "SNMP result");
        Ok(value)
    }
}
