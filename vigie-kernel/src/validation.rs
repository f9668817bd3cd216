//! Règles de validation des serveurs et composants.
//!
//! Le registre les applique au chargement : une entrée invalide est écartée
//! (avec un warning) au lieu de bloquer la surveillance des autres serveurs.

use crate::models::{Component, Target};
use std::collections::HashSet;
use tracing::warn;

pub const KNOWN_BRANDS: [&str; 4] = ["HPE", "Dell", "supermicro", "custom"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

pub fn validate_required(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("{field} is required")));
    }
    Ok(())
}

/// IPv4 pointée, 4 octets 0-255 en décimal strict.
/// Un zéro initial ("010") est refusé : lu en octal par certaines piles réseau,
/// il ne désigne pas une adresse non ambiguë.
pub fn validate_ip_address(ip: &str) -> Result<(), ValidationError> {
    if ip.is_empty() {
        return Err(ValidationError::new("ip", "IP address is required"));
    }
    let octets: Vec<&str> = ip.split('.').collect();
    let well_formed = octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(ValidationError::new("ip", "Invalid IP address format"));
    }
    if octets.iter().any(|o| o.parse::<u16>().map_or(true, |n| n > 255)) {
        return Err(ValidationError::new("ip", "Invalid IP address: octets must be 0-255"));
    }
    if octets.iter().any(|o| o.len() > 1 && o.starts_with('0')) {
        return Err(ValidationError::new("ip", "Invalid IP address: octets must not have leading zeros"));
    }
    Ok(())
}

/// Découpe un OID pointé (point initial toléré) en arcs numériques.
pub fn parse_oid(oid: &str) -> Result<Vec<u64>, ValidationError> {
    let trimmed = oid.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("oid", "OID is required"));
    }
    let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
    body.split('.')
        .map(|arc| {
            if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValidationError::new(
                    "oid",
                    "Invalid OID format (e.g., 1.3.6.1.2.1.1.1.0)",
                ));
            }
            arc.parse::<u64>()
                .map_err(|_| ValidationError::new("oid", format!("OID arc out of range: {arc}")))
        })
        .collect()
}

pub fn validate_oid(oid: &str) -> Result<(), ValidationError> {
    parse_oid(oid).map(|_| ())
}

pub fn is_known_brand(brand: &str) -> bool {
    KNOWN_BRANDS.contains(&brand)
}

pub fn validate_component(component: &Component) -> Result<(), ValidationError> {
    validate_required(&component.name, "name")?;
    validate_oid(&component.oid)
}

/// Validation structurelle d'un serveur seul (hors unicité et identifiants SNMP).
pub fn validate_target(target: &Target) -> Result<(), ValidationError> {
    validate_required(&target.name, "name")?;
    validate_ip_address(&target.ip)?;
    validate_required(&target.brand, "brand")
}

/// Filtre un snapshot : écarte les serveurs invalides ou en doublon d'IP,
/// et les composants invalides ou en doublon d'OID dans leur serveur.
pub fn sanitize_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut seen_ips = HashSet::new();
    let mut kept = Vec::with_capacity(targets.len());

    for mut target in targets {
        if let Err(e) = validate_target(&target) {
            warn!(server = %target.name, id = target.id, error = %e, "dropping invalid target");
            continue;
        }
        if !seen_ips.insert(target.ip.clone()) {
            warn!(server = %target.name, ip = %target.ip, "dropping target with duplicate IP");
            continue;
        }
        if !is_known_brand(&target.brand) {
            warn!(server = %target.name, brand = %target.brand, "unknown brand, default classification applies");
        }

        let mut seen_oids = HashSet::new();
        target.components.retain(|component| {
            if let Err(e) = validate_component(component) {
                warn!(server = %target.name, component = %component.name, error = %e, "dropping invalid component");
                return false;
            }
            let normalized = component.oid.trim().trim_start_matches('.').to_string();
            if !seen_oids.insert(normalized) {
                warn!(server = %target.name, oid = %component.oid, "dropping component with duplicate OID");
                return false;
            }
            true
        });
        kept.push(target);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentCategory, SnmpVersion};

    fn target(id: u64, ip: &str, oids: &[&str]) -> Target {
        Target {
            id,
            name: format!("srv-{id}"),
            ip: ip.to_string(),
            brand: "HPE".into(),
            snmp_version: SnmpVersion::V2c,
            community: Some("public".into()),
            auth_user: None,
            auth_pass: None,
            priv_pass: None,
            auth_proto: None,
            priv_proto: None,
            components: oids
                .iter()
                .enumerate()
                .map(|(i, oid)| Component {
                    id: i as u64 + 1,
                    name: format!("c{i}"),
                    oid: oid.to_string(),
                    category: ComponentCategory::Fan,
                })
                .collect(),
        }
    }

    #[test]
    fn test_ip_validation() {
        assert!(validate_ip_address("192.168.1.10").is_ok());
        assert!(validate_ip_address("0.0.0.0").is_ok());
        assert!(validate_ip_address("256.1.1.1").is_err());
        assert!(validate_ip_address("10.0.0").is_err());
        assert!(validate_ip_address("10.0.0.a").is_err());
        assert!(validate_ip_address("").is_err());
        assert!(validate_ip_address("010.0.0.1").is_err());
        assert!(validate_ip_address("10.0.0.00").is_err());
    }

    #[test]
    fn test_leading_zero_ip_dropped_at_load() {
        let kept = sanitize_targets(vec![
            target(1, "010.0.0.1", &["1.3.6.1.1"]),
            target(2, "10.0.0.2", &["1.3.6.1.1"]),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
        // une IP gardée est toujours utilisable par le client SNMP
        assert!(kept[0].ip.parse::<std::net::IpAddr>().is_ok());
    }

    #[test]
    fn test_oid_parsing() {
        assert_eq!(parse_oid("1.3.6.1.2.1.1.1.0").unwrap(), vec![1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(parse_oid(" .1.3.6 ").unwrap(), vec![1, 3, 6]);
        assert_eq!(parse_oid("42").unwrap(), vec![42]);
        assert!(parse_oid("1..3").is_err());
        assert!(parse_oid("1.3.").is_err());
        assert!(parse_oid("iso.3.6").is_err());
        assert!(parse_oid("").is_err());
    }

    #[test]
    fn test_sanitize_drops_duplicates_and_invalid() {
        let targets = vec![
            target(1, "10.0.0.1", &["1.3.6.1", ".1.3.6.1", "1.3.6.2"]),
            target(2, "10.0.0.1", &["1.3.6.1"]),
            target(3, "999.0.0.1", &["1.3.6.1"]),
            target(4, "10.0.0.4", &["bad", "1.3.6.9"]),
        ];
        let kept = sanitize_targets(targets);
        let ids: Vec<u64> = kept.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(kept[0].components.len(), 2);
        assert_eq!(kept[1].components.len(), 1);
        assert_eq!(kept[1].components[0].oid, "1.3.6.9");
    }

    #[test]
    fn test_missing_credentials_are_not_a_registry_concern() {
        let mut t = target(1, "10.0.0.1", &["1.3.6.1"]);
        t.community = None;
        assert_eq!(sanitize_targets(vec![t]).len(), 1);
    }
}
