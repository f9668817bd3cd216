//! Résolution des identifiants SNMP d'un serveur.
//!
//! Un identifiant manquant est une erreur de configuration : elle est levée
//! ici, avant tout envoi réseau.

use super::FetchError;
use crate::models::{SnmpVersion, Target};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlgorithm {
    Md5,
    Sha,
}

impl AuthAlgorithm {
    /// Nom inconnu ou absent → SHA, le plus fort des deux
    pub fn from_config(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("MD5") => Self::Md5,
            _ => Self::Sha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivAlgorithm {
    Des,
    Aes128,
}

impl PrivAlgorithm {
    /// Nom inconnu ou absent → AES-128
    pub fn from_config(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("DES") => Self::Des,
            _ => Self::Aes128,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Privacy {
    pub passphrase: String,
    pub algorithm: PrivAlgorithm,
}

/// Identifiants prêts à l'emploi, un seul mode à la fois
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Community(String),
    User {
        username: String,
        auth_passphrase: String,
        auth: AuthAlgorithm,
        privacy: Option<Privacy>,
    },
}

// jamais de secret dans les logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Community(_) => f.write_str("Community(***)"),
            Credentials::User { username, auth, privacy, .. } => f
                .debug_struct("User")
                .field("username", username)
                .field("auth", auth)
                .field("privacy", &privacy.as_ref().map(|p| p.algorithm))
                .finish(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl Credentials {
    pub fn resolve(target: &Target) -> Result<Self, FetchError> {
        match target.snmp_version {
            SnmpVersion::V2c => {
                let community = non_blank(&target.community).ok_or_else(|| {
                    FetchError::Configuration(format!(
                        "SNMP v2c requires community string for server {}",
                        target.name
                    ))
                })?;
                Ok(Credentials::Community(community.to_string()))
            }
            SnmpVersion::V3 => {
                let (Some(username), Some(auth_passphrase)) =
                    (non_blank(&target.auth_user), non_blank(&target.auth_pass))
                else {
                    return Err(FetchError::Configuration(format!(
                        "SNMP v3 requires auth credentials for server {}",
                        target.name
                    )));
                };
                let privacy = non_blank(&target.priv_pass).map(|passphrase| Privacy {
                    passphrase: passphrase.to_string(),
                    algorithm: PrivAlgorithm::from_config(target.priv_proto.as_deref()),
                });
                Ok(Credentials::User {
                    username: username.to_string(),
                    auth_passphrase: auth_passphrase.to_string(),
                    auth: AuthAlgorithm::from_config(target.auth_proto.as_deref()),
                    privacy,
                })
            }
        }
    }
}
