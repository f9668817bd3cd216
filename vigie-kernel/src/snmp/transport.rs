//! Transport SNMP réel basé sur `snmp2` : une session UDP par GET,
//! aucun retry. Le timeout est appliqué par `SnmpClient`.

use super::credentials::{AuthAlgorithm, Credentials, PrivAlgorithm};
use super::{FetchError, GetRequest, SnmpTransport};
use async_trait::async_trait;
use snmp2::{v3, AsyncSession, Oid, Pdu, Value};
use std::net::Ipv4Addr;

#[derive(Debug, Default, Clone, Copy)]
pub struct Snmp2Transport;

impl Snmp2Transport {
    pub fn new() -> Self {
        Self
    }
}

fn security(
    username: &str,
    auth_passphrase: &str,
    auth: AuthAlgorithm,
    privacy: Option<(&str, PrivAlgorithm)>,
) -> v3::Security {
    let protocol = match auth {
        AuthAlgorithm::Md5 => v3::AuthProtocol::Md5,
        AuthAlgorithm::Sha => v3::AuthProtocol::Sha1,
    };
    let mode = match privacy {
        Some((passphrase, algorithm)) => v3::Auth::AuthPriv {
            cipher: match algorithm {
                PrivAlgorithm::Des => v3::Cipher::Des,
                PrivAlgorithm::Aes128 => v3::Cipher::Aes128,
            },
            privacy_password: passphrase.as_bytes().to_vec(),
        },
        None => v3::Auth::AuthNoPriv,
    };
    v3::Security::new(username.as_bytes(), auth_passphrase.as_bytes())
        .with_auth_protocol(protocol)
        .with_auth(mode)
}

/// Erreur socket (envoi / réception refusés) = hôte injoignable ;
/// le reste vient d'une réponse reçue mais inexploitable
fn session_error(e: snmp2::Error) -> FetchError {
    match e {
        snmp2::Error::Send | snmp2::Error::Receive => FetchError::Unreachable(format!("{e:?}")),
        other => FetchError::Protocol(format!("{other:?}")),
    }
}

/// Extrait la première valeur de la réponse sous forme texte
fn read_value(mut pdu: Pdu<'_>) -> Result<String, FetchError> {
    if pdu.error_status != 0 {
        return Err(FetchError::Protocol(format!(
            "error status {} at index {}",
            pdu.error_status, pdu.error_index
        )));
    }
    let Some((_, value)) = pdu.varbinds.next() else {
        return Err(FetchError::Protocol("response carried no varbind".into()));
    };
    match value {
        Value::OctetString(bytes) => Ok(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => Ok(n.to_string()),
        Value::Counter64(n) => Ok(n.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::IpAddress(octets) => Ok(Ipv4Addr::from(octets).to_string()),
        Value::NoSuchObject => Err(FetchError::Protocol("noSuchObject".into())),
        Value::NoSuchInstance => Err(FetchError::Protocol("noSuchInstance".into())),
        Value::EndOfMibView => Err(FetchError::Protocol("endOfMibView".into())),
        other => Ok(format!("{other:?}")),
    }
}

#[async_trait]
impl SnmpTransport for Snmp2Transport {
    async fn get(&self, request: &GetRequest) -> Result<String, FetchError> {
        let oid = Oid::from(request.oid.as_slice())
            .map_err(|e| FetchError::Configuration(format!("invalid OID: {e:?}")))?;

        match &request.credentials {
            Credentials::Community(community) => {
                let mut session = AsyncSession::new_v2c(request.address, community.as_bytes(), 0)
                    .await
                    .map_err(|e| FetchError::Unreachable(e.to_string()))?;
                let pdu = session.get(&oid).await.map_err(session_error)?;
                read_value(pdu)
            }
            Credentials::User { username, auth_passphrase, auth, privacy } => {
                let security = security(
                    username,
                    auth_passphrase,
                    *auth,
                    privacy.as_ref().map(|p| (p.passphrase.as_str(), p.algorithm)),
                );
                let mut session = AsyncSession::new_v3(request.address, 0, security)
                    .await
                    .map_err(|e| FetchError::Unreachable(e.to_string()))?;
                // découverte engine id / boots
                session.init().await.map_err(session_error)?;
                let pdu = session.get(&oid).await.map_err(session_error)?;
                read_value(pdu)
            }
        }
    }
}
