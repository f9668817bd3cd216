/*!
Transport SNMP scripté pour tests sans équipement

Chaque couple (ip, oid) reçoit une réponse programmée. Tout ce qui n'est pas
scripté répond avec la réponse par défaut (Unreachable si rien n'est fixé).
Toutes les requêtes reçues sont enregistrées.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigie_kernel::snmp::{Credentials, FetchError, GetRequest, SnmpTransport};

#[derive(Debug, Clone)]
pub enum Reply {
    Value(String),
    /// Valeur rendue après une latence
    Delayed(String, Duration),
    Fail(FetchError),
    /// Ne répond jamais : seul le timeout du client arrête l'attente
    Silent,
    /// Panic dans le transport (bug de décodage côté client)
    Panic(String),
}

#[derive(Debug, Clone)]
pub struct RecordedGet {
    pub ip: String,
    pub port: u16,
    pub oid: String,
    pub credentials: Credentials,
}

#[derive(Default)]
struct Script {
    replies: HashMap<(String, String), Reply>,
    fallback: Option<Reply>,
    requests: Vec<RecordedGet>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Décompte des requêtes en cours, y compris si le client abandonne (timeout)
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn normalize_oid(oid: &str) -> String {
    oid.trim().trim_start_matches('.').to_string()
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, ip: &str, oid: &str, reply: Reply) -> &Self {
        self.script.lock().replies.insert((ip.to_string(), normalize_oid(oid)), reply);
        self
    }

    pub fn value(&self, ip: &str, oid: &str, value: &str) -> &Self {
        self.reply(ip, oid, Reply::Value(value.to_string()))
    }

    pub fn fail(&self, ip: &str, oid: &str, error: FetchError) -> &Self {
        self.reply(ip, oid, Reply::Fail(error))
    }

    /// Réponse pour tout ce qui n'est pas scripté
    pub fn otherwise(&self, reply: Reply) -> &Self {
        self.script.lock().fallback = Some(reply);
        self
    }

    pub fn requests(&self) -> Vec<RecordedGet> {
        self.script.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().requests.len()
    }

    /// Plus grand nombre de GET simultanés observé
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests_to(&self, ip: &str) -> Vec<RecordedGet> {
        self.script.lock().requests.iter().filter(|r| r.ip == ip).cloned().collect()
    }
}

#[async_trait]
impl SnmpTransport for ScriptedTransport {
    async fn get(&self, request: &GetRequest) -> Result<String, FetchError> {
        let ip = request.address.ip().to_string();
        let oid = request.oid_string();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(self.in_flight.clone());

        let reply = {
            let mut script = self.script.lock();
            script.requests.push(RecordedGet {
                ip: ip.clone(),
                port: request.address.port(),
                oid: oid.clone(),
                credentials: request.credentials.clone(),
            });
            script
                .replies
                .get(&(ip.clone(), oid.clone()))
                .or(script.fallback.as_ref())
                .cloned()
        };

        match reply {
            Some(Reply::Value(v)) => Ok(v),
            Some(Reply::Delayed(v, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(v)
            }
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Silent) => {
                std::future::pending::<()>().await;
                Err(FetchError::Timeout(Duration::ZERO))
            }
            Some(Reply::Panic(msg)) => panic!("{msg}"),
            None => Err(FetchError::Unreachable(format!("no scripted reply for {ip} {oid}"))),
        }
    }
}
