//! Client TLS credentials for agent connections.
//!
//! The agent authenticates clients by certificate: the console presents a
//! certificate/key pair on every connection, and the agent's hello reports
//! whether that certificate is already trusted. Agent certificates are
//! self-signed per install, so peer verification is only possible when the
//! operator supplies a CA bundle; without one the peer certificate is
//! accepted as-is and trust rests on the password authentication step.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio_rustls::rustls::client::{ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerName};
use tokio_rustls::TlsConnector;

use crate::error::{AgentError, Result};

/// Paths to the PEM-encoded client certificate, private key, and optional
/// CA bundle used to verify the agent.
#[derive(Debug, Clone)]
pub struct TlsCredentials {
    cert_path: PathBuf,
    key_path: PathBuf,
    ca_path: Option<PathBuf>,
}

impl TlsCredentials {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ca_path: None,
        }
    }

    /// Verify the agent's certificate against the given PEM bundle instead
    /// of accepting it unchecked.
    pub fn with_ca_bundle(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    /// Build a connector presenting these credentials.
    pub(crate) fn connector(&self) -> Result<TlsConnector> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_key(&self.key_path)?;

        let builder = ClientConfig::builder().with_safe_defaults();
        let config = match &self.ca_path {
            Some(ca_path) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(ca_path)? {
                    roots.add(&cert)?;
                }
                builder
                    .with_root_certificates(roots)
                    .with_client_auth_cert(certs, key)?
            }
            None => builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_client_auth_cert(certs, key)?,
        };

        Ok(TlsConnector::from(Arc::new(config)))
    }
}

/// Verifier that accepts whatever certificate the agent presents.
/// Used only when no CA bundle is configured.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let data = fs::read(path)
        .map_err(|e| AgentError::Credentials(format!("cannot read {}: {e}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut &data[..])
        .map_err(|e| AgentError::Credentials(format!("bad PEM in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(AgentError::Credentials(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_key(path: &Path) -> Result<PrivateKey> {
    let data = fs::read(path)
        .map_err(|e| AgentError::Credentials(format!("cannot read {}: {e}", path.display())))?;

    type KeyParser = fn(&mut dyn std::io::BufRead) -> std::io::Result<Vec<Vec<u8>>>;
    let parsers: [KeyParser; 3] = [
        rustls_pemfile::pkcs8_private_keys,
        rustls_pemfile::rsa_private_keys,
        rustls_pemfile::ec_private_keys,
    ];
    for parse in parsers {
        let keys = parse(&mut &data[..])
            .map_err(|e| AgentError::Credentials(format!("bad PEM in {}: {e}", path.display())))?;
        if let Some(key) = keys.into_iter().next() {
            return Ok(PrivateKey(key));
        }
    }

    Err(AgentError::Credentials(format!(
        "no private key found in {}",
        path.display()
    )))
}
