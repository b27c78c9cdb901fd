// Certificate Checker - TLS handshake, expiry classification and persistence

use crate::db::models::{CertCheck, Domain};
use crate::db::traits::DomainRepository;
use crate::inspector::types::{BadCertEvent, CertStatus};
use crate::{InspectError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{Instrument, Span};
use x509_parser::prelude::*;

/// What a TLS probe learned about one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertProbe {
    /// Dial or handshake failed
    Unreachable { reason: String },
    /// Handshake completed and the leaf certificate was read
    Handshake {
        not_after: DateTime<Utc>,
        hostname_verified: bool,
    },
}

impl CertProbe {
    /// Leaf certificate expiry, when one was read
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            CertProbe::Unreachable { .. } => None,
            CertProbe::Handshake { not_after, .. } => Some(*not_after),
        }
    }
}

/// Network side of the certificate check
#[async_trait]
pub trait CertProber: Send + Sync {
    async fn probe(&self, hostname: &str) -> CertProbe;
}

/// Classify a probe result.
///
/// Order matters: connectivity, then hostname, then expiry.
pub fn classify(probe: &CertProbe, now: DateTime<Utc>, threshold: chrono::Duration) -> CertStatus {
    match probe {
        CertProbe::Unreachable { .. } => CertStatus::CannotConnect,
        CertProbe::Handshake {
            hostname_verified: false,
            ..
        } => CertStatus::CannotConnect,
        CertProbe::Handshake { not_after, .. } if *not_after < now => CertStatus::Expired,
        CertProbe::Handshake { not_after, .. } if *not_after < now + threshold => {
            CertStatus::AboutToExpire
        }
        CertProbe::Handshake { .. } => CertStatus::Ok,
    }
}

/// Checks one domain: probe, classify, persist, then report non-OK outcomes
pub struct CertChecker {
    prober: Arc<dyn CertProber>,
    repository: Arc<DomainRepository>,
    threshold: chrono::Duration,
    span: Span,
}

impl CertChecker {
    pub fn new(
        prober: Arc<dyn CertProber>,
        repository: Arc<DomainRepository>,
        threshold: chrono::Duration,
        span: Span,
    ) -> Self {
        Self {
            prober,
            repository,
            threshold,
            span,
        }
    }

    /// Check one domain and return its classification.
    ///
    /// A failed save is logged and no event is sent for that domain.
    pub async fn check(&self, domain: &Domain, events: &mpsc::Sender<BadCertEvent>) -> CertStatus {
        self.check_inner(domain, events)
            .instrument(self.span.clone())
            .await
    }

    async fn check_inner(&self, domain: &Domain, events: &mpsc::Sender<BadCertEvent>) -> CertStatus {
        tracing::info!("Checking cert for \"{}\"", domain.domain);

        let probe = self.prober.probe(&domain.domain).await;
        let now = Utc::now();
        let status = classify(&probe, now, self.threshold);

        if let CertProbe::Unreachable { reason } = &probe {
            tracing::warn!("Cannot connect to \"{}\": {}", domain.domain, reason);
        }

        let check = CertCheck::new(&domain.id, status, probe.expiry(), now);
        if let Err(e) = self.repository.save_check(&check).await {
            tracing::error!("Failed to save cert check for \"{}\": {}", domain.domain, e);
            return status;
        }

        if status.is_notifiable() {
            let event = BadCertEvent {
                domain_id: domain.id.clone(),
                domain: domain.domain.clone(),
                status,
                expiry: probe.expiry(),
                time: now,
            };

            if events.send(event).await.is_err() {
                tracing::error!(
                    "Bad cert event for \"{}\" dropped: event loop closed",
                    domain.domain
                );
            }
        }

        status
    }
}

/// TLS prober built on tokio-rustls and the webpki root store
pub struct RustlsProber {
    connector: TlsConnector,
    timeout: Duration,
    port: u16,
}

impl RustlsProber {
    /// Create a prober; `timeout` bounds the dial and the handshake separately
    pub fn new(timeout: Duration, port: u16) -> Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(root_store, timeout, port)
    }

    /// Create a prober that trusts only `roots`
    pub fn with_roots(roots: RootCertStore, timeout: Duration, port: u16) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let webpki =
            WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
                .build()
                .map_err(|e| {
                    InspectError::config(format!("Failed to build certificate verifier: {}", e))
                })?;

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| InspectError::config(format!("Unsupported TLS configuration: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(ClassifyingVerifier { inner: webpki }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
            port,
        })
    }

    async fn handshake(&self, hostname: &str) -> std::result::Result<CertProbe, String> {
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| format!("invalid server name: {}", e))?;

        let stream = timeout(self.timeout, TcpStream::connect((hostname, self.port)))
            .await
            .map_err(|_| format!("dial timed out after {:?}", self.timeout))?
            .map_err(|e| format!("dial failed: {}", e))?;

        let tls_stream = timeout(self.timeout, self.connector.connect(server_name, stream))
            .await
            .map_err(|_| format!("handshake timed out after {:?}", self.timeout))?
            .map_err(|e| format!("handshake failed: {}", e))?;

        let (_io, connection) = tls_stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| "server sent no certificate".to_string())?;

        let (_, cert) = X509Certificate::from_der(leaf.as_ref())
            .map_err(|e| format!("failed to parse certificate: {:?}", e))?;

        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| "certificate expiry out of range".to_string())?;

        Ok(CertProbe::Handshake {
            not_after,
            hostname_verified: certificate_matches_host(&cert, hostname),
        })
    }
}

#[async_trait]
impl CertProber for RustlsProber {
    async fn probe(&self, hostname: &str) -> CertProbe {
        match self.handshake(hostname).await {
            Ok(probe) => probe,
            Err(reason) => CertProbe::Unreachable { reason },
        }
    }
}

/// WebPKI verification that lets expired and name-mismatched leaves complete
/// the handshake, so the checker can classify them itself. Every other chain
/// fault, including an expired intermediate, still fails the handshake.
#[derive(Debug)]
struct ClassifyingVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

fn is_expiry(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::Expired | CertificateError::ExpiredContext { .. }
    )
}

fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

/// Last second the leaf was valid, if that is already in the past
fn leaf_last_valid_second(cert: &X509Certificate<'_>, now: UnixTime) -> Option<UnixTime> {
    let last = u64::try_from(cert.validity().not_after.timestamp())
        .ok()?
        .checked_sub(1)?;
    (last < now.as_secs()).then(|| UnixTime::since_unix_epoch(Duration::from_secs(last)))
}

/// First name the leaf is issued for, used to re-run chain validation
/// independently of the dialed host
fn leaf_presented_name(cert: &X509Certificate<'_>) -> Option<ServerName<'static>> {
    let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
    else {
        return None;
    };
    let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() else {
        return None;
    };

    san.general_names.iter().find_map(|name| match name {
        GeneralName::DNSName(pattern) => {
            let host = match pattern.strip_prefix("*.") {
                Some(suffix) => format!("certwatch.{}", suffix),
                None => pattern.to_string(),
            };
            ServerName::try_from(host).ok()
        }
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => <[u8; 4]>::try_from(*bytes)
                .ok()
                .map(|octets| ServerName::from(IpAddr::from(octets))),
            16 => <[u8; 16]>::try_from(*bytes)
                .ok()
                .map(|octets| ServerName::from(IpAddr::from(octets))),
            _ => None,
        },
        _ => None,
    })
}

impl ServerCertVerifier for ClassifyingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let verdict =
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        let expired = match &verdict {
            Err(rustls::Error::InvalidCertificate(err)) if is_expiry(err) => Some(true),
            Err(rustls::Error::InvalidCertificate(err)) if is_name_mismatch(err) => Some(false),
            _ => None,
        };
        let Some(expired) = expired else {
            return verdict;
        };

        let Ok((_, leaf)) = X509Certificate::from_der(end_entity.as_ref()) else {
            return verdict;
        };

        // Re-validate the whole chain at a moment the leaf itself was valid,
        // under a name the leaf was issued for. Only the leaf's own expiry and
        // name are excused; the hostname is checked against the SANs later.
        let at = if expired {
            match leaf_last_valid_second(&leaf, now) {
                Some(at) => at,
                None => return verdict,
            }
        } else {
            now
        };
        let Some(name) = leaf_presented_name(&leaf) else {
            return verdict;
        };

        match self
            .inner
            .verify_server_cert(end_entity, intermediates, &name, ocsp_response, at)
        {
            Ok(verified) => Ok(verified),
            Err(_) => verdict,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Match `host` against the certificate's subjectAltName entries
fn certificate_matches_host(cert: &X509Certificate<'_>, host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let ip: Option<IpAddr> = host.parse().ok();

    let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
    else {
        return false;
    };
    let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() else {
        return false;
    };

    san.general_names.iter().any(|name| match name {
        GeneralName::DNSName(pattern) => ip.is_none() && dns_name_matches(pattern, &host),
        GeneralName::IPAddress(bytes) => ip.is_some_and(|ip| ip_matches(bytes, ip)),
        _ => false,
    })
}

/// DNS name match with single-label leftmost wildcard support
pub fn dns_name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}

fn ip_matches(bytes: &[u8], ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => bytes == &v4.octets()[..],
        IpAddr::V6(v6) => bytes == &v6.octets()[..],
    }
}
