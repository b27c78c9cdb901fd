// Certificate chain tests
// Serve generated chains over tokio-rustls and classify what the prober reports

use certwatch::inspector::{CertProbe, CertProber, CertStatus, RustlsProber, classify};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, date_time_ymd,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A certificate together with the key that signs on its behalf
struct Issued {
    cert: Certificate,
    key: KeyPair,
}

fn authority(name: &str, from: i32, until: i32, issuer: Option<&Issued>) -> Issued {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = date_time_ymd(from, 1, 1);
    params.not_after = date_time_ymd(until, 1, 1);

    let key = KeyPair::generate().unwrap();
    let cert = match issuer {
        Some(issuer) => params.signed_by(&key, &issuer.cert, &issuer.key).unwrap(),
        None => params.self_signed(&key).unwrap(),
    };
    Issued { cert, key }
}

fn server_cert(host: &str, from: i32, until: i32, issuer: &Issued) -> Issued {
    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, host);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.not_before = date_time_ymd(from, 1, 1);
    params.not_after = date_time_ymd(until, 1, 1);

    let key = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key, &issuer.cert, &issuer.key).unwrap();
    Issued { cert, key }
}

/// Accept TLS connections on 127.0.0.1 presenting `leaf` and `intermediate`
async fn serve(leaf: &Issued, intermediate: &Issued) -> u16 {
    let chain: Vec<CertificateDer<'static>> =
        vec![leaf.cert.der().clone(), intermediate.cert.der().clone()];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf.key.serialize_der()));

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(chain, key)
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let _ = acceptor.accept(stream).await;
            });
        }
    });

    port
}

fn trusting(root: &Issued, port: u16) -> RustlsProber {
    let mut roots = RootCertStore::empty();
    roots.add(root.cert.der().clone()).unwrap();
    RustlsProber::with_roots(roots, Duration::from_secs(5), port).unwrap()
}

fn status_of(probe: &CertProbe) -> CertStatus {
    classify(probe, Utc::now(), ChronoDuration::hours(72))
}

#[tokio::test]
async fn test_valid_chain_is_ok() {
    let root = authority("certwatch test root", 2020, 2049, None);
    let intermediate = authority("certwatch test intermediate", 2020, 2048, Some(&root));
    let leaf = server_cert("localhost", 2024, 2045, &intermediate);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&root, port).probe("localhost").await;

    assert!(matches!(
        probe,
        CertProbe::Handshake {
            hostname_verified: true,
            ..
        }
    ));
    assert_eq!(status_of(&probe), CertStatus::Ok);
}

#[tokio::test]
async fn test_expired_intermediate_cannot_connect() {
    let root = authority("certwatch test root", 2020, 2049, None);
    let intermediate = authority("certwatch lapsed intermediate", 2020, 2021, Some(&root));
    let leaf = server_cert("localhost", 2020, 2039, &intermediate);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&root, port).probe("localhost").await;

    assert!(
        matches!(probe, CertProbe::Unreachable { .. }),
        "unexpected result: {:?}",
        probe
    );
    assert_eq!(status_of(&probe), CertStatus::CannotConnect);
}

#[tokio::test]
async fn test_expired_intermediate_on_untrusted_chain_cannot_connect() {
    let stranger = authority("certwatch unknown root", 2020, 2049, None);
    let intermediate = authority("certwatch lapsed intermediate", 2020, 2021, Some(&stranger));
    let leaf = server_cert("localhost", 2020, 2039, &intermediate);
    let trusted = authority("certwatch test root", 2020, 2049, None);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&trusted, port).probe("localhost").await;

    assert_eq!(status_of(&probe), CertStatus::CannotConnect);
}

#[tokio::test]
async fn test_untrusted_root_cannot_connect() {
    let stranger = authority("certwatch unknown root", 2020, 2049, None);
    let intermediate = authority("certwatch test intermediate", 2020, 2048, Some(&stranger));
    let leaf = server_cert("localhost", 2024, 2045, &intermediate);
    let trusted = authority("certwatch test root", 2020, 2049, None);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&trusted, port).probe("localhost").await;

    assert!(matches!(probe, CertProbe::Unreachable { .. }));
    assert_eq!(status_of(&probe), CertStatus::CannotConnect);
}

#[tokio::test]
async fn test_expired_leaf_is_classified_expired() {
    let root = authority("certwatch test root", 2020, 2049, None);
    let intermediate = authority("certwatch test intermediate", 2020, 2048, Some(&root));
    let leaf = server_cert("localhost", 2020, 2021, &intermediate);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&root, port).probe("localhost").await;

    assert_eq!(
        probe.expiry(),
        Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(status_of(&probe), CertStatus::Expired);
}

#[tokio::test]
async fn test_expired_leaf_under_lapsed_intermediate_cannot_connect() {
    let root = authority("certwatch test root", 2020, 2049, None);
    let intermediate = authority("certwatch lapsed intermediate", 2020, 2021, Some(&root));
    let leaf = server_cert("localhost", 2020, 2022, &intermediate);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&root, port).probe("localhost").await;

    assert_eq!(status_of(&probe), CertStatus::CannotConnect);
}

#[tokio::test]
async fn test_name_mismatch_completes_handshake_but_cannot_connect() {
    let root = authority("certwatch test root", 2020, 2049, None);
    let intermediate = authority("certwatch test intermediate", 2020, 2048, Some(&root));
    let leaf = server_cert("other.example", 2024, 2045, &intermediate);

    let port = serve(&leaf, &intermediate).await;
    let probe = trusting(&root, port).probe("localhost").await;

    assert!(matches!(
        probe,
        CertProbe::Handshake {
            hostname_verified: false,
            ..
        }
    ));
    assert_eq!(status_of(&probe), CertStatus::CannotConnect);
}
