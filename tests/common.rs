//! Fixtures shared by the integration tests.
use anyhow::Result;
use isomdoc::{
    cbor::Value,
    cose::{EcSigningKey, KeyType},
    definitions::{
        x509::{
            DocumentSignerBuilder, DocumentSignerCertificate, DocumentSignerProfile, IacaBuilder,
            IacaCertificate, IacaProfile, IssuerAlternativeName, PrincipalName, ValidityPeriod,
            X5Chain,
        },
        helpers::{NonEmptyMap, NonEmptyVec},
        CoseKey, DeviceKeyInfo, DigestAlgorithm, KeyAuthorizations, ValidityInfo,
    },
    issuance::{Builder, Mdoc},
};
use time::{Duration, OffsetDateTime};

#[allow(dead_code)]
pub const DOC_TYPE: &str = "org.iso.18013.5.1.mDL";
#[allow(dead_code)]
pub const NAMESPACE: &str = "org.iso.18013.5.1";

#[allow(dead_code)]
fn main() {}

pub fn iaca_profile(days: i64) -> IacaProfile {
    IacaProfile {
        principal_name: PrincipalName {
            country: "US".into(),
            common_name: "Utopia IACA".into(),
            state_or_province_name: Some("US-UT".into()),
            organization_name: Some("Utopia DMV".into()),
            locality_name: None,
        },
        validity_period: ValidityPeriod::days_from_now(days),
        issuer_alternative_name: IssuerAlternativeName {
            uri: Some("https://dmv.utopia.example".into()),
            email: Some("iaca@dmv.utopia.example".into()),
        },
        crl_distribution_point_uri: "https://dmv.utopia.example/crl".into(),
    }
}

#[allow(dead_code)]
pub fn document_signer_profile(days: i64) -> DocumentSignerProfile {
    DocumentSignerProfile {
        principal_name: PrincipalName {
            country: "US".into(),
            common_name: "Utopia Document Signer".into(),
            state_or_province_name: Some("US-UT".into()),
            organization_name: Some("Utopia DMV".into()),
            locality_name: Some("Utopia City".into()),
        },
        validity_period: ValidityPeriod::days_from_now(days),
        crl_distribution_point_uri: "https://dmv.utopia.example/crl".into(),
    }
}

pub struct Issuer {
    pub iaca: IacaCertificate,
    pub iaca_key: EcSigningKey,
    pub ds: DocumentSignerCertificate,
    pub ds_key: EcSigningKey,
}

pub async fn issuer() -> Result<Issuer> {
    let iaca_key = EcSigningKey::generate(KeyType::Secp256r1)?;
    let ds_key = EcSigningKey::generate(KeyType::Secp256r1)?;
    let iaca = IacaBuilder::new(iaca_profile(3650)).build(&iaca_key).await?;
    let ds = DocumentSignerBuilder::new(document_signer_profile(365))
        .build(&ds_key, &iaca, &iaca_key)
        .await?;
    Ok(Issuer {
        iaca,
        iaca_key,
        ds,
        ds_key,
    })
}

/// An mDL for John Doe, valid for 30 days, whose device key may also sign
/// `NAMESPACE/family_name`.
#[allow(dead_code)]
pub fn mdl_builder(issuer: &Issuer, device_key: &EcSigningKey) -> Result<Builder> {
    let now = OffsetDateTime::now_utc();
    let mut device_key_info = DeviceKeyInfo::from(CoseKey::from(&device_key.public_key()));
    device_key_info.key_authorizations = Some(KeyAuthorizations {
        namespaces: None,
        data_elements: Some(NonEmptyMap::new(
            NAMESPACE.to_string(),
            NonEmptyVec::new("family_name".to_string()),
        )),
    });
    Ok(Mdoc::builder()
        .doc_type(DOC_TYPE)
        .add_namespace(
            NAMESPACE,
            [
                ("family_name", Value::Text("Doe".into())),
                ("given_name", Value::Text("John".into())),
                ("age_over_21", Value::Bool(true)),
            ],
        )?
        .validity_info(ValidityInfo::new(now, now, now + Duration::days(30), None))
        .digest_algorithm(DigestAlgorithm::SHA256)
        .device_key_info(device_key_info)
        .x5chain(X5Chain::from(issuer.ds.certificate().clone())))
}

#[allow(dead_code)]
pub async fn issue_mdl(issuer: &Issuer, device_key: &EcSigningKey) -> Result<Mdoc> {
    Ok(mdl_builder(issuer, device_key)?.issue(&issuer.ds_key).await?)
}
