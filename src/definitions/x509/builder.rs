//! Construction of IACA and Document Signer certificates.
//!
//! Every profile constraint is checked before anything is signed; a builder either returns a
//! complete certificate or an error listing what is wrong, never a partial certificate.
use std::time::Duration;

use const_oid::{
    db::{
        rfc2256::STATE_OR_PROVINCE_NAME,
        rfc4519::{COMMON_NAME, COUNTRY_NAME},
    },
    AssociatedOid, ObjectIdentifier,
};
use der::{
    asn1::{BitString, GeneralizedTime, Ia5String, OctetString, UtcTime},
    DateTime, Encode,
};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use x509_cert::{
    ext::{
        pkix::{
            crl::dp::DistributionPoint,
            name::{DistributionPointName, GeneralName},
            AuthorityKeyIdentifier, BasicConstraints, CrlDistributionPoints, ExtendedKeyUsage,
            IssuerAltName, KeyUsage, KeyUsages, SubjectKeyIdentifier,
        },
        Extension,
    },
    name::Name,
    spki::SubjectPublicKeyInfoOwned,
    time::{Time, Validity},
    Certificate, TbsCertificate, Version,
};

use super::{
    decoded::{DocumentSignerCertificate, IacaCertificate},
    error::check,
    profile::{
        check_key_type, DocumentSignerProfile, IacaProfile, IssuerAlternativeName, PrincipalName,
        ValidityPeriod,
    },
    serial,
    util::{build_name, LOCALITY_NAME, ORGANIZATION_NAME},
    validation::{extensions::document_signer_extended_key_usage_oid, signature::raw_to_x509},
    x5chain::CertificateWithDer,
    Error, ProfileViolation,
};
use crate::cose::{key::KeyError, AsymmetricKey};

/// Builds a self-signed IACA certificate.
#[derive(Debug, Clone)]
pub struct IacaBuilder {
    profile: IacaProfile,
}

/// Builds a Document Signer certificate issued by an IACA.
#[derive(Debug, Clone)]
pub struct DocumentSignerBuilder {
    profile: DocumentSignerProfile,
}

impl IacaBuilder {
    pub fn new(profile: IacaProfile) -> Self {
        Self { profile }
    }

    pub async fn build(self, signing_key: &dyn AsymmetricKey) -> Result<IacaCertificate, Error> {
        let key_type = signing_key.key_type();
        let mut violations = check_key_type(key_type);
        violations.extend(self.profile.check());
        violations.extend(not_expired(&self.profile.validity_period));
        check(violations)?;

        let spki = key_type.subject_public_key_info(&signing_key.public_key_bytes())?;
        let ski = key_identifier(&spki);
        let name = principal_name(&self.profile.principal_name, false)?;

        let extensions = vec![
            extension(&SubjectKeyIdentifier(octets(&ski)?), false)?,
            extension(&KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign), true)?,
            extension(
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: Some(0),
                },
                true,
            )?,
            extension(
                &issuer_alt_name(&self.profile.issuer_alternative_name)?,
                false,
            )?,
            extension(
                &crl_distribution_points(&self.profile.crl_distribution_point_uri)?,
                false,
            )?,
        ];

        let tbs = tbs_certificate(
            signing_key,
            name.clone(),
            name,
            &self.profile.validity_period,
            spki,
            extensions,
        )?;
        let certificate = sign(tbs, signing_key).await?;
        tracing::debug!(
            "built IACA certificate for '{}'",
            self.profile.principal_name.common_name
        );
        IacaCertificate::try_from(CertificateWithDer::from_cert(certificate)?)
    }
}

impl DocumentSignerBuilder {
    pub fn new(profile: DocumentSignerProfile) -> Self {
        Self { profile }
    }

    /// Certify `document_signer_key` under `iaca`, signing with `iaca_key`.
    ///
    /// Only the public half of `document_signer_key` is used.
    pub async fn build(
        self,
        document_signer_key: &dyn AsymmetricKey,
        iaca: &IacaCertificate,
        iaca_key: &dyn AsymmetricKey,
    ) -> Result<DocumentSignerCertificate, Error> {
        let key_type = document_signer_key.key_type();
        let mut violations = check_key_type(key_type);
        violations.extend(check_key_type(iaca_key.key_type()));
        violations.extend(self.profile.check());
        violations.extend(self.profile.check_against(&iaca.profile));
        violations.extend(not_expired(&self.profile.validity_period));
        check(violations)?;

        let iaca_spki = &iaca
            .certificate()
            .inner
            .tbs_certificate
            .subject_public_key_info;
        if iaca_spki.subject_public_key.raw_bytes() != iaca_key.public_key_bytes() {
            return Err(KeyError::InvalidPublicKey(
                "the signing key does not belong to the IACA certificate".into(),
            )
            .into());
        }

        let spki = key_type.subject_public_key_info(&document_signer_key.public_key_bytes())?;
        let ski = key_identifier(&spki);
        let aki = key_identifier(iaca_spki);

        let extensions = vec![
            extension(
                &AuthorityKeyIdentifier {
                    key_identifier: Some(octets(&aki)?),
                    ..Default::default()
                },
                false,
            )?,
            extension(&SubjectKeyIdentifier(octets(&ski)?), false)?,
            extension(&KeyUsage(KeyUsages::DigitalSignature.into()), true)?,
            extension(
                &ExtendedKeyUsage(vec![document_signer_extended_key_usage_oid()]),
                true,
            )?,
            extension(
                &issuer_alt_name(&iaca.profile.issuer_alternative_name)?,
                false,
            )?,
            extension(
                &crl_distribution_points(&self.profile.crl_distribution_point_uri)?,
                false,
            )?,
        ];

        let tbs = tbs_certificate(
            iaca_key,
            iaca.certificate().inner.tbs_certificate.subject.clone(),
            principal_name(&self.profile.principal_name, true)?,
            &self.profile.validity_period,
            spki,
            extensions,
        )?;
        let certificate = sign(tbs, iaca_key).await?;
        tracing::debug!(
            "built document signer certificate for '{}'",
            self.profile.principal_name.common_name
        );
        DocumentSignerCertificate::try_from(CertificateWithDer::from_cert(certificate)?)
    }
}

fn not_expired(period: &ValidityPeriod) -> Vec<ProfileViolation> {
    if period.not_after <= OffsetDateTime::now_utc() {
        vec![ProfileViolation::Expired]
    } else {
        vec![]
    }
}

fn tbs_certificate(
    signer: &dyn AsymmetricKey,
    issuer: Name,
    subject: Name,
    period: &ValidityPeriod,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    extensions: Vec<Extension>,
) -> Result<TbsCertificate, Error> {
    let serial_number = serial::generate()?;
    serial::validate(&serial_number)?;
    Ok(TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: signer.key_type().x509_signature_algorithm()?,
        issuer,
        validity: Validity {
            not_before: x509_time(period.not_before)?,
            not_after: x509_time(period.not_after)?,
        },
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

async fn sign(tbs: TbsCertificate, signer: &dyn AsymmetricKey) -> Result<Certificate, Error> {
    let key_type = signer.key_type();
    let tbs_der = tbs.to_der().map_err(Error::Encoding)?;
    let raw = signer.sign(&tbs_der).await?;
    let signature = raw_to_x509(key_type, &raw)?;
    Ok(Certificate {
        tbs_certificate: tbs,
        signature_algorithm: key_type.x509_signature_algorithm()?,
        signature: BitString::from_bytes(&signature).map_err(Error::Encoding)?,
    })
}

/// UTCTime through 2049, GeneralizedTime from 2050, as RFC 5280 requires.
fn x509_time(datetime: OffsetDateTime) -> Result<Time, Error> {
    let seconds = u64::try_from(datetime.unix_timestamp())
        .map_err(|_| Error::Encoding(der::ErrorKind::DateTime.into()))?;
    let datetime =
        DateTime::from_unix_duration(Duration::from_secs(seconds)).map_err(Error::Encoding)?;
    if datetime.year() < 2050 {
        UtcTime::from_date_time(datetime)
            .map(Time::UtcTime)
            .map_err(Error::Encoding)
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(datetime)))
    }
}

fn principal_name(name: &PrincipalName, with_locality: bool) -> Result<Name, Error> {
    let mut attributes: Vec<(ObjectIdentifier, &str)> = vec![(COUNTRY_NAME, &name.country)];
    if let Some(state) = &name.state_or_province_name {
        attributes.push((STATE_OR_PROVINCE_NAME, state));
    }
    if let Some(locality) = name.locality_name.as_ref().filter(|_| with_locality) {
        attributes.push((LOCALITY_NAME, locality));
    }
    if let Some(organization) = &name.organization_name {
        attributes.push((ORGANIZATION_NAME, organization));
    }
    attributes.push((COMMON_NAME, &name.common_name));
    build_name(&attributes)
}

/// RFC 5280 method 1: SHA-1 of the subject public key bit string.
fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

fn octets(bytes: &[u8]) -> Result<OctetString, Error> {
    OctetString::new(bytes).map_err(Error::Encoding)
}

fn extension<T: Encode + AssociatedOid>(value: &T, critical: bool) -> Result<Extension, Error> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: octets(&value.to_der().map_err(Error::Encoding)?)?,
    })
}

fn ia5(value: &str) -> Result<Ia5String, Error> {
    Ia5String::new(value).map_err(Error::Encoding)
}

fn issuer_alt_name(ian: &IssuerAlternativeName) -> Result<IssuerAltName, Error> {
    let mut names = vec![];
    if let Some(uri) = ian.uri.as_deref().filter(|uri| !uri.trim().is_empty()) {
        names.push(GeneralName::UniformResourceIdentifier(ia5(uri)?));
    }
    if let Some(email) = ian.email.as_deref().filter(|email| !email.trim().is_empty()) {
        names.push(GeneralName::Rfc822Name(ia5(email)?));
    }
    Ok(IssuerAltName(names))
}

fn crl_distribution_points(uri: &str) -> Result<CrlDistributionPoints, Error> {
    Ok(CrlDistributionPoints(vec![DistributionPoint {
        distribution_point: Some(DistributionPointName::FullName(vec![
            GeneralName::UniformResourceIdentifier(ia5(uri)?),
        ])),
        reasons: None,
        crl_issuer: None,
    }]))
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use super::*;

    #[rstest::rstest]
    #[case::utc(datetime!(2049-12-31 23:59:59 UTC), true)]
    #[case::generalized(datetime!(2050-01-01 00:00:00 UTC), false)]
    fn time_encoding(#[case] at: OffsetDateTime, #[case] utc: bool) {
        let time = x509_time(at).unwrap();
        assert_eq!(matches!(time, Time::UtcTime(_)), utc);
        assert_eq!(OffsetDateTime::from(time.to_system_time()), at);
    }

    #[test]
    fn issuer_alt_name_skips_blank_entries() {
        let ian = issuer_alt_name(&IssuerAlternativeName {
            uri: Some(" ".into()),
            email: Some("iaca@example.com".into()),
        })
        .unwrap();
        assert_eq!(ian.0.len(), 1);
    }
}
