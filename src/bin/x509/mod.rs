use isomdoc::definitions::x509::{
    parse_document_signer, parse_iaca, CertificateWithDer, DocumentSignerValidator, Error,
    ValidationOptions,
};

/// Validate a PEM Document Signer certificate against a PEM IACA certificate.
///
/// Returns one message per failed check. An empty list means the pair is valid.
pub async fn validate(ds: &[u8], iaca: &[u8]) -> Result<Vec<String>, anyhow::Error> {
    let ds = parse_document_signer(CertificateWithDer::from_pem(ds)?.der());
    let iaca = parse_iaca(CertificateWithDer::from_pem(iaca)?.der());

    let (ds, iaca) = match (ds, iaca) {
        (Ok(ds), Ok(iaca)) => (ds, iaca),
        (ds, iaca) => {
            let mut errors = vec![];
            if let Err(e) = ds {
                errors.extend(messages("document signer", e));
            }
            if let Err(e) = iaca {
                errors.extend(messages("IACA", e));
            }
            return Ok(errors);
        }
    };

    Ok(DocumentSignerValidator::default()
        .validate(&ds, &iaca, &ValidationOptions::default())
        .await
        .err()
        .map(|e| messages("document signer", e))
        .unwrap_or_default())
}

/// Parse a PEM certificate as an IACA, falling back to a Document Signer, and describe it.
pub fn inspect(pem: &[u8]) -> Result<serde_json::Value, anyhow::Error> {
    let certificate = CertificateWithDer::from_pem(pem)?;
    if let Ok(iaca) = parse_iaca(certificate.der()) {
        return Ok(serde_json::json!({ "iaca": iaca }));
    }
    let ds = parse_document_signer(certificate.der())?;
    Ok(serde_json::json!({ "documentSigner": ds }))
}

fn messages(certificate: &str, error: Error) -> Vec<String> {
    match error {
        Error::Profile(violations) => violations
            .into_iter()
            .map(|v| format!("{certificate}: {v}"))
            .collect(),
        e => vec![format!("{certificate}: {e}")],
    }
}

#[cfg(test)]
mod test {
    use isomdoc::{
        cose::{EcSigningKey, KeyType},
        definitions::x509::{
            DocumentSignerBuilder, DocumentSignerProfile, IacaBuilder, IacaProfile,
            IssuerAlternativeName, PrincipalName, ValidityPeriod,
        },
    };

    fn principal_name(common_name: &str) -> PrincipalName {
        PrincipalName {
            country: "US".into(),
            common_name: common_name.into(),
            state_or_province_name: None,
            organization_name: None,
            locality_name: None,
        }
    }

    async fn pems() -> (String, String) {
        let iaca_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let ds_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let iaca = IacaBuilder::new(IacaProfile {
            principal_name: principal_name("CLI IACA"),
            validity_period: ValidityPeriod::days_from_now(365),
            issuer_alternative_name: IssuerAlternativeName {
                uri: None,
                email: Some("iaca@example.com".into()),
            },
            crl_distribution_point_uri: "https://example.com/crl".into(),
        })
        .build(&iaca_key)
        .await
        .unwrap();
        let ds = DocumentSignerBuilder::new(DocumentSignerProfile {
            principal_name: principal_name("CLI Document Signer"),
            validity_period: ValidityPeriod::days_from_now(90),
            crl_distribution_point_uri: "https://example.com/crl".into(),
        })
        .build(&ds_key, &iaca, &iaca_key)
        .await
        .unwrap();
        (
            ds.certificate().to_pem().unwrap(),
            iaca.certificate().to_pem().unwrap(),
        )
    }

    #[test_log::test(tokio::test)]
    async fn validate_pair() {
        let (ds, iaca) = pems().await;
        assert!(super::validate(ds.as_bytes(), iaca.as_bytes())
            .await
            .unwrap()
            .is_empty());

        let swapped = super::validate(iaca.as_bytes(), ds.as_bytes())
            .await
            .unwrap();
        assert!(!swapped.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn inspect_detects_the_certificate_kind() {
        let (ds, iaca) = pems().await;
        assert!(super::inspect(iaca.as_bytes()).unwrap().get("iaca").is_some());
        let ds = super::inspect(ds.as_bytes()).unwrap();
        assert_eq!(
            ds["documentSigner"]["profile"]["principalName"]["commonName"],
            "CLI Document Signer"
        );
    }
}
