//! Fixed encodings for every handover kind, and the unpadded base64url form of the remote
//! session transcript built from each.
//!
//! The OpenID4VP cases at the end are the examples published in OpenID for Verifiable
//! Presentations 1.0, Appendix B.2.6.
use isomdoc::{
    cbor,
    definitions::{Handover, SessionTranscript},
};

const CLIENT_ID: &str = "x509_san_dns:verifier.example.com";
const RESPONSE_URI: &str = "https://verifier.example.com/response";
const ORIGIN: &str = "https://verifier.example.com";
const NONCE: &str = "n-0S6_WzA2Mj";

#[rstest::rstest]
#[case::iso_18013_7_annex_b(
    Handover::oid4vp_iso18013_7(CLIENT_ID, RESPONSE_URI, NONCE, "mdoc-nonce").unwrap(),
    "835820d3279fce2a26b6994dcf04f74d4fc5fb78ec527b1cd3b7d6e1d3aab1053b19b85820bbfd894a159fb42d6c5d2eb968291cd8960df8fa55edbd1fe6c01b8cf8e6531f6c6e2d3053365f577a41324d6a",
    "g_b2g1gg0yefziomtplNzwT3TU_F-3jsUnsc07fW4dOqsQU7GbhYILv9iUoVn7QtbF0uuWgpHNiWDfj6Ve29H-bAG4z45lMfbG4tMFM2X1d6QTJNag"
)]
#[case::oid4vp(
    Handover::oid4vp(CLIENT_ID, NONCE, None, RESPONSE_URI).unwrap(),
    "82714f70656e494434565048616e646f7665725820a08d34307582f93a676b8417d5e634cc633e6783e579262eb6cfccb2d549f482",
    "g_b2gnFPcGVuSUQ0VlBIYW5kb3ZlclggoI00MHWC-Tpna4QX1eY0zGM-Z4PleSYuts_MstVJ9II"
)]
#[case::oid4vp_jwk_thumbprint(
    Handover::oid4vp(CLIENT_ID, NONCE, Some(&(0u8..32).collect::<Vec<u8>>()), RESPONSE_URI).unwrap(),
    "82714f70656e494434565048616e646f76657258204c86474e7ab2c0ccb30dd73b35f40909f638b50c72519404dc3eab408b1874a0",
    "g_b2gnFPcGVuSUQ0VlBIYW5kb3ZlclggTIZHTnqywMyzDdc7NfQJCfY4tQxyUZQE3D6rQIsYdKA"
)]
#[case::oid4vp_dc_api(
    Handover::oid4vp_dc_api(ORIGIN, NONCE, None).unwrap(),
    "82764f70656e4944345650444341504948616e646f7665725820e48024b0176fb03cc98f56631176b50ca5ac125004466e6d49c12fa47c7f11d6",
    "g_b2gnZPcGVuSUQ0VlBEQ0FQSUhhbmRvdmVyWCDkgCSwF2-wPMmPVmMRdrUMpawSUARGbm1JwS-kfH8R1g"
)]
#[case::iso_dc_api(
    Handover::iso_dc_api("ZW5jcnlwdGlvbkluZm8", ORIGIN).unwrap(),
    "826564636170695820785382b6c4b932cc1aac004bb73b40545ed78f900bcfddfe6b70fcc9e742833e",
    "g_b2gmVkY2FwaVggeFOCtsS5MswarABLtztAVF7Xj5ALz93-a3D8yedCgz4"
)]
fn handover_vector(
    #[case] handover: Handover,
    #[case] handover_hex: &str,
    #[case] transcript_base64url: &str,
) {
    assert_eq!(hex::encode(handover.to_bytes().unwrap()), handover_hex);

    let transcript = SessionTranscript::remote(handover.clone());
    assert_eq!(transcript.to_base64url().unwrap(), transcript_base64url);

    let decoded = SessionTranscript::from_base64url(transcript_base64url).unwrap();
    assert_eq!(decoded, transcript);
}

#[test]
fn qr_and_nfc_handovers() {
    assert_eq!(hex::encode(Handover::Qr.to_bytes().unwrap()), "f6");
    let nfc = Handover::Nfc {
        handover_select: vec![0xd1, 0x02],
        handover_request: None,
    };
    assert_eq!(hex::encode(nfc.to_bytes().unwrap()), "8242d102f6");
}

const PUBLISHED_NONCE: &str = "exc7gBkxjx1rdc9udRrveKvSsJIq80avlXeLHhGwqtA";
const PUBLISHED_JWK_THUMBPRINT: &str =
    "4283ec927ae0f208daaa2d026a814f2b22dca52cf85ffa8f3f8626c6bd669047";

#[test]
fn oid4vp_published_example() {
    let thumbprint = hex::decode(PUBLISHED_JWK_THUMBPRINT).unwrap();
    let info = Handover::oid4vp_info(
        "x509_san_dns:example.com",
        PUBLISHED_NONCE,
        Some(&thumbprint),
        "https://example.com/response",
    );
    assert_eq!(
        hex::encode(cbor::to_vec(&info).unwrap()),
        "847818783530395f73616e5f646e733a6578616d706c652e636f6d782b6578633767426b786a78317264\
         63397564527276654b7653734a4971383061766c58654c4868477771744158204283ec927ae0f208daaa\
         2d026a814f2b22dca52cf85ffa8f3f8626c6bd669047781c68747470733a2f2f6578616d706c652e636f\
         6d2f726573706f6e7365"
    );

    let handover = Handover::oid4vp(
        "x509_san_dns:example.com",
        PUBLISHED_NONCE,
        Some(&thumbprint),
        "https://example.com/response",
    )
    .unwrap();
    let Handover::OpenId4Vp { info_hash } = &handover else {
        panic!("expected an OpenID4VP handover")
    };
    assert_eq!(
        hex::encode(info_hash),
        "048bc053c00442af9b8eed494cefdd9d95240d254b046b11b68013722aad38ac"
    );
    assert_eq!(
        hex::encode(handover.to_bytes().unwrap()),
        "82714f70656e494434565048616e646f7665725820\
         048bc053c00442af9b8eed494cefdd9d95240d254b046b11b68013722aad38ac"
    );
}

#[test]
fn oid4vp_dc_api_published_example() {
    let thumbprint = hex::decode(PUBLISHED_JWK_THUMBPRINT).unwrap();
    let info =
        Handover::oid4vp_dc_api_info("https://example.com", PUBLISHED_NONCE, Some(&thumbprint));
    assert_eq!(
        hex::encode(cbor::to_vec(&info).unwrap()),
        "837368747470733a2f2f6578616d706c652e636f6d782b6578633767426b786a78317264633975645272\
         76654b7653734a4971383061766c58654c4868477771744158204283ec927ae0f208daaa2d026a814f2b\
         22dca52cf85ffa8f3f8626c6bd669047"
    );

    let handover =
        Handover::oid4vp_dc_api("https://example.com", PUBLISHED_NONCE, Some(&thumbprint)).unwrap();
    let Handover::OpenId4VpDcApi { info_hash } = &handover else {
        panic!("expected an OpenID4VP DC API handover")
    };
    assert_eq!(
        hex::encode(info_hash),
        "fbece366f4212f9762c74cfdbf83b8c69e371d5d68cea09cb4c48ca6daab761a"
    );
}
