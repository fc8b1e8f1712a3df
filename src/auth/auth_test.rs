use crate::auth::TokenEnvelope;
use crate::AccessTokenProvider;
use crate::EditorConfig;
use crate::OAuth2TokenProvider;

#[tokio::test]
async fn test_access_token_without_credentials_is_none() {
    let provider = OAuth2TokenProvider::new(&EditorConfig::default());

    let token = provider.access_token().await.expect("should not error");

    assert_eq!(token, None);
}

#[tokio::test]
async fn test_access_token_missing_secret_is_none() {
    let editor = EditorConfig {
        client_id: "client-1".to_string(),
        ..EditorConfig::default()
    };
    let provider = OAuth2TokenProvider::new(&editor);

    assert_eq!(provider.access_token().await.unwrap(), None);
}

#[test]
fn test_token_envelope_decoding() {
    let body = r#"{"data":{"accessToken":"abc-123"}}"#;

    let envelope: TokenEnvelope = serde_json::from_str(body).expect("valid envelope");

    assert_eq!(envelope.data.access_token, "abc-123");
}

#[test]
fn test_token_envelope_rejects_missing_token() {
    let body = r#"{"data":{}}"#;

    assert!(serde_json::from_str::<TokenEnvelope>(body).is_err());
}
