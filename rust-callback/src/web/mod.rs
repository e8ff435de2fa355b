//! Web server module: the axum surface in front of [`CallbackEndpoint`].
//!
//! - `GET /health`
//! - `GET|POST <callback path>`: platform handshake and deliveries
//! - `POST /admin/keys/rotate`: only when an admin token and a key ring exist
//!
//! [`CallbackEndpoint`]: crate::endpoint::CallbackEndpoint

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{callback, health, rotate_key, AppState, HealthResponse, RotateResponse};

use crate::Config;

pub const ROTATE_KEY_PATH: &str = "/admin/keys/rotate";

/// Build the application router.
pub fn router(state: AppState, config: &Config) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route(&config.callback_path, get(callback).post(callback));

    if state.admin_token.is_some() && state.keyring.is_some() {
        app = app.route(ROTATE_KEY_PATH, post(rotate_key));
    }

    app.layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use tower::ServiceExt;

    use super::*;
    use crate::crypto::{encrypt, handshake_signature, message_signature, AesKey};
    use crate::endpoint::InvalidRequestMode;
    use crate::message::EncryptedEnvelope;

    const KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";
    const NEXT_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const ORIGINAL_ID: &str = "gh_0123456789ab";
    const APP_ID: &str = "wxabcdef0123456789";

    fn config() -> Config {
        Config {
            port: 0,
            token: Some("abc".to_string()),
            app_id: Some(APP_ID.to_string()),
            original_id: Some(ORIGINAL_ID.to_string()),
            encoding_aes_key: Some(KEY.to_string()),
            previous_encoding_aes_key: None,
            callback_path: "/wx/callback".to_string(),
            invalid_request_mode: InvalidRequestMode::Silent,
            max_body_bytes: 64 * 1024,
            scratch_pool_size: 8,
            admin_token: Some("admin-secret".to_string()),
            welcome_text: Some("welcome".to_string()),
            echo_text: true,
        }
    }

    fn app(config: &Config) -> (Router, AppState) {
        let state = AppState::from_config(config).unwrap();
        (router(state.clone(), config), state)
    }

    fn signed_query(timestamp: &str, nonce: &str) -> String {
        format!(
            "signature={}&timestamp={}&nonce={}",
            handshake_signature("abc", timestamp, nonce),
            timestamp,
            nonce
        )
    }

    fn text_message(content: &str) -> String {
        format!(
            "<xml><ToUserName><![CDATA[{}]]></ToUserName>\
             <FromUserName><![CDATA[oUser]]></FromUserName>\
             <CreateTime>1409304348</CreateTime>\
             <MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[{}]]></Content>\
             <MsgId>1</MsgId></xml>",
            ORIGINAL_ID, content
        )
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(&config());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_handshake() {
        let (app, _) = app(&config());
        let uri = format!(
            "/wx/callback?{}&echostr=5837397520665",
            signed_query("1409304348", "xxxxxx")
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "5837397520665");
    }

    #[tokio::test]
    async fn test_bad_handshake_is_silent() {
        let (app, _) = app(&config());
        let uri = "/wx/callback?signature=bad&timestamp=1&nonce=2&echostr=challenge";
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_malformed_query_is_silent() {
        let (app, _) = app(&config());
        let uri = "/wx/callback?signature=a&signature=b&timestamp=1&nonce=2&echostr=x";
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_malformed_query_rejected_in_reject_mode() {
        let mut config = config();
        config.invalid_request_mode = InvalidRequestMode::Reject;
        let (app, _) = app(&config);
        let uri = "/wx/callback?signature=a&signature=b&timestamp=1&nonce=2&echostr=x";
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_bad_handshake_rejected_in_reject_mode() {
        let mut config = config();
        config.invalid_request_mode = InvalidRequestMode::Reject;
        let (app, _) = app(&config);
        let uri = "/wx/callback?signature=bad&timestamp=1&nonce=2&echostr=challenge";
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_plain_delivery_echoes_text() {
        let (app, _) = app(&config());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/wx/callback?{}", signed_query("1409304348", "xxxxxx")))
                    .body(Body::from(text_message("hello")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/xml; charset=utf-8"
        );
        assert!(body_string(response)
            .await
            .contains("<Content><![CDATA[hello]]></Content>"));
    }

    #[tokio::test]
    async fn test_secure_delivery_round_trip() {
        let (app, _) = app(&config());
        let key = AesKey::from_encoding_aes_key(KEY).unwrap();
        let ciphertext = encrypt(&[9u8; 16], text_message("ping").as_bytes(), APP_ID, key.as_bytes()).unwrap();
        let encrypted = STANDARD.encode(ciphertext);
        let signature = message_signature("abc", "1409304348", "xxxxxx", &encrypted);
        let uri = format!(
            "/wx/callback?timestamp=1409304348&nonce=xxxxxx&encrypt_type=aes&msg_signature={}",
            signature
        );
        let body = format!(
            "<xml><ToUserName><![CDATA[{}]]></ToUserName><Encrypt><![CDATA[{}]]></Encrypt></xml>",
            ORIGINAL_ID, encrypted
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let envelope = EncryptedEnvelope::from_xml(body_string(response).await.as_bytes()).unwrap();
        assert_eq!(
            envelope.msg_signature,
            message_signature("abc", "1409304348", "xxxxxx", &envelope.encrypt)
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let mut config = config();
        config.max_body_bytes = 16;
        let (app, _) = app(&config);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/wx/callback?{}", signed_query("1", "2")))
                    .body(Body::from(text_message("this body is too long")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_rotate_key() {
        let config = config();
        let (app, state) = app(&config);
        let before = state.keyring.as_ref().unwrap().current();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ROTATE_KEY_PATH)
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::from(NEXT_KEY))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ROTATE_KEY_PATH)
                    .header(header::AUTHORIZATION, "Bearer admin-secret")
                    .body(Body::from(NEXT_KEY))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let keyring = state.keyring.as_ref().unwrap();
        assert_eq!(keyring.current(), AesKey::from_encoding_aes_key(NEXT_KEY).unwrap());
        assert_eq!(keyring.previous(), Some(before));
    }

    #[tokio::test]
    async fn test_rotate_route_absent_without_admin_token() {
        let mut config = config();
        config.admin_token = None;
        let (app, _) = app(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ROTATE_KEY_PATH)
                    .body(Body::from(NEXT_KEY))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
