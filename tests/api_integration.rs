//! Integration tests for the HTTP surface.
//!
//! Each test spins up the real router on a random port with fake provider
//! implementations and drives it over HTTP with reqwest.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use callflow::api::{self, ApiState};
use callflow::assets::AssetResolver;
use callflow::config::ServerConfig;
use callflow::dispatch::{CallDispatcher, CallPlacement, SmsPlacement};
use callflow::error::{DispatchError, SynthesisError};
use callflow::scripts::SpeechSynthesizer;
use callflow::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const SECRET: &str = "s3cret";
const PUBLIC_URL: &str = "https://calls.example.com";
const AUDIO: &[u8] = b"0123456789abcdefghij";
const DEFAULT_AUDIO: &[u8] = b"default-prompt";
const SYNTH_AUDIO: &[u8] = b"ID3-synthesized";

/// Records every dispatch and answers with a fixed placement.
#[derive(Default)]
struct FakeDispatcher {
    calls: Mutex<Vec<(String, String)>>,
    sms: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CallDispatcher for FakeDispatcher {
    fn name(&self) -> &str {
        "fake"
    }

    async fn place_call(
        &self,
        destination: &str,
        callback_key: &str,
    ) -> Result<CallPlacement, DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push((destination.to_string(), callback_key.to_string()));
        Ok(CallPlacement {
            sid: "CA123".into(),
            to: destination.into(),
            from: "+15550001111".into(),
            status: "queued".into(),
        })
    }

    async fn send_sms(&self, destination: &str, body: &str) -> Result<SmsPlacement, DispatchError> {
        self.sms
            .lock()
            .unwrap()
            .push((destination.to_string(), body.to_string()));
        Ok(SmsPlacement {
            sid: "SM123".into(),
            to: destination.into(),
            from: "+15550001111".into(),
            status: "queued".into(),
        })
    }
}

struct FakeSynth;

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn name(&self) -> &str {
        "fake"
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SynthesisError> {
        Ok(SYNTH_AUDIO.to_vec())
    }
}

struct Harness {
    base: String,
    client: reqwest::Client,
    dispatcher: Arc<FakeDispatcher>,
    dir: tempfile::TempDir,
}

impl Harness {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn voice(&self, query: &str) -> String {
        let resp = self
            .client
            .post(format!("{}/voice/{SECRET}?{query}", self.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/xml");
        resp.text().await.unwrap()
    }
}

fn write_asset(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Start the router on a random port with paypal and default prompts on disk.
async fn start_server() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "en/paypal/ask-paypal.mp3", AUDIO);
    write_asset(dir.path(), "en/default/ask-default.mp3", DEFAULT_AUDIO);

    let config = ServerConfig {
        public_url: PUBLIC_URL.into(),
        api_password: SecretString::from(SECRET),
        port: 0,
        db_path: dir.path().join("unused.db"),
        voice_dir: dir.path().to_path_buf(),
        max_prompt_attempts: 5,
        log_dir: None,
    };

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let assets = Arc::new(AssetResolver::new(dir.path()));
    let dispatcher = Arc::new(FakeDispatcher::default());
    let synth: Arc<dyn SpeechSynthesizer> = Arc::new(FakeSynth);
    let state = ApiState::new(
        &config,
        db,
        assets,
        Some(synth),
        Some(dispatcher.clone() as Arc<dyn CallDispatcher>),
    );
    let app = api::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Harness {
        base: format!("http://127.0.0.1:{port}"),
        client: reqwest::Client::new(),
        dispatcher,
        dir,
    }
}

// ── Streaming ────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_serves_full_file_and_ranges() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;

        let full = h
            .client
            .get(format!("{}/stream/paypal", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(full.status(), 200);
        assert_eq!(full.headers()["content-length"], "20");
        assert_eq!(full.headers()["content-type"], "audio/mpeg");
        assert_eq!(full.bytes().await.unwrap().as_ref(), AUDIO);

        let partial = h
            .client
            .get(format!("{}/stream/PayPal", h.base))
            .header("Range", "bytes=5-9")
            .send()
            .await
            .unwrap();
        assert_eq!(partial.status(), 206);
        assert_eq!(partial.headers()["content-range"], "bytes 5-9/20");
        assert_eq!(partial.headers()["accept-ranges"], "bytes");
        assert_eq!(partial.headers()["content-length"], "5");
        assert_eq!(partial.bytes().await.unwrap().as_ref(), &AUDIO[5..=9]);

        let open_ended = h
            .client
            .get(format!("{}/stream/paypal", h.base))
            .header("Range", "bytes=15-")
            .send()
            .await
            .unwrap();
        assert_eq!(open_ended.status(), 206);
        assert_eq!(open_ended.headers()["content-range"], "bytes 15-19/20");

        let malformed = h
            .client
            .get(format!("{}/stream/paypal", h.base))
            .header("Range", "pages=1-2")
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), 200);
        assert_eq!(malformed.bytes().await.unwrap().as_ref(), AUDIO);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stream_missing_file_is_404() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let resp = h
            .client
            .get(format!("{}/stream/amazon", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert!(resp.bytes().await.unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Call flow ────────────────────────────────────────────────────────

#[tokio::test]
async fn voice_unknown_key_plays_default_prompt() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let xml = h.voice("service=nosuchbrand").await;

        assert!(xml.contains("<Gather input=\"dtmf\" timeout=\"10\" numDigits=\"6\""));
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/default</Play>")));
        assert!(xml.contains("<Redirect method=\"POST\">"));
        assert!(xml.contains("attempt=1"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn voice_builtin_key_plays_its_prompt() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let xml = h.voice("service=paypal&attempt=2").await;
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/paypal</Play>")));
        assert!(xml.contains(&format!("{PUBLIC_URL}/status/{SECRET}?service=paypal")));
        assert!(xml.contains("attempt=3"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn voice_stops_at_attempt_bound() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let xml = h.voice("service=paypal&attempt=5").await;
        assert!(!xml.contains("<Gather"));
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/end</Play>")));
        assert!(xml.contains("<Hangup/>"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn voice_rejects_wrong_secret() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let resp = h
            .client
            .post(format!("{}/voice/wrong?service=paypal", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

// ── Dispatch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn call_with_service_dispatches_once() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let (status, body) = h
            .post(
                "/call",
                json!({ "to": "+33612345678", "service": "paypal", "password": SECRET }),
            )
            .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["sid"], "CA123");
        assert_eq!(body["status"], "queued");
        assert_eq!(
            *h.dispatcher.calls.lock().unwrap(),
            vec![("+33612345678".to_string(), "paypal".to_string())]
        );

        let (status, body) = h
            .post("/get", json!({ "sid": "CA123", "password": SECRET }))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["call"]["service"], "paypal");
        assert_eq!(body["call"]["to"], "+33612345678");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn call_requires_password_and_known_target() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;

        let (status, body) = h
            .post("/call", json!({ "to": "+33612345678", "service": "paypal" }))
            .await;
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);

        let (status, _) = h
            .post(
                "/call",
                json!({ "to": "+33612345678", "service": "myspace", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 400);

        let (status, _) = h
            .post(
                "/call",
                json!({ "to": "+33612345678", "scriptName": "ghost", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 404);

        let (status, _) = h
            .post("/call", json!({ "to": "12", "service": "paypal", "password": SECRET }))
            .await;
        assert_eq!(status, 400);

        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn status_callback_records_code_and_hangs_up() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        h.post(
            "/call",
            json!({ "to": "+33612345678", "service": "paypal", "password": SECRET }),
        )
        .await;

        let resp = h
            .client
            .post(format!("{}/status/{SECRET}?service=paypal", h.base))
            .form(&[("CallSid", "CA123"), ("Digits", "123456"), ("CallStatus", "in-progress")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let xml = resp.text().await.unwrap();
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/end</Play>")));
        assert!(xml.contains("<Hangup/>"));

        let (_, body) = h
            .post("/get", json!({ "sid": "CA123", "password": SECRET }))
            .await;
        assert_eq!(body["call"]["code"], "123456");
        assert_eq!(body["call"]["status"], "in-progress");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sms_with_script_uses_its_message() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let (status, _) = h
            .post(
                "/script",
                json!({ "name": "notice", "type": "sms", "message": "Your code expires soon", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 200);

        let (status, body) = h
            .post(
                "/sms",
                json!({ "to": "+33612345678", "scriptName": "notice", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["sid"], "SM123");
        assert_eq!(
            *h.dispatcher.sms.lock().unwrap(),
            vec![("+33612345678".to_string(), "Your code expires soon".to_string())]
        );
    })
    .await
    .expect("test timed out");
}

// ── Scripts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn call_script_lifecycle() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;

        let (status, body) = h
            .post(
                "/script",
                json!({ "name": "promo", "type": "call", "message": "Hello", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["script"]["name"], "promo");
        assert_eq!(body["script"]["type"], "call");
        assert_eq!(body["script"]["audio_path"], "en/promo/ask-promo.mp3");

        // Duplicate names conflict case-insensitively; the original is kept.
        let (status, body) = h
            .post(
                "/script",
                json!({ "name": "PROMO", "type": "sms", "message": "Other", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 409);
        assert_eq!(body["success"], false);

        let (_, body) = h
            .post("/script/get", json!({ "name": "promo", "password": SECRET }))
            .await;
        assert_eq!(body["script"]["message"], "Hello");

        let (_, body) = h.post("/scripts", json!({ "password": SECRET })).await;
        assert_eq!(body["scripts"].as_array().unwrap().len(), 1);

        let xml = h.voice("service=promo").await;
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/promo</Play>")));

        for key in ["promo", "script_promo"] {
            let audio = h
                .client
                .get(format!("{}/stream/{key}", h.base))
                .send()
                .await
                .unwrap();
            assert_eq!(audio.status(), 200);
            assert_eq!(audio.bytes().await.unwrap().as_ref(), SYNTH_AUDIO);
        }

        let (status, _) = h
            .post("/script/delete", json!({ "name": "promo", "password": SECRET }))
            .await;
        assert_eq!(status, 200);
        assert!(!h.dir.path().join("en/promo/ask-promo.mp3").exists());

        let (status, _) = h
            .post("/script/get", json!({ "name": "promo", "password": SECRET }))
            .await;
        assert_eq!(status, 404);

        let xml = h.voice("service=promo").await;
        assert!(xml.contains(&format!("<Play>{PUBLIC_URL}/stream/default</Play>")));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn script_validation_errors() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;

        let (status, _) = h
            .post(
                "/script",
                json!({ "name": "paypal", "type": "call", "message": "Hi", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 400);

        let (status, _) = h
            .post(
                "/script",
                json!({ "name": "promo", "type": "fax", "message": "Hi", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 400);

        let (status, _) = h
            .post(
                "/script",
                json!({ "name": "promo", "type": "call", "message": "  ", "password": SECRET }),
            )
            .await;
        assert_eq!(status, 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_route_is_404() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server().await;
        let resp = h
            .client
            .get(format!("{}/nope", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}
