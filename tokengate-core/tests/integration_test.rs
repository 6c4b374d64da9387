//! Integration tests for tokengate-core

use std::sync::Arc;
use tokengate_core::*;

struct Lookup {
    session: Option<Session>,
    new: bool,
}

impl Lookup {
    fn existing(id: &str) -> Self {
        Self {
            session: Some(Session::new(id)),
            new: false,
        }
    }
}

impl SessionLookup for Lookup {
    fn current(&self) -> std::result::Result<Option<Session>, SessionLookupError> {
        Ok(self.session.clone())
    }

    fn is_new(&self, _session: &Session) -> bool {
        self.new
    }
}

fn submit(gate: &RequestGate, sessions: &Lookup, request: &HttpRequest) -> GateDecision {
    let mut response = HttpResponse::new();
    gate.handle(
        request,
        sessions,
        &mut response,
        |_, sink| sink.write_body(b"ok"),
        |_, _, _| Ok(()),
    )
    .unwrap()
}

#[test]
fn test_config_defaults() {
    let config = GuardConfig::default();

    assert!(config.enabled);
    assert!(config.validate_when_no_session_exists);
    assert!(!config.use_new_token_landing_page);
    assert_eq!(config.token_scope, TokenScope::Global);
    assert_eq!(config.rotation_strictness, RotationStrictness::IfAbsent);
    assert_eq!(config.token_locations, vec![TokenLocation::Header, TokenLocation::Parameter]);
    assert_eq!(config.token_name, "csrf_token");
    assert_eq!(config.header_name, "X-CSRF-Token");
    assert_eq!(config.token_length, DEFAULT_TOKEN_LENGTH);
}

#[test]
fn test_gate_from_toml_config() {
    let config = GuardConfig::from_toml_str(
        r#"
        token_scope = "per_page"
        rotation_strictness = "always"
        header_name = "X-XSRF"
        unprotected_pages = ["/public/*", "*.css"]
        "#,
    )
    .unwrap();
    let gate = RequestGate::new(config).unwrap();
    let sessions = Lookup::existing("s1");

    assert!(!gate.is_protected_page("/public/about"));
    assert!(!gate.is_protected_page("/assets/site.css"));
    assert!(gate.is_protected_page("/transfer"));

    let token = gate.token_for("s1", "/transfer");
    let request = HttpRequest::post("/transfer").with_header("X-XSRF", token.clone());
    assert_eq!(submit(&gate, &sessions, &request), GateDecision::Allow);

    // Consumed by rotation.
    assert_eq!(
        submit(&gate, &sessions, &request),
        GateDecision::Reject(RejectReason::TokenMismatch)
    );
}

#[test]
fn test_gate_from_config_file() {
    let path = std::env::temp_dir().join(format!("tokengate-it-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"masking": true, "token_length": 24}"#).unwrap();

    let config = GuardConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let gate = RequestGate::new(config).unwrap();
    assert!(gate.validator().masking());

    let sessions = Lookup::existing("s1");
    let token = gate.token_for("s1", "/");
    let request = HttpRequest::post("/transfer").with_form(&[("csrf_token", token.as_str())]);
    assert_eq!(submit(&gate, &sessions, &request), GateDecision::Allow);
}

#[test]
fn test_env_overrides() {
    let config = GuardConfig::default()
        .apply_vars(
            "TOKENGATE_",
            [
                ("TOKENGATE_TOKEN_SCOPE", "per_page"),
                ("TOKENGATE_ROTATE_ON_REJECT", "true"),
                ("OTHER_TOKEN_NAME", "ignored"),
            ],
        )
        .unwrap();

    assert_eq!(config.token_scope, TokenScope::PerPage);
    assert!(config.rotate_on_reject);
    assert_eq!(config.token_name, "csrf_token");
}

#[test]
fn test_custom_store_is_used() {
    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new(MIN_TOKEN_LENGTH));
    let gate = RequestGate::with_store(GuardConfig::default(), Arc::clone(&store)).unwrap();

    gate.token_for("s1", "/");
    assert_eq!(store.token_count("s1"), 1);
}

#[test]
fn test_exempt_methods_configurable() {
    let gate = RequestGate::new(
        GuardConfig::default().with_exempt_methods(vec!["GET".to_string(), "PROPFIND".to_string()]),
    )
    .unwrap();
    let sessions = Lookup::existing("s1");

    let propfind = HttpRequest::new(http::Method::from_bytes(b"PROPFIND").unwrap(), "/dav");
    assert_eq!(submit(&gate, &sessions, &propfind), GateDecision::Allow);

    let head = HttpRequest::new(http::Method::HEAD, "/dav");
    assert_eq!(
        submit(&gate, &sessions, &head),
        GateDecision::Reject(RejectReason::MissingToken)
    );
}

#[test]
fn test_json_body_token() {
    let gate = RequestGate::new(GuardConfig::default()).unwrap();
    let sessions = Lookup::existing("s1");
    let token = gate.token_for("s1", "/");

    let body = format!(r#"{{"csrf_token":"{token}","amount":"10"}}"#);
    let request = HttpRequest::post("/api/transfer").with_body("application/json", body);
    assert_eq!(submit(&gate, &sessions, &request), GateDecision::Allow);
}

#[test]
fn test_header_only_locations() {
    let gate =
        RequestGate::new(GuardConfig::default().with_token_locations(vec![TokenLocation::Header])).unwrap();
    let sessions = Lookup::existing("s1");
    let token = gate.token_for("s1", "/");

    let request = HttpRequest::post("/transfer").with_form(&[("csrf_token", token.as_str())]);
    assert_eq!(
        submit(&gate, &sessions, &request),
        GateDecision::Reject(RejectReason::MissingToken)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_token() {
    let gate = Arc::new(RequestGate::new(GuardConfig::default()).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let sessions = Lookup::existing("shared");
                submit(&gate, &sessions, &HttpRequest::get("/account"));
                gate.token_for("shared", "/")
            })
        })
        .collect();

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap());
    }

    tokens.dedup();
    assert_eq!(tokens.len(), 1);
    assert_eq!(gate.store().token_count("shared"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_accepts_each_token_once() {
    let gate = Arc::new(
        RequestGate::new(GuardConfig::default().with_rotation_strictness(RotationStrictness::Always))
            .unwrap(),
    );
    let token = gate.token_for("shared", "/");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let token = token.clone();
            tokio::spawn(async move {
                let sessions = Lookup::existing("shared");
                let request = HttpRequest::post("/transfer").with_header("X-CSRF-Token", token);
                submit(&gate, &sessions, &request)
            })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().is_allowed() {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 1);
    assert_ne!(gate.store().get("shared", &ActionKey::Session).unwrap().value, token);
}
