//! 会话管理：启动探测、登录 / 注册 / 登出流转、会话过期的全局回退。

mod support;

use std::sync::Arc;

use filebox_desktop::api::files;
use filebox_desktop::{
    ApiClient, ClientError, FileManager, LoginCredentials, MemoryTokenStore, RegisterCredentials,
    SessionManager, SessionState, TokenStore,
};
use support::{StubResponse, StubServer};

const ME_BODY: &str = r#"{"id":7,"email":"user@example.com","date_joined":"2026-01-02T03:04:05Z"}"#;

fn session_with(server: &StubServer, store: Arc<MemoryTokenStore>) -> (Arc<ApiClient>, SessionManager) {
    let api = Arc::new(ApiClient::new(&server.url(), store).unwrap());
    let session = SessionManager::new(Arc::clone(&api));
    (api, session)
}

#[test]
fn initialize_without_tokens_goes_unauthenticated_offline() {
    let server = StubServer::start();
    let (_, session) = session_with(&server, Arc::new(MemoryTokenStore::new()));

    assert_eq!(session.state(), SessionState::Unknown);
    assert_eq!(session.initialize().unwrap(), SessionState::Unauthenticated);
    assert!(!session.is_authenticated());
    assert_eq!(server.total_hits(), 0);
}

#[test]
fn initialize_with_valid_token_resolves_principal() {
    let server = StubServer::start();
    server.route("GET", "/auth/me/", |request| {
        if request.bearer() == Some("good") {
            StubResponse::json(200, ME_BODY)
        } else {
            StubResponse::json(401, r#"{"detail":"token not valid"}"#)
        }
    });

    let store = Arc::new(MemoryTokenStore::new());
    store.set("good", "r1").unwrap();
    let (_, session) = session_with(&server, store);

    assert_eq!(session.initialize().unwrap(), SessionState::Authenticated);
    assert!(session.is_authenticated());
    assert_eq!(session.current_user().unwrap().email, "user@example.com");
}

#[test]
fn initialize_with_dead_tokens_clears_them() {
    let server = StubServer::start();
    server.route("GET", "/auth/me/", |_| {
        StubResponse::json(401, r#"{"detail":"token not valid"}"#)
    });
    server.route("POST", "/auth/token/refresh/", |_| {
        StubResponse::json(401, r#"{"detail":"token is blacklisted"}"#)
    });

    let store = Arc::new(MemoryTokenStore::new());
    store.set("dead", "dead-refresh").unwrap();
    let (_, session) = session_with(&server, Arc::clone(&store));

    assert_eq!(session.initialize().unwrap(), SessionState::Unauthenticated);
    assert!(!session.is_authenticated());
    assert!(store.access().unwrap().is_none());
    assert!(store.refresh().unwrap().is_none());
}

#[test]
fn login_stores_tokens_and_resolves_principal() {
    let server = StubServer::start();
    server.route("POST", "/auth/token/", |request| {
        let body = request.body_json();
        assert_eq!(body["email"], "user@example.com");
        assert_eq!(body["password"], "hunter2");
        StubResponse::json(200, r#"{"access":"a1","refresh":"r1"}"#)
    });
    server.route("GET", "/auth/me/", |request| {
        if request.bearer() == Some("a1") {
            StubResponse::json(200, ME_BODY)
        } else {
            StubResponse::json(401, r#"{"detail":"token not valid"}"#)
        }
    });

    let store = Arc::new(MemoryTokenStore::new());
    let (_, session) = session_with(&server, Arc::clone(&store));

    let principal = session
        .login(&LoginCredentials {
            email: "user@example.com".into(),
            password: "hunter2".into(),
        })
        .unwrap();

    assert_eq!(principal.id, 7);
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(store.access().unwrap().as_deref(), Some("a1"));
    assert_eq!(store.refresh().unwrap().as_deref(), Some("r1"));
}

#[test]
fn rejected_login_surfaces_the_server_message_verbatim() {
    let server = StubServer::start();
    server.route("POST", "/auth/token/", |_| {
        StubResponse::json(
            401,
            r#"{"detail":"No active account found with the given credentials"}"#,
        )
    });

    let (_, session) = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let err = session
        .login(&LoginCredentials {
            email: "user@example.com".into(),
            password: "wrong".into(),
        })
        .unwrap_err();

    match err {
        ClientError::Authentication(message) => {
            assert_eq!(message, "No active account found with the given credentials");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(!session.is_authenticated());
}

#[test]
fn register_creates_account_and_signs_in() {
    let server = StubServer::start();
    server.route("POST", "/auth/register/", |request| {
        let body = request.body_json();
        assert_eq!(body["password"], body["password_confirm"]);
        StubResponse::json(
            201,
            &format!(r#"{{"user":{ME_BODY},"access":"a1","refresh":"r1"}}"#),
        )
    });
    server.route("GET", "/auth/me/", |_| StubResponse::json(200, ME_BODY));

    let (_, session) = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let principal = session
        .register(&RegisterCredentials {
            email: "user@example.com".into(),
            password: "hunter2hunter2".into(),
            password_confirm: "hunter2hunter2".into(),
        })
        .unwrap();

    assert_eq!(principal.email, "user@example.com");
    assert!(session.is_authenticated());
}

#[test]
fn duplicate_registration_error_is_surfaced_per_field() {
    let server = StubServer::start();
    server.route("POST", "/auth/register/", |_| {
        StubResponse::json(400, r#"{"email":["user with this email already exists."]}"#)
    });

    let (_, session) = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let err = session
        .register(&RegisterCredentials {
            email: "user@example.com".into(),
            password: "hunter2hunter2".into(),
            password_confirm: "hunter2hunter2".into(),
        })
        .unwrap_err();

    match err {
        ClientError::Authentication(message) => {
            assert!(message.contains("already exists"), "got: {message}");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[test]
fn logout_blocks_further_operations_without_network() {
    let server = StubServer::start();
    server.route("GET", "/auth/me/", |_| StubResponse::json(200, ME_BODY));

    let store = Arc::new(MemoryTokenStore::new());
    store.set("good", "r1").unwrap();
    let (api, session) = session_with(&server, store);
    session.initialize().unwrap();
    assert!(session.is_authenticated());
    let baseline = server.total_hits();

    session.logout().unwrap();
    assert!(!session.is_authenticated());
    assert_eq!(session.state(), SessionState::Unauthenticated);

    let err = files::list_files(&api, 1).unwrap_err();
    assert!(matches!(err, ClientError::Unauthenticated), "got {err:?}");
    // 登出后的操作不产生任何网络请求。
    assert_eq!(server.total_hits(), baseline);
}

#[test]
fn failed_refresh_drops_the_session_globally() {
    let server = StubServer::start();
    server.route("GET", "/auth/me/", |request| {
        if request.bearer() == Some("good") {
            StubResponse::json(200, ME_BODY)
        } else {
            StubResponse::json(401, r#"{"detail":"token not valid"}"#)
        }
    });
    // 列表端点始终拒绝，逼出刷新；刷新也失败。
    server.route("GET", "/files/", |_| {
        StubResponse::json(401, r#"{"detail":"token not valid"}"#)
    });
    server.route("POST", "/auth/token/refresh/", |_| {
        StubResponse::json(401, r#"{"detail":"token is blacklisted"}"#)
    });

    let store = Arc::new(MemoryTokenStore::new());
    store.set("good", "r1").unwrap();
    let (api, session) = session_with(&server, Arc::clone(&store));
    session.initialize().unwrap();
    assert!(session.is_authenticated());

    let fm = FileManager::new(Arc::clone(&api));
    let err = fm.list_files(1).unwrap_err();

    assert!(matches!(err, ClientError::Unauthenticated), "got {err:?}");
    assert!(!session.is_authenticated());
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(store.access().unwrap().is_none());
}
