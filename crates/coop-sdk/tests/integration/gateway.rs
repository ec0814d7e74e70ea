use std::time::Duration;

use assert_matches::assert_matches;
use coop_sdk::{
    config::RequestConfig, HttpError, RefreshTokenError, Request, SessionChange, SessionStatus,
    StateStoreExt,
};
use coop_sdk_test::test_json;
use futures_util::future::join_all;
use http::StatusCode;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast::error::TryRecvError;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request as MockRequest, ResponseTemplate,
};

use crate::{
    admin, logged_in_client_with_server, member, mock_admin_login, mock_refresh_token,
    test_client_builder,
};

async fn mock_loans(server: &MockServer, access_token: &str, status: u16, times: u64) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(&*test_json::LOANS)
    } else {
        ResponseTemplate::new(status).set_body_json(&*test_json::SESSION_EXPIRED)
    };

    Mock::given(method("GET"))
        .and(path("/api/loan"))
        .and(header("authorization", format!("Bearer {access_token}").as_str()))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_then_retry_succeeds() {
    let (client, server, navigator) = logged_in_client_with_server().await;
    let mut session_changes = client.subscribe_to_session_changes();

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_loans(&server, test_json::REFRESHED_ACCESS_TOKEN, 200, 1).await;
    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 1).await;

    let loans: JsonValue = client.get_json("/api/loan").await.unwrap();
    assert_eq!(loans, *test_json::LOANS);

    let state = client.session().get();
    assert_eq!(state.access_token(), Some(test_json::REFRESHED_ACCESS_TOKEN));
    assert_eq!(state.user(), Some(&member()));

    let persisted = client.state_store().load_session().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, test_json::REFRESHED_ACCESS_TOKEN);
    assert_eq!(persisted.user, member());

    assert_eq!(session_changes.try_recv(), Ok(SessionChange::TokensRefreshed));
    assert_eq!(session_changes.try_recv(), Err(TryRecvError::Empty));
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn test_single_retry_on_persistent_unauthorized() {
    let (client, server, navigator) = logged_in_client_with_server().await;

    Mock::given(method("GET"))
        .and(path("/api/loan"))
        .respond_with(ResponseTemplate::new(401).set_body_json(&*test_json::SESSION_EXPIRED))
        .expect(2)
        .mount(&server)
        .await;
    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 1).await;

    let error = client.send(Request::get("/api/loan"), None).await.unwrap_err();
    assert!(error.is_unauthorized());
    assert_eq!(error.as_api_error().unwrap().message.as_deref(), Some("Token expired"));

    // The refresh itself worked, so the session stays.
    assert_eq!(client.session().access_token().as_deref(), Some(test_json::REFRESHED_ACCESS_TOKEN));
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn test_refresh_failure_invalidates_session() {
    let (client, server, navigator) = logged_in_client_with_server().await;
    let mut session_changes = client.subscribe_to_session_changes();

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_refresh_token(&server, 500, &*test_json::EMPTY, 1).await;

    let error = client.send(Request::get("/api/loan"), None).await.unwrap_err();
    assert_matches!(
        error,
        HttpError::RefreshToken(RefreshTokenError::Rejected { status })
            if status == StatusCode::INTERNAL_SERVER_ERROR
    );

    let state = client.session().get();
    assert_eq!(state.status(), SessionStatus::Empty);
    assert_eq!(state.access_token(), None);
    assert_eq!(state.user(), None);
    assert_eq!(client.state_store().load_session().await.unwrap(), None);

    assert_eq!(navigator.history(), ["/login"]);
    assert_eq!(session_changes.try_recv(), Ok(SessionChange::SessionInvalid));
}

#[tokio::test]
async fn test_refresh_failure_on_sign_in_screen_does_not_navigate() {
    let (client, server, navigator) = logged_in_client_with_server().await;
    navigator.set_current_location("/login?next=%2Floans");

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_refresh_token(&server, 401, &*test_json::SESSION_EXPIRED, 1).await;

    let error = client.send(Request::get("/api/loan"), None).await.unwrap_err();
    assert_matches!(error, HttpError::RefreshToken(RefreshTokenError::Rejected { .. }));

    assert!(!client.session().is_authenticated());
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn test_malformed_refresh_response_invalidates_session() {
    let (client, server, navigator) = logged_in_client_with_server().await;

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN_MALFORMED, 1).await;

    let error = client.send(Request::get("/api/loan"), None).await.unwrap_err();
    assert_matches!(error, HttpError::RefreshToken(RefreshTokenError::MalformedResponse(_)));

    assert!(!client.session().is_authenticated());
    assert_eq!(navigator.history(), ["/login"]);
}

#[tokio::test]
async fn test_refresh_request_carries_no_bearer_token() {
    let (client, server, _navigator) = logged_in_client_with_server().await;

    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(|req: &MockRequest| {
            if req.headers.contains_key("authorization") {
                ResponseTemplate::new(400)
            } else {
                ResponseTemplate::new(200).set_body_json(&*test_json::REFRESH_TOKEN)
            }
        })
        .expect(1)
        .mount(&server)
        .await;

    client.auth().refresh_access_token().await.unwrap();
    assert_eq!(client.session().access_token().as_deref(), Some(test_json::REFRESHED_ACCESS_TOKEN));
}

#[tokio::test]
async fn test_refresh_uses_the_cookie_set_at_sign_in() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refreshToken=r-42; Path=/; HttpOnly")
                .set_body_json(&*test_json::LOGIN),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .and(header("cookie", "refreshToken=r-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::REFRESH_TOKEN))
        .expect(1)
        .mount(&server)
        .await;

    client.auth().login("adaeze@example.org", "hunter2").await.unwrap();
    client.auth().refresh_access_token().await.unwrap();
    assert_eq!(client.session().access_token().as_deref(), Some(test_json::REFRESHED_ACCESS_TOKEN));
}

#[tokio::test]
async fn test_refresh_without_session() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 0).await;

    assert_eq!(
        client.auth().refresh_access_token().await,
        Err(RefreshTokenError::RefreshTokenRequired)
    );
}

#[tokio::test]
async fn test_stale_refresh_does_not_resurrect_session() {
    let (client, server, navigator) = logged_in_client_with_server().await;

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&*test_json::REFRESH_TOKEN)
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::LOGOUT))
        .expect(1)
        .mount(&server)
        .await;

    let request = client.send(Request::get("/api/loan"), None);
    let logout = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.auth().logout().await;
    };
    let (result, ()) = tokio::join!(request, logout);

    assert_matches!(result, Err(HttpError::RefreshToken(RefreshTokenError::SessionCleared)));
    assert_eq!(client.session().status(), SessionStatus::Empty);
    assert_eq!(client.state_store().load_session().await.unwrap(), None);
    // Signing out isn't a session expiry.
    assert!(navigator.history().is_empty());
}

async fn mock_slow_refresh_token(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(template.set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stale_refresh_does_not_overwrite_a_newer_login() {
    let (client, server, navigator) = logged_in_client_with_server().await;

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_slow_refresh_token(
        &server,
        ResponseTemplate::new(200).set_body_json(&*test_json::REFRESH_TOKEN),
    )
    .await;
    mock_admin_login(&server).await;

    let request = client.send(Request::get("/api/loan"), None);
    let login = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.auth().login("tunde@example.org", "hunter2").await.unwrap();
    };
    let (result, ()) = tokio::join!(request, login);

    assert_matches!(result, Err(HttpError::RefreshToken(RefreshTokenError::SessionCleared)));

    let state = client.session().get();
    assert_eq!(state.access_token(), Some(test_json::LOGIN_ACCESS_TOKEN));
    assert_eq!(state.user(), Some(&admin()));

    let persisted = client.state_store().load_session().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, test_json::LOGIN_ACCESS_TOKEN);
    assert_eq!(persisted.user, admin());
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn test_stale_refresh_failure_keeps_a_newer_login() {
    let (client, server, navigator) = logged_in_client_with_server().await;
    let mut session_changes = client.subscribe_to_session_changes();

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 1).await;
    mock_slow_refresh_token(&server, ResponseTemplate::new(500)).await;
    mock_admin_login(&server).await;

    let request = client.send(Request::get("/api/loan"), None);
    let login = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.auth().login("tunde@example.org", "hunter2").await.unwrap();
    };
    let (result, ()) = tokio::join!(request, login);

    assert_matches!(
        result,
        Err(HttpError::RefreshToken(RefreshTokenError::Rejected { status }))
            if status == StatusCode::INTERNAL_SERVER_ERROR
    );

    assert_eq!(client.session().access_token().as_deref(), Some(test_json::LOGIN_ACCESS_TOKEN));
    assert_eq!(client.session().user(), Some(admin()));
    assert!(client.state_store().load_session().await.unwrap().is_some());
    assert!(navigator.history().is_empty());

    assert_eq!(session_changes.try_recv(), Ok(SessionChange::LoggedIn));
    assert_eq!(session_changes.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_concurrent_refreshes_are_independent_by_default() {
    let (client, server, _navigator) = logged_in_client_with_server().await;

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 2).await;
    mock_loans(&server, test_json::REFRESHED_ACCESS_TOKEN, 200, 2).await;
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&*test_json::REFRESH_TOKEN)
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let results = join_all((0..2).map(|_| client.get_json::<JsonValue>("/api/loan"))).await;
    for result in results {
        assert_eq!(result.unwrap(), *test_json::LOANS);
    }
}

#[tokio::test]
async fn test_coalesced_refresh_issues_a_single_request() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).coalesce_token_refreshes().build().unwrap();
    client.session().set_credentials(test_json::ACCESS_TOKEN, member());
    let mut session_changes = client.subscribe_to_session_changes();

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 3).await;
    mock_loans(&server, test_json::REFRESHED_ACCESS_TOKEN, 200, 3).await;
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&*test_json::REFRESH_TOKEN)
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = join_all((0..3).map(|_| client.get_json::<JsonValue>("/api/loan"))).await;
    for result in results {
        assert_eq!(result.unwrap(), *test_json::LOANS);
    }

    assert_eq!(session_changes.try_recv(), Ok(SessionChange::TokensRefreshed));
    assert_eq!(session_changes.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_coalesced_refresh_shares_failures() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).coalesce_token_refreshes().build().unwrap();
    client.session().set_credentials(test_json::ACCESS_TOKEN, member());
    let mut session_changes = client.subscribe_to_session_changes();

    mock_loans(&server, test_json::ACCESS_TOKEN, 401, 2).await;
    Mock::given(method("GET"))
        .and(path("/refresh-token"))
        .respond_with(ResponseTemplate::new(403).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let results = join_all((0..2).map(|_| client.get_json::<JsonValue>("/api/loan"))).await;
    for result in results {
        assert_matches!(
            result,
            Err(HttpError::RefreshToken(RefreshTokenError::Rejected { status }))
                if status == StatusCode::FORBIDDEN
        );
    }
    assert!(!client.session().is_authenticated());

    // Both requests share the session, which is invalidated once.
    assert_eq!(session_changes.try_recv(), Ok(SessionChange::SessionInvalid));
    assert_eq!(session_changes.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let (client, server, navigator) = logged_in_client_with_server().await;

    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 0).await;

    // Nothing is mounted for the path, wiremock answers 404.
    let error = client.send(Request::get("/api/loan"), None).await.unwrap_err();
    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .expect(1)
        .mount(&server)
        .await;

    let error = client
        .send(
            Request::get("/api/slow"),
            Some(RequestConfig::new().timeout(Duration::from_millis(50))),
        )
        .await
        .unwrap_err();
    assert_matches!(error, HttpError::Reqwest(e) if e.is_timeout());

    assert!(client.session().is_authenticated());
    assert!(navigator.history().is_empty());
}
