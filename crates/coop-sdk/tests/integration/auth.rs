use assert_matches::assert_matches;
use coop_sdk::{Error, HttpError, Role, SessionChange, SessionStatus, StateStoreExt};
use coop_sdk_test::test_json;
use http::StatusCode;
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{logged_in_client_with_server, member, mock_refresh_token, test_client_builder};

#[tokio::test]
async fn test_login() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();
    let mut session_changes = client.subscribe_to_session_changes();

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({ "email": "adaeze@example.org", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::LOGIN))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.auth().login("adaeze@example.org", "hunter2").await.unwrap();
    assert_eq!(response.access_token, test_json::LOGIN_ACCESS_TOKEN);
    assert_eq!(response.message.as_deref(), Some("Login successful"));
    assert_eq!(response.user, member());
    assert_eq!(response.user.extra["membershipNumber"], "COOP-0042");

    let state = client.session().get();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.access_token(), Some(test_json::LOGIN_ACCESS_TOKEN));
    assert!(!state.is_loading);
    assert_eq!(state.error, None);

    let persisted = client.state_store().load_session().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, test_json::LOGIN_ACCESS_TOKEN);
    assert_eq!(persisted.user, member());

    assert_eq!(session_changes.try_recv(), Ok(SessionChange::LoggedIn));
    assert_eq!(client.auth().home_path(), Some("/dashboard"));
}

#[tokio::test]
async fn test_login_as_admin_lands_on_admin_dashboard() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::LOGIN_ADMIN))
        .mount(&server)
        .await;

    assert_eq!(client.auth().home_path(), None);

    let response = client.auth().login("tunde@example.org", "hunter2").await.unwrap();
    assert_eq!(response.user.role, Role::Admin);
    assert_eq!(client.auth().home_path(), Some("/admin/dashboard"));
}

#[tokio::test]
async fn test_login_rejection_keeps_message_verbatim() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(&*test_json::LOGIN_RESPONSE_ERR))
        .expect(1)
        .mount(&server)
        .await;
    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 0).await;

    let error = client.auth().login("adaeze@example.org", "wrong").await.unwrap_err();
    assert_matches!(
        &error,
        Error::CredentialRejected { status, message }
            if *status == StatusCode::UNAUTHORIZED && message == "Invalid email or password"
    );
    assert_eq!(error.to_string(), "Invalid email or password");

    let state = client.session().get();
    assert_eq!(state.status(), SessionStatus::Empty);
    assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
    assert!(!state.is_loading);
    assert_eq!(client.state_store().load_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_rejection_without_message() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let error = client.auth().login("adaeze@example.org", "hunter2").await.unwrap_err();
    assert_matches!(error, Error::CredentialRejected { message, .. } if message == "Forbidden");
}

#[tokio::test]
async fn test_login_server_error_is_not_a_credential_rejection() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let error = client.auth().login("adaeze@example.org", "hunter2").await.unwrap_err();
    assert_matches!(
        &error,
        Error::Http(HttpError::Api(api_error))
            if api_error.status == StatusCode::INTERNAL_SERVER_ERROR
    );

    let state = client.session().get();
    assert_eq!(state.status(), SessionStatus::Empty);
    assert!(state.error.is_some());
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_logout() {
    let (client, server, navigator) = logged_in_client_with_server().await;
    let mut session_changes = client.subscribe_to_session_changes();

    Mock::given(method("POST"))
        .and(path("/logout"))
        .and(header("authorization", "Bearer 1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::LOGOUT))
        .expect(1)
        .mount(&server)
        .await;

    client.auth().logout().await;

    assert_eq!(client.session().status(), SessionStatus::Empty);
    assert_eq!(client.state_store().load_session().await.unwrap(), None);
    assert_eq!(session_changes.try_recv(), Ok(SessionChange::LoggedOut));
    // The host decides where to go after signing out.
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn test_logout_survives_api_failure() {
    let (client, server, _navigator) = logged_in_client_with_server().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mock_refresh_token(&server, 200, &*test_json::REFRESH_TOKEN, 0).await;

    client.auth().logout().await;

    assert_eq!(client.session().status(), SessionStatus::Empty);
    assert_eq!(client.state_store().load_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_logout_twice_equals_once() {
    let (client, server, _navigator) = logged_in_client_with_server().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    client.auth().logout().await;
    let once = client.session().get();
    client.auth().logout().await;
    let twice = client.session().get();

    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_session_observers_never_see_half_a_session() {
    let server = MockServer::start().await;
    let client = test_client_builder(&server).build().unwrap();
    let mut subscriber = client.session().subscribe();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&*test_json::LOGIN))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    client.auth().login("adaeze@example.org", "hunter2").await.unwrap();
    let state = subscriber.next().await.unwrap();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user(), Some(&member()));

    client.auth().logout().await;
    let state = subscriber.next().await.unwrap();
    assert_eq!(state.access_token(), None);
    assert_eq!(state.user(), None);
}
