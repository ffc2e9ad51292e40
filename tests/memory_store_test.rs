//! User repository contract tests against the in-memory store.

use std::sync::Arc;

use web_users::infrastructure::{AesTokenCipher, TokenCipher};
use web_users::utils::{hash_password, parse_permitted_pages};
use web_users::{
    ActivateUser, DbError, MemoryUserStore, NewUser, Page, UserRepository, UserUpdate,
};

fn page(page_id: i32, path: &str) -> Page {
    Page {
        page_id,
        path: path.to_string(),
        component_name: format!("{}Component", path.trim_start_matches('/')),
        description: String::new(),
        icon_name: "icon".to_string(),
    }
}

async fn store() -> MemoryUserStore {
    let cipher = AesTokenCipher::new("test-key").unwrap();
    MemoryUserStore::new(Arc::new(cipher))
        .with_pages(vec![page(1, "/home"), page(2, "/users"), page(3, "/admin")])
        .await
}

fn new_user(email: &str, token: &str, pages: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        first_name: "A".to_string(),
        last_name: "B".to_string(),
        password: None,
        confirmation_token: Some(token.to_string()),
        permitted_pages_id: parse_permitted_pages(pages),
    }
}

#[tokio::test]
async fn unknown_email_is_not_an_error() {
    let store = store().await;
    assert!(store.get_user_by_email("nobody@x.com").await.unwrap().is_none());
    assert!(store.get_activated_user_by_email("nobody@x.com").await.unwrap().is_none());
    assert!(store.get_user_by_id(42).await.unwrap().is_none());
    assert!(store.get_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn registration_and_activation_scenario() {
    let store = store().await;
    let user_id = store.add_user(new_user("a@x.com", "tok1", "1,2")).await.unwrap();

    let pending = store.get_user_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(pending.user_id, user_id);
    assert_eq!(pending.first_name, "A");
    assert_eq!(pending.last_name, "B");
    assert!(!pending.activated);
    assert_eq!(pending.confirmation_token.as_deref(), Some("tok1"));
    assert_eq!(pending.permitted_pages_id, vec![1, 2]);
    assert!(store.get_activated_user_by_email("a@x.com").await.unwrap().is_none());

    let activated = store
        .activate_user(ActivateUser {
            password: "h".to_string(),
            token: "tok1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(activated, 1);

    let user = store.get_activated_user_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(user.user_id, user_id);
    assert!(user.activated);
    assert_eq!(user.password.as_deref(), Some("h"));
}

#[tokio::test]
async fn activation_without_pending_match_reports_zero_rows() {
    let store = store().await;
    store.add_user(new_user("a@x.com", "tok1", "1")).await.unwrap();

    let wrong_token = ActivateUser {
        password: "h".to_string(),
        token: "other".to_string(),
    };
    assert_eq!(store.activate_user(wrong_token).await.unwrap(), 0);

    let activation = ActivateUser {
        password: "h".to_string(),
        token: "tok1".to_string(),
    };
    assert_eq!(store.activate_user(activation.clone()).await.unwrap(), 1);
    // 已激活的账户不能再次激活
    assert_eq!(store.activate_user(activation).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let store = store().await;
    store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();
    let err = store.add_user(new_user("a@x.com", "t2", "")).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation("web_users_email_key")));
    assert!(err.is_unique_violation());
    assert_eq!(store.get_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_user_checks_email_owned_by_other_user() {
    let store = store().await;
    let a = store.add_user(new_user("a@x.com", "t1", "1")).await.unwrap();
    let b = store.add_user(new_user("b@x.com", "t2", "1")).await.unwrap();

    assert!(store.get_user_by_email_except_id("a@x.com", a).await.unwrap().is_none());
    let owner = store.get_user_by_email_except_id("a@x.com", b).await.unwrap().unwrap();
    assert_eq!(owner.user_id, a);

    let update = UserUpdate {
        user_id: b,
        email: "a@x.com".to_string(),
        first_name: "C".to_string(),
        last_name: "D".to_string(),
        permitted_pages_id: vec![3],
    };
    assert!(store.update_user(update.clone()).await.unwrap_err().is_unique_violation());

    let rows = store
        .update_user(UserUpdate {
            email: "c@x.com".to_string(),
            ..update
        })
        .await
        .unwrap();
    assert_eq!(rows, 1);
    let user = store.get_user_by_id(b).await.unwrap().unwrap();
    assert_eq!(user.email, "c@x.com");
    assert_eq!(user.first_name, "C");
    assert_eq!(user.permitted_pages_id, vec![3]);
}

#[tokio::test]
async fn get_users_returns_all_in_id_order() {
    let store = store().await;
    let a = store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();
    let b = store.add_user(new_user("b@x.com", "t2", "")).await.unwrap();
    let ids: Vec<i32> = store.get_users().await.unwrap().iter().map(|u| u.user_id).collect();
    assert_eq!(ids, vec![a, b]);
}

#[tokio::test]
async fn reset_avatar_and_password_changes() {
    let store = store().await;
    let id = store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();
    store
        .activate_user(ActivateUser {
            password: "h".to_string(),
            token: "t1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(store.upload_image_source(id, "/avatars/a.png").await.unwrap(), 1);
    assert_eq!(store.change_password(id, "h2").await.unwrap(), 1);
    let user = store.get_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.avatar.as_deref(), Some("/avatars/a.png"));
    assert_eq!(user.password.as_deref(), Some("h2"));

    assert_eq!(store.reset_account("a@x.com", "t2").await.unwrap(), 1);
    let user = store.get_user_by_id(id).await.unwrap().unwrap();
    assert!(!user.activated);
    assert!(user.password.is_none());
    assert_eq!(user.confirmation_token.as_deref(), Some("t2"));

    assert_eq!(store.reset_account("nobody@x.com", "t3").await.unwrap(), 0);
    assert_eq!(store.change_password(999, "h").await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_tokens_are_stored_encrypted_and_counted() {
    let store = store().await;
    let id = store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();

    assert_eq!(store.contains_refresh_token(id, "rt").await.unwrap(), 0);
    store.insert_refresh_token(id, "rt").await.unwrap();
    store.insert_refresh_token(id, "rt-other-device").await.unwrap();
    assert!(store.contains_refresh_token(id, "rt").await.unwrap() >= 1);

    let stored = store.stored_refresh_tokens(id).await;
    let cipher = AesTokenCipher::new("test-key").unwrap();
    assert!(!stored.contains(&"rt".to_string()));
    assert!(stored.contains(&cipher.encrypt("rt").unwrap()));

    assert_eq!(store.remove_refresh_token(id, "rt").await.unwrap(), 1);
    assert_eq!(store.contains_refresh_token(id, "rt").await.unwrap(), 0);
    assert_eq!(store.contains_refresh_token(id, "rt-other-device").await.unwrap(), 1);
}

#[tokio::test]
async fn refresh_token_requires_existing_user_and_is_removed_with_user() {
    let store = store().await;
    let err = store.insert_refresh_token(7, "rt").await.unwrap_err();
    assert!(matches!(err, DbError::ForeignKeyViolation(_)));
    assert!(!err.is_unique_violation());

    let id = store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();
    store.insert_refresh_token(id, "rt").await.unwrap();
    assert_eq!(store.remove_user(id).await.unwrap(), 1);
    assert!(store.stored_refresh_tokens(id).await.is_empty());
    assert_eq!(store.remove_user(id).await.unwrap(), 0);
}

#[tokio::test]
async fn permitted_pages_follow_set_membership() {
    let store = store().await;
    let id = store.add_user(new_user("a@x.com", "t1", "3,1,3,9")).await.unwrap();

    let paths: Vec<String> = store
        .get_permitted_pages(id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.path)
        .collect();
    assert_eq!(paths, vec!["/home", "/admin"]);

    let none = store.add_user(new_user("b@x.com", "t2", "")).await.unwrap();
    assert!(store.get_permitted_pages(none).await.unwrap().is_empty());
    assert!(store.get_permitted_pages(999).await.unwrap().is_empty());
}

#[tokio::test]
async fn authenticate_requires_activation_and_matching_password() {
    let store = store().await;
    store.add_user(new_user("a@x.com", "t1", "")).await.unwrap();
    assert!(store.authenticate("a@x.com", "secret").await.unwrap().is_none());

    store
        .activate_user(ActivateUser {
            password: hash_password("secret").unwrap(),
            token: "t1".to_string(),
        })
        .await
        .unwrap();

    let user = store.authenticate("a@x.com", "secret").await.unwrap().unwrap();
    assert_eq!(user.email, "a@x.com");
    assert!(store.authenticate("a@x.com", "wrong").await.unwrap().is_none());
    assert!(store.authenticate("b@x.com", "secret").await.unwrap().is_none());
}

#[tokio::test]
async fn password_is_not_serialized() {
    let store = store().await;
    let id = store.add_user(new_user("a@x.com", "t1", "1")).await.unwrap();
    store.change_password(id, "hash").await.unwrap();
    let user = store.get_user_by_id(id).await.unwrap().unwrap();

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password").is_none());
    assert!(json.get("confirmation_token").is_none());
    assert_eq!(json["email"], "a@x.com");
}

#[tokio::test]
async fn authenticate_treats_non_bcrypt_password_as_mismatch() {
    let store = store().await;
    store.add_user(new_user("a@x.com", "tok1", "1,2")).await.unwrap();
    store
        .activate_user(ActivateUser {
            password: "h".to_string(),
            token: "tok1".to_string(),
        })
        .await
        .unwrap();

    assert!(store.authenticate("a@x.com", "h").await.unwrap().is_none());
    assert!(store.authenticate("a@x.com", "other").await.unwrap().is_none());
}
