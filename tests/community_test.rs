mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn stacks_are_scoped_to_their_owner() {
    let app = TestApp::new();
    let (_, owner) = app.seed_user("owner@example.com");
    let (_, other) = app.seed_user("other@example.com");

    let created = app
        .post(
            "/api/stacks",
            Some(&owner),
            json!({ "name": "Reading", "items": [{ "slug": "BPC-157", "note": "start here" }] }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let stack = created.json()["stack"].clone();
    assert_eq!(stack["items"][0]["slug"], "bpc-157");
    let uri = format!("/api/stacks/{}", stack["id"].as_str().unwrap());

    assert_eq!(app.get(&uri, Some(&owner)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&other)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, None).await.status, StatusCode::UNAUTHORIZED);

    let hijack = app
        .post(&uri, Some(&other), json!({ "name": "Mine now", "items": [] }))
        .await;
    assert_eq!(hijack.status, StatusCode::NOT_FOUND);

    let renamed = app
        .post(&uri, Some(&owner), json!({ "name": "Renamed", "items": [] }))
        .await;
    assert_eq!(renamed.json()["stack"]["name"], "Renamed");

    let others_list = app.get("/api/stacks", Some(&other)).await.json();
    assert!(others_list["items"].as_array().unwrap().is_empty());

    let denied = app
        .send(Method::DELETE, &uri, &[("cookie", other.as_str())], None)
        .await;
    assert_eq!(denied.status, StatusCode::NOT_FOUND);
    let deleted = app
        .send(Method::DELETE, &uri, &[("cookie", owner.as_str())], None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&owner)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_toggle_with_explicit_state_is_idempotent() {
    let app = TestApp::new();
    let (user_id, cookie) = app.seed_user("fan@example.com");

    for _ in 0..3 {
        let res = app
            .post(
                "/api/favorites/toggle",
                Some(&cookie),
                json!({ "kind": "peptide", "slug": "bpc-157", "favorite": true }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json()["favorited"], true);
    }

    let count: i64 = app
        .state
        .db
        .get()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?1",
            [&user_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);

    let status = app
        .get("/api/favorites/status?kind=peptide&slug=bpc-157", Some(&cookie))
        .await
        .json();
    assert_eq!(status["favorited"], true);

    // Without an explicit state the toggle flips
    let flipped = app
        .post(
            "/api/favorites/toggle",
            Some(&cookie),
            json!({ "kind": "peptide", "slug": "bpc-157" }),
        )
        .await
        .json();
    assert_eq!(flipped["favorited"], false);

    let bad_kind = app
        .post(
            "/api/favorites/toggle",
            Some(&cookie),
            json!({ "kind": "video", "slug": "bpc-157" }),
        )
        .await;
    assert_eq!(bad_kind.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn favorites_list_filters_by_kind() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user("fan@example.com");
    for (kind, slug) in [("peptide", "bpc-157"), ("peptide", "semaglutide"), ("article", "intro")] {
        app.post(
            "/api/favorites/toggle",
            Some(&cookie),
            json!({ "kind": kind, "slug": slug, "favorite": true }),
        )
        .await;
    }

    let all = app.get("/api/favorites", Some(&cookie)).await.json();
    assert_eq!(all["items"].as_array().unwrap().len(), 3);
    let peptides = app.get("/api/favorites?kind=peptide", Some(&cookie)).await.json();
    assert_eq!(peptides["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn comments_are_screened_and_listed_oldest_first() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user("commenter@example.com");

    let anon = app
        .post("/api/peptide-comments/bpc-157", None, json!({ "body": "Hello" }))
        .await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let screened = app
        .post(
            "/api/peptide-comments/bpc-157",
            Some(&cookie),
            json!({ "body": "Reconstitute it and inject subq" }),
        )
        .await;
    assert_eq!(screened.status, StatusCode::BAD_REQUEST);
    let body = screened.json();
    assert_eq!(body["ok"], false);
    assert!(body["reasons"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r == "reconstitution"));

    let unknown = app
        .post(
            "/api/peptide-comments/not-a-peptide",
            Some(&cookie),
            json!({ "body": "Interesting" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let empty = app
        .post("/api/peptide-comments/bpc-157", Some(&cookie), json!({ "body": "   " }))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    for text in ["First thoughts", "Second thoughts"] {
        let res = app
            .post("/api/peptide-comments/bpc-157", Some(&cookie), json!({ "body": text }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.json()["comment"]["author"], "commenter");
    }

    let list = app.get("/api/peptide-comments/bpc-157", None).await.json();
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["body"], "First thoughts");
    assert_eq!(items[1]["body"], "Second thoughts");
}

#[tokio::test]
async fn comment_delete_is_limited_to_author_and_moderators() {
    let app = TestApp::new();
    let (_, author) = app.seed_user("author@example.com");
    let (_, stranger) = app.seed_user("stranger@example.com");
    let (mod_id, moderator) = app.seed_user("mod@example.com");
    app.grant_role(&mod_id, "moderator");

    let mut ids = Vec::new();
    for text in ["One", "Two"] {
        let res = app
            .post("/api/peptide-comments/bpc-157", Some(&author), json!({ "body": text }))
            .await
            .json();
        ids.push(res["comment"]["id"].as_str().unwrap().to_string());
    }

    let forbidden = app
        .post(
            &format!("/api/peptide-comments/bpc-157/{}/delete", ids[0]),
            Some(&stranger),
            json!({}),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let by_author = app
        .post(
            &format!("/api/peptide-comments/bpc-157/{}/delete", ids[0]),
            Some(&author),
            json!({}),
        )
        .await;
    assert_eq!(by_author.status, StatusCode::OK);

    let by_mod = app
        .post(
            &format!("/api/peptide-comments/bpc-157/{}/delete", ids[1]),
            Some(&moderator),
            json!({}),
        )
        .await;
    assert_eq!(by_mod.status, StatusCode::OK);

    let again = app
        .post(
            &format!("/api/peptide-comments/bpc-157/{}/delete", ids[1]),
            Some(&moderator),
            json!({}),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let list = app.get("/api/peptide-comments/bpc-157", None).await.json();
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn comments_posted_under_an_alias_land_on_the_canonical_slug() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user("commenter@example.com");

    let res = app
        .post(
            "/api/peptide-comments/body-protection-compound-157",
            Some(&cookie),
            json!({ "body": "Same compound, older name" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.json()["comment"]["peptide_slug"], "bpc-157");

    let canonical = app.get("/api/peptide-comments/bpc-157", None).await.json();
    assert_eq!(canonical["items"].as_array().unwrap().len(), 1);
    let via_alias = app
        .get("/api/peptide-comments/body-protection-compound-157", None)
        .await
        .json();
    assert_eq!(via_alias["items"].as_array().unwrap().len(), 1);

    let page = app.get("/peptides/bpc-157", None).await;
    assert!(page.text.contains("Same compound, older name"));
}
