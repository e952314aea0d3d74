#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::common::{create_choice, create_question, publish, send, setup, TestContext, ADMIN, ALICE, BOB};

    async fn published_question(ctx: &TestContext) -> String {
        let uuid = create_question(ctx, ALICE, json!({ "title": "HTTP verbs" })).await;
        publish(ctx, &uuid).await;
        uuid
    }

    #[tokio::test]
    async fn test_list_choices_is_staff_only() {
        let ctx = setup();
        let q = published_question(&ctx).await;
        create_choice(&ctx, ALICE, &q, "GET", true).await;
        create_choice(&ctx, ALICE, &q, "POST", false).await;

        let res = send(&ctx, "GET", "/api/choices", Some(ADMIN), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["count"], 2);

        let res = send(&ctx, "GET", &format!("/api/choices?question={q}"), Some(ADMIN), None).await;
        assert_eq!(res.body["count"], 2);

        let res = send(&ctx, "GET", "/api/choices", Some(ALICE), None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        let res = send(&ctx, "GET", "/api/choices", None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_retrieve_choice() {
        let ctx = setup();
        let q = published_question(&ctx).await;
        let c = create_choice(&ctx, ALICE, &q, "GET", true).await;

        let res = send(&ctx, "GET", &format!("/api/choices/{c}"), None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["question"], q.as_str());
        assert_eq!(res.body["question_url"], format!("/api/questions/{q}"));
        assert_eq!(res.body["is_correct"], true);
    }

    #[tokio::test]
    async fn test_only_question_owner_adds_choices() {
        let ctx = setup();
        let q = published_question(&ctx).await;

        let payload = json!({ "question": q, "text": "PUT", "is_correct": false });
        let res = send(&ctx, "POST", "/api/choices", Some(BOB), Some(payload.clone())).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let res = send(&ctx, "POST", "/api/choices", Some(ADMIN), Some(payload)).await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_choice_for_unknown_question_is_rejected() {
        let ctx = setup();
        let payload = json!({ "question": uuid::Uuid::new_v4(), "text": "x" });
        let res = send(&ctx, "POST", "/api/choices", Some(ALICE), Some(payload)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_choices_show_up_in_question_detail() {
        let ctx = setup();
        let q = published_question(&ctx).await;
        let path = format!("/api/questions/{q}");

        // Warm the cache before the choices exist.
        let res = send(&ctx, "GET", &path, None, None).await;
        assert!(res.body["choices"].as_array().unwrap().is_empty());

        create_choice(&ctx, ALICE, &q, "GET", true).await;
        create_choice(&ctx, ALICE, &q, "HEAD", true).await;

        let res = send(&ctx, "GET", &path, None, None).await;
        let choices = res.body["choices"].as_array().unwrap();
        assert_eq!(choices.len(), 2);
        assert!(choices[0].get("is_correct").is_none());
        assert_eq!(res.body["is_multichoice"], true);
    }

    #[tokio::test]
    async fn test_update_choice_rules() {
        let ctx = setup();
        let q = published_question(&ctx).await;
        let c = create_choice(&ctx, ALICE, &q, "GET", true).await;
        let path = format!("/api/choices/{c}");

        let res = send(&ctx, "PUT", &path, Some(BOB), Some(json!({ "question": q, "text": "x" }))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        // Moving the choice onto someone else's question is refused too.
        let bobs = create_question(&ctx, BOB, json!({ "title": "Bob's" })).await;
        let res = send(&ctx, "PUT", &path, Some(ALICE), Some(json!({ "question": bobs, "text": "x" }))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let res = send(&ctx, "PUT", &path, Some(ALICE), Some(json!({ "question": q, "text": "OPTIONS" }))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["text"], "OPTIONS");
        assert_eq!(res.body["is_correct"], false);
    }

    #[tokio::test]
    async fn test_delete_choice_rules() {
        let ctx = setup();
        let q = published_question(&ctx).await;
        let c = create_choice(&ctx, ALICE, &q, "GET", true).await;
        let path = format!("/api/choices/{c}");

        let res = send(&ctx, "DELETE", &path, Some(BOB), None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);

        let res = send(&ctx, "DELETE", &path, Some(ALICE), None).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT);

        let res = send(&ctx, "GET", &path, None, None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
