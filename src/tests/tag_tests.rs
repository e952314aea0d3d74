#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};
    use serde_json::json;

    use super::super::common::{create_question, create_tag, send, setup, ADMIN, ALICE};

    #[tokio::test]
    async fn test_list_and_retrieve_tags() {
        let ctx = setup();
        create_tag(&ctx, "Test Tag").await;
        create_tag(&ctx, "Another tag").await;

        let res = send(&ctx, "GET", "/api/tags", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        let tags = res.body.as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["slug"], "another-tag");
        assert_eq!(tags[1]["label"], "Test Tag");
        assert_eq!(tags[1]["url"], "/api/tags/test-tag");

        let res = send(&ctx, "GET", "/api/tags/test-tag", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["question_count"], 0);
    }

    #[tokio::test]
    async fn test_tag_reads_carry_cache_headers() {
        let ctx = setup();
        create_tag(&ctx, "Test Tag").await;

        let res = send(&ctx, "GET", "/api/tags/test-tag", None, None).await;
        assert_eq!(res.headers.get(header::CACHE_CONTROL).unwrap(), "max-age=3600");
        assert_eq!(res.headers.get(header::VARY).unwrap(), "Authorization");
        assert_eq!(ctx.state.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_query_noise_cannot_grow_cache_unbounded() {
        let ctx = setup();
        create_tag(&ctx, "Test Tag").await;
        for n in 0..400 {
            let res = send(&ctx, "GET", &format!("/api/tags?junk={n}"), None, None).await;
            assert_eq!(res.status, StatusCode::OK);
        }
        assert!(ctx.state.cache.len().await <= crate::cache::DEFAULT_MAX_ENTRIES);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_404() {
        let ctx = setup();
        let res = send(&ctx, "GET", "/api/tags/nope", None, None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body["detail"], "Tag not found.");
    }

    #[tokio::test]
    async fn test_only_staff_manage_tags() {
        let ctx = setup();
        let res = send(&ctx, "POST", "/api/tags", Some(ALICE), Some(json!({ "label": "x" }))).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);

        let res = send(&ctx, "POST", "/api/tags", None, Some(json!({ "label": "x" }))).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        create_tag(&ctx, "Rust").await;
        let res = send(&ctx, "PUT", "/api/tags/rust", Some(ALICE), Some(json!({ "label": "Go" }))).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        let res = send(&ctx, "DELETE", "/api/tags/rust", Some(ALICE), None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected_even_on_public_reads() {
        let ctx = setup();
        let res = send(&ctx, "GET", "/api/tags", Some("wrong"), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_labels_get_numbered_slugs() {
        let ctx = setup();
        let first = create_tag(&ctx, "some @ long giberish-dsfgsdfg!").await;
        let second = create_tag(&ctx, "some @ long giberish-dsfgsdfg!").await;
        assert_eq!(first["slug"], "some-long-giberish-dsfgsdfg");
        assert_eq!(second["slug"], "some-long-giberish-dsfgsdfg-1");
    }

    #[tokio::test]
    async fn test_cyrillic_label_is_transliterated() {
        let ctx = setup();
        let tag = create_tag(&ctx, "тест @ заголовок!").await;
        assert_eq!(tag["slug"], "test-zagolovok");
    }

    #[tokio::test]
    async fn test_label_without_letters_is_rejected() {
        let ctx = setup();
        let res = send(&ctx, "POST", "/api/tags", Some(ADMIN), Some(json!({ "label": "@@@" }))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_label_is_derived_from_slug_when_missing() {
        let ctx = setup();
        let res = send(&ctx, "POST", "/api/tags", Some(ADMIN), Some(json!({ "slug": "web-dev" }))).await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body["label"], "Web Dev");
        assert_eq!(res.body["slug"], "web-dev");
    }

    #[tokio::test]
    async fn test_relabel_moves_slug_and_refreshes_cache() {
        let ctx = setup();
        create_tag(&ctx, "Test Tag").await;

        // Warm the cache.
        let res = send(&ctx, "GET", "/api/tags", None, None).await;
        assert_eq!(res.body[0]["label"], "Test Tag");

        let res = send(&ctx, "PUT", "/api/tags/test-tag", Some(ADMIN), Some(json!({ "label": "test tag" }))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["slug"], "test-tag-1");

        let res = send(&ctx, "GET", "/api/tags", None, None).await;
        assert_eq!(res.body[0]["label"], "test tag");
        let res = send(&ctx, "GET", "/api/tags/test-tag", None, None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        // Same label again keeps the slug.
        let res = send(&ctx, "PUT", "/api/tags/test-tag-1", Some(ADMIN), Some(json!({ "label": "test tag" }))).await;
        assert_eq!(res.body["slug"], "test-tag-1");
    }

    #[tokio::test]
    async fn test_question_count_and_tag_deletion() {
        let ctx = setup();
        create_tag(&ctx, "Rust").await;
        let uuid = create_question(&ctx, ALICE, json!({ "title": "Borrowing", "tags": [{ "slug": "rust" }] })).await;

        let res = send(&ctx, "GET", "/api/tags/rust", None, None).await;
        assert_eq!(res.body["question_count"], 1);

        let res = send(&ctx, "DELETE", "/api/tags/rust", Some(ADMIN), None).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT);

        let res = send(&ctx, "GET", &format!("/api/questions/{uuid}"), Some(ALICE), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body["tags"].as_array().unwrap().is_empty());
    }
}
