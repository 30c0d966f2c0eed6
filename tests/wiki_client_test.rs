//! Wiki client integration tests against a mock API server.

use std::sync::Arc;

use mockito::Matcher;
use wikiscrape::{Downloader, ScrapeConfigBuilder, WikiClient};

async fn client_for(server: &mockito::Server) -> (WikiClient, Arc<Downloader>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ScrapeConfigBuilder::new()
        .wiki_url(server.url())
        .output_dir(dir.path())
        .cache_dir(dir.path().join("cache"))
        .admin_email("ops@example.org")
        .speed(1)
        .build()
        .unwrap();
    let downloader = Arc::new(Downloader::new(&config).await.unwrap());
    let client = WikiClient::new(Arc::clone(&downloader), config.wiki_url());
    (client, downloader, dir)
}

async fn query_mock(
    server: &mut mockito::Server,
    pairs: &[(&str, &str)],
    body: &str,
) -> mockito::Mock {
    let matchers: Vec<Matcher> = pairs
        .iter()
        .map(|(k, v)| Matcher::UrlEncoded((*k).into(), (*v).into()))
        .collect();
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::AllOf(matchers))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn metadata_registers_namespaces_and_urls() {
    let mut server = mockito::Server::new_async().await;
    let _m = query_mock(
        &mut server,
        &[("action", "query"), ("meta", "siteinfo")],
        r#"{
            "query": {
                "general": {
                    "mainpage": "Main Page",
                    "sitename": "Test Wiki",
                    "lang": "fr",
                    "articlepath": "/wiki/$1"
                },
                "namespaces": {
                    "0": {"id": 0, "*": "", "content": "", "subpages": ""},
                    "14": {"id": 14, "*": "Catégorie", "canonical": "Category"}
                },
                "namespacealiases": [{"id": 14, "*": "CAT"}]
            }
        }"#,
    ).await;

    let (client, _downloader, _dir) = client_for(&server).await;
    let metadata = client.get_metadata().await.unwrap();

    assert_eq!(metadata.main_page, "Main_Page");
    assert_eq!(metadata.site_name, "Test Wiki");
    assert_eq!(metadata.lang_iso2, "fr");
    assert_eq!(metadata.lang_iso3, "fra");
    assert!(metadata.base_url.ends_with('/'));
    assert!(metadata.rest_url.ends_with("/api/rest_v1/"));
    assert!(metadata.web_url.ends_with("/wiki/"));

    for variant in ["Category", "Catégorie", "catégorie", "CAT"] {
        assert_eq!(
            metadata.namespaces.get(variant).map(|ns| ns.id),
            Some(14),
            "variant {variant}"
        );
    }
    // Only the main namespace is flagged content, but the default
    // enumeration walk still covers categories.
    let content: Vec<i64> = metadata
        .namespaces
        .content_namespaces()
        .iter()
        .map(|ns| ns.id)
        .collect();
    assert_eq!(content, [0]);
    let walked: Vec<i64> = metadata
        .namespaces
        .enumeration_namespaces()
        .iter()
        .map(|ns| ns.id)
        .collect();
    assert_eq!(walked, [0, 14]);
}

#[tokio::test]
async fn detail_query_merges_continuations_without_duplicating_props() {
    let mut server = mockito::Server::new_async().await;

    // First window: carries everything plus a categories cursor.
    let first = query_mock(
        &mut server,
        &[("action", "query"), ("titles", "London")],
        r#"{
            "continue": {"clcontinue": "1|Next", "continue": "||"},
            "query": {"pages": {"1": {
                "pageid": 1, "ns": 0, "title": "London",
                "revisions": [{"revid": 42}],
                "redirects": [{"title": "Londres", "pageid": 7, "ns": 0}],
                "categories": [{"title": "Category:Capitals", "ns": 14}]
            }}}
        }"#,
    )
    .await
    .expect(1);

    // Continuation window: the server re-emits revisions and redirects in
    // full; only the continued categories may be merged.
    let second = query_mock(
        &mut server,
        &[("action", "query"), ("clcontinue", "1|Next")],
        r#"{
            "query": {"pages": {"1": {
                "pageid": 1, "ns": 0, "title": "London",
                "revisions": [{"revid": 42}],
                "redirects": [{"title": "Londres", "pageid": 7, "ns": 0}],
                "categories": [{"title": "Category:Cities", "ns": 14}]
            }}}
        }"#,
    )
    .await
    .expect(1);

    let (client, _downloader, _dir) = client_for(&server).await;
    let details = client
        .get_article_details_by_ids(&["London".to_string()], false)
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;

    let london = details.get("London").expect("London in details");
    assert_eq!(london.revision_id, 42);
    assert_eq!(london.redirects.len(), 1, "redirects must not duplicate");
    let categories: Vec<&str> = london.categories.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(categories, ["Category:Capitals", "Category:Cities"]);
}

#[tokio::test]
async fn missing_pages_are_dropped() {
    let mut server = mockito::Server::new_async().await;
    let _m = query_mock(
        &mut server,
        &[("action", "query"), ("titles", "Nope")],
        r#"{"query": {"pages": {"-1": {"ns": 0, "title": "Nope", "missing": ""}}}}"#,
    ).await;

    let (client, _downloader, _dir) = client_for(&server).await;
    let details = client
        .get_article_details_by_ids(&["Nope".to_string()], false)
        .await
        .unwrap();
    assert!(details.is_empty());
}

#[tokio::test]
async fn namespace_enumeration_returns_the_generator_cursor() {
    let mut server = mockito::Server::new_async().await;

    let first = query_mock(
        &mut server,
        &[("action", "query"), ("generator", "allpages")],
        r#"{
            "query-continue": {"allpages": {"gapcontinue": "Carlisle"}},
            "query": {"pages": {
                "1": {"pageid": 1, "ns": 0, "title": "Aberdeen",
                      "revisions": [{"revid": 1}]},
                "2": {"pageid": 2, "ns": 0, "title": "Bristol",
                      "revisions": [{"revid": 2}]}
            }}
        }"#,
    )
    .await
    .expect(1);
    let second = query_mock(
        &mut server,
        &[("action", "query"), ("gapcontinue", "Carlisle")],
        r#"{
            "query": {"pages": {
                "3": {"pageid": 3, "ns": 0, "title": "Carlisle",
                      "revisions": [{"revid": 3}]}
            }}
        }"#,
    )
    .await
    .expect(1);

    let (client, _downloader, _dir) = client_for(&server).await;

    let (details, next) = client.get_article_details_by_namespace(0, "").await.unwrap();
    first.assert_async().await;
    assert_eq!(details.len(), 2);
    assert_eq!(next.as_deref(), Some("Carlisle"));

    let (details, next) = client
        .get_article_details_by_namespace(0, "Carlisle")
        .await
        .unwrap();
    second.assert_async().await;
    assert_eq!(details.len(), 1);
    assert!(details.contains_key("Carlisle"));
    assert!(next.is_none());
}

#[tokio::test]
async fn db_error_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _m = query_mock(
        &mut server,
        &[("action", "query")],
        r#"{"error": {"code": "DB_ERROR", "info": "replica lag"}}"#,
    ).await;

    let (client, _downloader, _dir) = client_for(&server).await;
    let err = client
        .get_article_details_by_ids(&["X".to_string()], false)
        .await
        .unwrap_err();
    assert!(matches!(err, wikiscrape::ScrapeError::WikiDatabase(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn coordinates_warning_disables_the_capability() {
    let mut server = mockito::Server::new_async().await;
    let _m = query_mock(
        &mut server,
        &[("action", "query")],
        r#"{
            "warnings": {"query": {"*": "Unrecognized value for parameter 'prop': coordinates"}},
            "query": {"pages": {"1": {"pageid": 1, "ns": 0, "title": "X"}}}
        }"#,
    ).await;

    let (client, downloader, _dir) = client_for(&server).await;
    assert!(downloader.caps.coordinates_available());
    client
        .get_article_details_by_ids(&["X".to_string()], false)
        .await
        .unwrap();
    assert!(!downloader.caps.coordinates_available());
}

#[tokio::test]
async fn subcategories_follow_cmcontinue() {
    let mut server = mockito::Server::new_async().await;
    let first = query_mock(
        &mut server,
        &[("action", "query"), ("list", "categorymembers")],
        r#"{
            "continue": {"cmcontinue": "page|X", "continue": "-||"},
            "query": {"categorymembers": [
                {"pageid": 10, "ns": 14, "title": "Category:One"}
            ]}
        }"#,
    ).await;
    let _second = query_mock(
        &mut server,
        &[("action", "query"), ("cmcontinue", "page|X")],
        r#"{
            "query": {"categorymembers": [
                {"pageid": 11, "ns": 0, "title": "Member page"}
            ]}
        }"#,
    ).await;

    let (client, _downloader, _dir) = client_for(&server).await;
    let members = client.get_sub_categories("Category:Root").await.unwrap();
    first.assert_async().await;
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].title, "Category:One");
    assert_eq!(members[1].ns, 0);
}

#[tokio::test]
async fn backlink_redirects_are_listed() {
    let mut server = mockito::Server::new_async().await;
    let _m = query_mock(
        &mut server,
        &[("action", "query"), ("list", "backlinks")],
        r#"{"query": {"backlinks": [
            {"pageid": 5, "ns": 0, "title": "Old name", "redirect": ""}
        ]}}"#,
    ).await;

    let (client, _downloader, _dir) = client_for(&server).await;
    let redirects = client.get_backlink_redirects("London").await.unwrap();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].title, "Old name");
}
