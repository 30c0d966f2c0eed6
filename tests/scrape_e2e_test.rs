//! End-to-end scrape against a mocked wiki: enumeration from an article
//! list, the REST render path, module and asset fetching, media download,
//! failure accounting and redirect entries.

use std::sync::Arc;

use mockito::Matcher;
use wikiscrape::archive::testing::MemoryWriter;
use wikiscrape::{ScrapeConfigBuilder, Scraper};

fn api_matcher(pairs: &[(&str, &str)]) -> Matcher {
    Matcher::AllOf(
        pairs
            .iter()
            .map(|(k, v)| Matcher::UrlEncoded((*k).into(), (*v).into()))
            .collect(),
    )
}

async fn mock_wiki(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();

    // Site info.
    mocks.push(
        server
            .mock("GET", "/w/api.php")
            .match_query(api_matcher(&[("action", "query"), ("meta", "siteinfo")]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"query": {
                    "general": {"mainpage": "Main Page", "sitename": "Test Wiki",
                                "lang": "en", "articlepath": "/wiki/$1"},
                    "namespaces": {"0": {"id": 0, "*": "", "content": ""}},
                    "namespacealiases": []
                }}"#,
            )
            .create_async()
            .await,
    );

    // REST probe succeeds; the VE probe is left unmatched and fails.
    mocks.push(
        server
            .mock("GET", "/api/rest_v1/page/mobile-sections/Main_Page")
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await,
    );

    // Enumeration of the article list.
    mocks.push(
        server
            .mock("GET", "/w/api.php")
            .match_query(api_matcher(&[
                ("action", "query"),
                ("titles", "London|Ghost"),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"query": {"pages": {
                    "1": {"pageid": 1, "ns": 0, "title": "London",
                          "revisions": [{"revid": 11}],
                          "coordinates": [{"lat": 51.5074, "lon": -0.1278}]},
                    "2": {"pageid": 2, "ns": 0, "title": "Ghost",
                          "revisions": [{"revid": 22}]}
                }}}"#,
            )
            .create_async()
            .await,
    );

    // Redirect discovery: nothing by default, one redirect onto London.
    mocks.push(
        server
            .mock("GET", "/w/api.php")
            .match_query(api_matcher(&[("action", "query"), ("list", "backlinks")]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"query": {"backlinks": []}}"#)
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/w/api.php")
            .match_query(api_matcher(&[
                ("action", "query"),
                ("list", "backlinks"),
                ("bltitle", "London"),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"query": {"backlinks": [
                    {"pageid": 9, "ns": 0, "title": "Old London", "redirect": ""}
                ]}}"#,
            )
            .create_async()
            .await,
    );

    // Article render payloads.
    mocks.push(
        server
            .mock("GET", "/api/rest_v1/page/mobile-sections/London")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"lead": {"displaytitle": "London",
                             "sections": [{"text": "<p>London intro <img src=\"/media/Tower.png\" width=\"100\"></p>"}]},
                    "remaining": {"sections": [
                        {"id": 1, "toclevel": 1, "anchor": "History", "line": "History",
                         "text": "<p>Roman settlement.</p>"}
                    ]}}"#,
            )
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/api/rest_v1/page/mobile-sections/Ghost")
            .with_status(404)
            .expect(1)
            .create_async()
            .await,
    );

    // Module dependency probe for London.
    mocks.push(
        server
            .mock("GET", "/w/api.php")
            .match_query(api_matcher(&[("action", "parse"), ("page", "London")]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"parse": {
                    "modules": ["startup"],
                    "modulestyles": ["site.styles"],
                    "jsconfigvars": {"wgTitle": "London"}
                }}"#,
            )
            .create_async()
            .await,
    );

    // Module sources from load.php.
    mocks.push(
        server
            .mock("GET", "/w/load.php")
            .match_query(api_matcher(&[("modules", "startup"), ("only", "scripts")]))
            .with_body("var x;script=document.createElement('script');x();")
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/w/load.php")
            .match_query(api_matcher(&[
                ("modules", "site.styles"),
                ("only", "styles"),
            ]))
            .with_header("content-type", "text/css")
            .with_body(".site{}")
            .create_async()
            .await,
    );

    // Main page HTML for stylesheet discovery, the stylesheet itself,
    // the asset it references, and the favicon.
    mocks.push(
        server
            .mock("GET", "/wiki/Main_Page")
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><head>
                    <link rel="stylesheet" href="/w/load.php?only=styles&modules=skin">
                   </head><body></body></html>"#,
            )
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/w/load.php")
            .match_query(api_matcher(&[("only", "styles"), ("modules", "skin")]))
            .with_header("content-type", "text/css")
            .with_body("body { background: url(font.woff); }")
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/w/font.woff")
            .with_header("content-type", "font/woff")
            .with_body("woff-bytes")
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/favicon.ico")
            .with_header("content-type", "image/x-icon")
            .with_body("icon-bytes")
            .create_async()
            .await,
    );

    // The one media file the article depends on.
    mocks.push(
        server
            .mock("GET", "/media/Tower.png")
            .with_header("content-type", "image/png")
            .with_body("png-bytes")
            .create_async()
            .await,
    );

    mocks
}

#[tokio::test]
async fn full_scrape_produces_a_complete_archive() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = mock_wiki(&mut server).await;

    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("articles.txt");
    tokio::fs::write(&list, "London\nGhost\n").await.unwrap();

    let config = ScrapeConfigBuilder::new()
        .wiki_url(server.url())
        .output_dir(dir.path().join("out"))
        .cache_dir(dir.path().join("cache"))
        .admin_email("ops@example.org")
        .speed(1)
        .article_list(&list)
        .build()
        .unwrap();

    let writer = Arc::new(MemoryWriter::default());
    let scraper = Scraper::new(config, writer.clone()).await.unwrap();
    scraper.run().await.unwrap();

    // Scenario: one article archived, the 404 one only counted.
    let london = writer.get('A', "London").expect("London entry");
    let html = String::from_utf8(london.data.clone()).unwrap();
    assert!(html.contains("<title>London</title>"));
    assert!(html.contains("London intro"));
    assert!(html.contains("src=\"../I/Tower.png\""));
    assert!(html.contains("id=\"History\""));
    assert!(html.contains("geo.position"));
    assert!(html.contains("../-/mw/startup.js"));
    assert!(html.contains("../-/mw/site.styles.css"));
    assert!(html.contains("../-/mw/jsConfigVars.js"));
    assert!(html.contains("<!--htdig_noindex-->"));
    assert!(writer.get('A', "Ghost").is_none());

    let (article_ok, article_fail) = scraper.status().articles();
    assert_eq!((article_ok, article_fail), (1, 1));

    // Media and assets.
    assert_eq!(writer.get('I', "Tower.png").unwrap().data, b"png-bytes");
    assert_eq!(writer.get('-', "font.woff").unwrap().data, b"woff-bytes");
    let (file_ok, file_fail) = scraper.status().files();
    assert_eq!((file_ok, file_fail), (2, 0));

    // Modules, with the offline start-up hacks applied.
    let startup = writer.get('-', "mw/startup.js").expect("startup module");
    let startup_js = String::from_utf8(startup.data.clone()).unwrap();
    assert!(startup_js.contains("fireStartUp"));
    assert!(writer.get('-', "mw/site.styles.css").is_some());
    let vars = writer.get('-', "mw/jsConfigVars.js").expect("config vars");
    assert!(String::from_utf8(vars.data.clone()).unwrap().contains("wgTitle"));

    // The combined stylesheet has its url(...) references dereferenced.
    let style = writer.get('-', "style.css").expect("style.css");
    let css = String::from_utf8(style.data.clone()).unwrap();
    assert!(css.contains("url(\"font.woff\")"));

    // Favicon and metadata entries.
    assert_eq!(writer.get('-', "favicon").unwrap().data, b"icon-bytes");
    assert_eq!(writer.get('M', "Title").unwrap().data, b"Test Wiki");
    assert_eq!(writer.get('M', "Language").unwrap().data, b"eng");

    // The redirect onto London became an archive redirect.
    let redirects = writer.redirects.lock();
    assert!(
        redirects
            .iter()
            .any(|r| r.url == "Old_London" && r.target_url == "London")
    );
    drop(redirects);

    assert!(*writer.finalized.lock());
}
