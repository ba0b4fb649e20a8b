//! End-to-end relay tests against a scripted upstream.

mod common;

use common::{client, start_backend, start_proxy, MockResponse};
use reqwest::StatusCode;

fn hop_chain(redirects: usize) -> impl Fn(&common::MockRequest) -> MockResponse {
    move |req| {
        let n: usize = req
            .path()
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        if n < redirects {
            MockResponse::redirect(302, &format!("/utaipei/hop/{}", n + 1))
        } else {
            MockResponse::ok("text/plain", "done")
        }
    }
}

#[tokio::test]
async fn test_redirect_chain_below_limit_is_followed() {
    let backend = start_backend(hop_chain(4)).await;
    let proxy = start_proxy(&backend.url(), |c| c.upstream.max_redirects = 5).await;

    let res = client().get(proxy.url("/utaipei/hop/0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("location").is_none());
    assert_eq!(res.text().await.unwrap(), "done");
    assert_eq!(backend.request_count(), 5);
}

#[tokio::test]
async fn test_redirect_limit_is_a_bad_gateway() {
    let backend = start_backend(hop_chain(10)).await;
    let proxy = start_proxy(&backend.url(), |c| c.upstream.max_redirects = 3).await;

    let res = client().get(proxy.url("/utaipei/hop/0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn test_one_redirect_short_of_limit_succeeds() {
    let backend = start_backend(hop_chain(3)).await;
    let proxy = start_proxy(&backend.url(), |c| c.upstream.max_redirects = 4).await;

    let res = client().get(proxy.url("/utaipei/hop/0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "done");
    assert_eq!(backend.request_count(), 4);
}

#[tokio::test]
async fn test_redirects_equal_to_limit_fail() {
    let backend = start_backend(hop_chain(4)).await;
    let proxy = start_proxy(&backend.url(), |c| c.upstream.max_redirects = 4).await;

    let res = client().get(proxy.url("/utaipei/hop/0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.request_count(), 4);
}

#[tokio::test]
async fn test_see_other_downgrades_post_to_get() {
    let backend = start_backend(|req| match req.path() {
        "/utaipei/submit" => MockResponse::redirect(303, "/utaipei/result"),
        _ => MockResponse::ok("text/plain", "ok"),
    })
    .await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client()
        .post(proxy.url("/utaipei/submit"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("user=a&pass=b")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, b"user=a&pass=b");
    assert_eq!(requests[1].method, "GET");
    assert!(requests[1].body.is_empty());
    assert!(requests[1].header("content-type").is_none());
}

#[tokio::test]
async fn test_temporary_redirect_replays_body() {
    let backend = start_backend(|req| match req.path() {
        "/utaipei/submit" => MockResponse::redirect(307, "/utaipei/again"),
        _ => MockResponse::ok("text/plain", "ok"),
    })
    .await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    client()
        .post(proxy.url("/utaipei/submit"))
        .body("payload")
        .send()
        .await
        .unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].body, b"payload");
}

#[tokio::test]
async fn test_redirect_without_location_is_masked() {
    let backend = start_backend(|_| MockResponse::new(302).body("moved")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/x.jsp")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("location").is_none());
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_session_cookie_survives_redirect_hops() {
    let backend = start_backend(|req| match req.path() {
        "/utaipei/login" => MockResponse::redirect(302, "/utaipei/home")
            .header("Set-Cookie", "JSESSIONID=abc123; Path=/utaipei; HttpOnly"),
        _ => MockResponse::ok("text/plain", "home"),
    })
    .await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let requests = backend.requests();
    let cookie = requests[1].header("cookie").unwrap_or_default();
    assert!(cookie.contains("JSESSIONID=abc123"), "cookie header was {:?}", cookie);
}

#[tokio::test]
async fn test_terminal_set_cookie_is_translated() {
    let backend = start_backend(|_| {
        MockResponse::ok("text/plain", "ok")
            .header("Set-Cookie", "JSESSIONID=1; path=/utaipei; Secure; HttpOnly")
    })
    .await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/a.jsp")).send().await.unwrap();
    let cookies: Vec<_> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["JSESSIONID=1; Path=/; HttpOnly; SameSite=Lax"]);
}

#[tokio::test]
async fn test_html_is_retargeted_and_injected() {
    let backend = start_backend(|req| {
        let upstream = format!("http://{}", req.header("host").unwrap_or_default());
        MockResponse::ok(
            "text/html; charset=utf-8",
            format!(
                "<html><head><title>t</title></head><body oncontextmenu=\"return false\">\
                 <a href=\"{}/utaipei/next.jsp\">next</a></body></html>",
                upstream
            ),
        )
    })
    .await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/index.jsp")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["cache-control"],
        "no-cache, no-store, must-revalidate, private, max-age=0"
    );
    let length: usize = res.headers()["content-length"].to_str().unwrap().parse().unwrap();

    let body = res.text().await.unwrap();
    assert_eq!(body.len(), length);
    assert!(body.contains(&format!("{}/utaipei/next.jsp", proxy.origin())));
    assert!(!body.contains(&backend.addr.to_string()));
    assert!(body.contains("name=\"viewport\""));
    assert!(body.contains("<style"));
    assert!(!body.contains("oncontextmenu"));
}

#[tokio::test]
async fn test_favorite_page_is_not_rewritten() {
    let page = "<html><head></head><body><a href=\"http://example.invalid/x\">x</a></body></html>";
    let backend = start_backend(move |_| MockResponse::ok("text/html", page)).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client()
        .get(proxy.url("/utaipei/favorite.jsp"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), page);
}

#[tokio::test]
async fn test_root_redirects_to_entry_document() {
    let backend = start_backend(|_| MockResponse::ok("text/plain", "unused")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/utaipei/index_sky.html");
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_preflight_is_answered_locally() {
    let backend = start_backend(|_| MockResponse::ok("text/plain", "unused")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, proxy.url("/utaipei/api"))
        .header("origin", "http://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "http://app.example");
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_a_bad_gateway() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);
    let proxy = start_proxy(&format!("http://{}", addr), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/a.jsp")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_parse_html_api() {
    let backend = start_backend(|_| MockResponse::ok("text/plain", "unused")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client()
        .post(proxy.url("/api/parse-html"))
        .json(&serde_json::json!({
            "htmlElements": [
                {"html": "<a onclick=\"of_display('Q01')\">課表查詢</a>"},
                {"html": "<a>no code</a>"}
            ],
            "type": "function"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({"items": [{"text": "課表查詢", "code": "Q01", "type": "function"}]})
    );
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_prefix_with_trailing_slash_is_relayed() {
    let backend = start_backend(|_| MockResponse::ok("text/plain", "index")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/utaipei/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "index");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path(), "/utaipei/");
}

#[tokio::test]
async fn test_unrouted_path_is_not_relayed() {
    let backend = start_backend(|_| MockResponse::ok("text/plain", "unused")).await;
    let proxy = start_proxy(&backend.url(), |_| {}).await;

    let res = client().get(proxy.url("/elsewhere/a.jsp")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(backend.request_count(), 0);
}
