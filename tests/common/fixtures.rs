//! A small mock of the harvested site
//!
//! Layout served by [`mount_site`]:
//!
//! - `/` home page with the three categories in its navigation bar
//! - `/programming/` one article; `/design/` an empty article listing
//! - `/questions/programming/` two listing pages with one question each
//! - `/files/books/` one PDF document
//!
//! Detail pages, the PDF and every image are mounted with `expect(1)`: a
//! second harvest over the same data directory must not request them again.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Smallest byte sequence the tests treat as a PNG
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Body of the mock PDF
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%mock\n";

pub const ARTICLES_ANCHOR: &str = "دروس ومقالات";
pub const QUESTIONS_ANCHOR: &str = "أسئلة وأجوبة";
pub const DOCUMENTS_ANCHOR: &str = "كتب وملفات";

pub fn home_page() -> String {
    format!(
        r##"<html><body><nav><ul data-role="primaryNavBar">
            <li><a href="/articles/">{ARTICLES_ANCHOR}</a>
                <ul>
                    <li><a href="/programming/">برمجة</a></li>
                    <li><a href="/design/">تصميم</a></li>
                    <li><a href="#">المزيد</a></li>
                </ul>
            </li>
            <li><a href="/questions/">{QUESTIONS_ANCHOR}</a>
                <ul><li><a href="/questions/programming/">أسئلة البرمجة</a></li></ul>
            </li>
            <li><a href="/files/">{DOCUMENTS_ANCHOR}</a>
                <ul><li><a href="/files/books/">كتب</a></li></ul>
            </li>
        </ul></nav></body></html>"##
    )
}

pub fn article_listing(server: &MockServer) -> String {
    let uri = server.uri();
    format!(
        r#"<html><body><div id="elCmsPageWrap">
            <article>
                <img src="{uri}/thumbs/article.png">
                <h2><a href="{uri}/tags/python/">python</a> <a href="{uri}/articles/1/">Intro to Python</a></h2>
                <a href="{uri}/profile/1/">Ahmad</a>
                <section>A first look at Python</section>
            </article>
        </div></body></html>"#
    )
}

pub fn empty_article_listing() -> String {
    r#"<html><body><div id="elCmsPageWrap"></div></body></html>"#.to_string()
}

pub fn article_page() -> String {
    r#"<html><body><header>site header</header><article>
        <h1>Intro to Python</h1>
        <p>Python reads like prose.</p>
        <img src="/uploads/snake.png">
        <a href="https://www.youtube.com/watch?v=abc123">watch on YouTube</a>
        <iframe src="https://www.youtube.com/embed/def456?feature=oembed"></iframe>
    </article></body></html>"#
        .to_string()
}

pub fn question_listing(server: &MockServer, n: u32, last_page: u32) -> String {
    format!(
        r#"<html><body>
            <ul class="ipsPagination"><li class="ipsPagination_pageJump"><input type="number" min="1" max="{last_page}"></li></ul>
            <ol><li class="cForumQuestion"><div>3</div><div><h4><a href="{uri}/questions/{n}/">Question {n}</a></h4><a href="{uri}/profile/{n}/">user{n}</a></div></li></ol>
        </body></html>"#,
        uri = server.uri()
    )
}

pub fn question_page(n: u32) -> String {
    format!(
        r#"<html><body>
            <article><p>How do I do thing {n}?</p><button>Reply</button></article>
            <article><p>Like this.</p></article>
        </body></html>"#
    )
}

pub fn document_listing(server: &MockServer) -> String {
    let uri = server.uri();
    format!(
        r#"<html><body><ol class="ipsDataList"><li class="ipsDataItem">
            <div><a href="{uri}/files/1/" style="background-image: url('{uri}/thumbs/book.png')"></a></div>
            <div>
                <h4><a href="{uri}/files/1/">Python Guide</a></h4>
                <div>The complete guide</div>
                <a href="{uri}/profile/2/">Sara</a>
            </div>
        </li></ol></body></html>"#
    )
}

pub fn document_page() -> String {
    r#"<html><body><main>Python Guide</main><aside><a href="/download/1/">Download</a></aside></body></html>"#.to_string()
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_once(server: &MockServer, route: &str, response: ResponseTemplate, strict: bool) {
    let mock = Mock::given(method("GET")).and(path(route)).respond_with(response);
    let mock = if strict { mock.expect(1) } else { mock };
    mock.named(route).mount(server).await;
}

/// Mount the whole mock site
pub async fn mount_site(server: &MockServer) {
    mount(server, true).await;
}

/// Mount the site without the serve-once expectations
///
/// For tests that shadow some routes with higher-priority mocks.
pub async fn mount_site_without_expectations(server: &MockServer) {
    mount(server, false).await;
}

async fn mount(server: &MockServer, strict: bool) {
    mount_page(server, "/support/styles.css", "body { direction: rtl; }".into()).await;
    mount_page(server, "/support/scripts.js", "// scripts".into()).await;
    mount_page(server, "/", home_page()).await;

    // Listings are requested again on every run
    mount_page(server, "/programming/", article_listing(server)).await;
    mount_page(server, "/design/", empty_article_listing()).await;
    Mock::given(method("GET"))
        .and(path("/questions/programming/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(question_listing(server, 2, 2)))
        .with_priority(1)
        .mount(server)
        .await;
    mount_page(server, "/questions/programming/", question_listing(server, 1, 2)).await;
    mount_page(server, "/files/books/", document_listing(server)).await;

    let html = |body: String| ResponseTemplate::new(200).set_body_string(body);
    let png = || {
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/png")
            .set_body_bytes(PNG_BYTES.to_vec())
    };
    mount_once(server, "/articles/1/", html(article_page()), strict).await;
    mount_once(server, "/questions/1/", html(question_page(1)), strict).await;
    mount_once(server, "/questions/2/", html(question_page(2)), strict).await;
    mount_once(server, "/files/1/", html(document_page()), strict).await;
    mount_once(
        server,
        "/download/1/",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .insert_header("content-disposition", r#"attachment; filename="python guide.pdf""#)
            .set_body_bytes(PDF_BYTES.to_vec()),
        strict,
    )
    .await;
    mount_once(server, "/uploads/snake.png", png(), strict).await;
    mount_once(server, "/thumbs/article.png", png(), strict).await;
    mount_once(server, "/thumbs/book.png", png(), strict).await;
    mount_once(server, "/thumbs/site.png", png(), strict).await;
}
