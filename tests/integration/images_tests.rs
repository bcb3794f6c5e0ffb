use crate::common::fast_reveal;
use backscroll::collector::ImageUrlExtractor;
use backscroll::config::{Config, FetchConfig, ImagesConfig};
use backscroll::driver::{HtmlSnapshotDriver, RevealSelectors};
use backscroll::fetch::{AssetFetchPool, HttpFetcher};
use backscroll::output::AssetDirectoryWriter;
use backscroll::session::NoSession;
use backscroll::{CrashSafePersister, DedupStore, Harvest, RecordKind};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn images_config() -> ImagesConfig {
    ImagesConfig {
        scroll_container: "div.scroll".to_string(),
        trigger: "div.trigger".to_string(),
        ready: "div.msg".to_string(),
        image: "img".to_string(),
        text_container: "div.msg".to_string(),
        ..Config::default().images
    }
}

fn image_page(body: &str) -> String {
    format!(
        r#"<html><body><div class="scroll"><div class="trigger"></div>{}</div></body></html>"#,
        body
    )
}

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn pool(timeout: Duration) -> AssetFetchPool<HttpFetcher> {
    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    AssetFetchPool::new(Arc::new(fetcher), Arc::new(DedupStore::new()), 4, timeout)
}

#[tokio::test]
async fn test_images_are_collected_and_downloaded_once_per_content() {
    let server = MockServer::start().await;
    let cat = vec![0x89u8, b'P', b'N', b'G', 1, 2, 3];
    serve(&server, "/cat.png", ResponseTemplate::new(200).set_body_bytes(cat.clone())).await;
    serve(&server, "/cat-copy.png", ResponseTemplate::new(200).set_body_bytes(cat)).await;
    serve(
        &server,
        "/dog.jpg",
        ResponseTemplate::new(200).set_body_bytes(vec![0xffu8, 0xd8, 9]),
    )
    .await;
    serve(&server, "/gone.gif", ResponseTemplate::new(404)).await;

    let base = server.uri();
    let newest = format!(r#"<div class="msg"><img src="{}/cat.png"></div>"#, base);
    let older = format!(
        r#"<div class="msg"><img src="data:image/png;base64,AAAA"><img src="{base}/cat-copy.png">
           see {base}/dog.jpg and {base}/gone.gif</div>{newest}"#,
        base = base,
        newest = newest
    );
    let config = images_config();
    let mut driver = HtmlSnapshotDriver::new(
        vec![image_page(&newest), image_page(&older)],
        RevealSelectors::infinite_scroll(&config.scroll_container, &config.trigger),
    );
    let mut extractor = ImageUrlExtractor::new(&config);

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("images");
    let writer = AssetDirectoryWriter::new(pool(Duration::from_secs(5)));
    let persister = CrashSafePersister::new(Box::new(writer), &output);

    let report = Harvest::new("https://poe.com/chat/abc", fast_reveal(2))
        .wait_for_ready(&config.ready, Duration::from_secs(1))
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.kind, RecordKind::ImageAsset);
    assert_eq!(report.collected, 4);
    // cat.png and cat-copy.png share bytes; gone.gif is a 404
    assert_eq!(report.saved, 2);

    let mut names: Vec<String> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.starts_with("image_")));
    assert!(names.iter().any(|n| n.ends_with(".png")));
    assert!(names.iter().any(|n| n.ends_with(".jpg")));
}

#[tokio::test]
async fn test_slow_asset_does_not_block_the_rest() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/slow.png",
        ResponseTemplate::new(200)
            .set_body_bytes(vec![1u8])
            .set_delay(Duration::from_secs(10)),
    )
    .await;
    serve(&server, "/fast.png", ResponseTemplate::new(200).set_body_bytes(vec![2u8])).await;

    let dir = TempDir::new().unwrap();
    let urls = vec![
        format!("{}/slow.png", server.uri()),
        format!("{}/fast.png", server.uri()),
    ];

    let summary = pool(Duration::from_millis(300))
        .fetch_all(&urls, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.files.len(), 1);
    assert!(summary.files[0].to_string_lossy().ends_with(".png"));
}
