use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use toon_corpus::config::{Layout, StudyGroup, TitleEntry};
use toon_corpus::extract::Extraction;
use toon_corpus::header::HeaderSet;
use toon_corpus::ocr::Ocr;
use toon_corpus::process::{Pipeline, TitleOutcome};
use toon_corpus::request::{fetch_episode_images, ImageFetch};
use toon_corpus::{Error, Result};
use url::Url;

const TITLE: &str = "소꿉친구 컴플렉스";

/// Serves a fake webtoon site:
/// - `/webtoon/detail?titleId=T&no=N` has images `/img/T/N/p_1.jpg` and `/img/T/N/p_2.jpg`
/// - title 1, episode 2 also references `/img/missing/x.jpg`, which is a 404
/// - title 1, episode 3 has an empty viewer
/// - title 2, episode 2 answers its first page request with a 500, later ones normally
/// - an image body is its own `T/N/name` path plus a newline, p_2 is referenced relatively
struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}", server.server_addr());
        let hits = Arc::new(AtomicUsize::new(0));
        let flaky_requests = AtomicUsize::new(0);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn({
            let hits = hits.clone();
            move || loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                hits.fetch_add(1, Ordering::SeqCst);

                let (status, body) = route(request.url(), &flaky_requests);
                let _ = request
                    .respond(tiny_http::Response::from_data(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    fn latest(&self, title_id: u32, no: u32) -> String {
        format!(
            "{}/webtoon/detail?titleId={title_id}&no={no}",
            self.base_url
        )
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn route(raw_url: &str, flaky_requests: &AtomicUsize) -> (u16, Vec<u8>) {
    let url = Url::parse(&format!("http://localhost{raw_url}")).unwrap();
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if url.path() == "/webtoon/detail" {
        let title_id = query["titleId"].as_str();
        let no = query["no"].as_str();
        let html = match (title_id, no) {
            ("2", "2") if flaky_requests.fetch_add(1, Ordering::SeqCst) == 0 => {
                return (500, b"internal error".to_vec())
            }
            ("1", "3") => r#"<div class="wt_viewer"></div>"#.to_string(),
            ("1", "2") => r#"<div class="wt_viewer">
                    <img src="/img/1/2/p_1.jpg">
                    <img src="/img/missing/x.jpg">
                    <img src="/img/1/2/p_2.jpg">
                </div>"#
                .to_string(),
            (t, n) => format!(
                r#"<html><body><img src="/img/logo.png">
                <div class="wt_viewer">
                    <img src="/img/{t}/{n}/p_1.jpg">
                    <img src="../img/{t}/{n}/p_2.jpg?type=q90">
                </div></body></html>"#
            ),
        };
        return (200, html.into_bytes());
    }

    match url.path().strip_prefix("/img/") {
        Some(rest) if !rest.starts_with("missing/") => (200, format!("{rest}\n").into_bytes()),
        _ => (404, b"not found".to_vec()),
    }
}

/// "Recognizes" an image by returning its bytes as text, counting calls.
#[derive(Clone, Default)]
struct EchoOcr {
    calls: Arc<AtomicUsize>,
}

impl Ocr for EchoOcr {
    fn recognize(&self, image: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(std::fs::read_to_string(image)?)
    }
}

fn episode_text(title_id: u32, no: u32) -> String {
    match (title_id, no) {
        (1, 3) => String::new(),
        (t, n) => format!("{t}/{n}/p_1.jpg\n{t}/{n}/p_2.jpg\n"),
    }
}

fn pipeline(root: &Path, ocr: EchoOcr) -> Pipeline {
    Pipeline::new(
        reqwest::Client::new(),
        HeaderSet::default(),
        ocr,
        Layout::under(root),
        4,
    )
}

#[tokio::test]
async fn fetcher_keeps_going_after_a_failed_image() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let layout = Layout::under(tmp.path());
    let page = Url::parse(&server.latest(1, 2)).unwrap();

    let fetched = fetch_episode_images(
        &reqwest::Client::new(),
        &page,
        TITLE,
        &HeaderSet::default(),
        &layout,
    )
    .await
    .unwrap();

    assert_eq!(fetched.dir, layout.image_dir(TITLE, 2));
    assert_eq!(fetched.counts(), (2, 0, 1));
    assert!(matches!(
        &fetched.images[1],
        ImageFetch::Failed { src, reason: Error::Reqwest(_) } if src == "/img/missing/x.jpg"
    ));
    assert!(fetched.dir.join("p_1.jpg").exists());
    assert!(fetched.dir.join("p_2.jpg").exists());
    assert!(!fetched.dir.join("x.jpg").exists());

    // Same episode again: nothing new is downloaded, the failed image is retried.
    let again = fetch_episode_images(
        &reqwest::Client::new(),
        &page,
        TITLE,
        &HeaderSet::default(),
        &layout,
    )
    .await
    .unwrap();
    assert_eq!(again.counts(), (0, 2, 1));
}

#[tokio::test]
async fn episode_without_images_still_gets_a_text_file() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let ocr = EchoOcr::default();
    let pipeline = pipeline(tmp.path(), ocr.clone());
    let page = Url::parse(&server.latest(1, 3)).unwrap();

    let extraction = pipeline.process_episode(&page, TITLE).await.unwrap();

    assert_eq!(
        extraction,
        Extraction::Written {
            path: tmp.path().join("text").join(TITLE).join("3.txt"),
            images: 0
        }
    );
    assert_eq!(std::fs::read(extraction.path()).unwrap(), b"");
    assert!(pipeline.layout().image_dir(TITLE, 3).is_dir());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn title_corpus_is_episode_texts_in_ascending_order() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(tmp.path(), EchoOcr::default());
    let entry = TitleEntry::new(TITLE, server.latest(1, 11));

    let outcome = pipeline.process_title(&entry, "male", 1).await.unwrap();

    let corpus_path = tmp.path().join("dataset/male").join(format!("001-{TITLE}.txt"));
    assert_eq!(
        outcome,
        TitleOutcome::Written {
            path: corpus_path.clone(),
            episodes: 11,
        }
    );

    let expected: String = (1..=11).map(|no| episode_text(1, no)).collect();
    let corpus = std::fs::read_to_string(&corpus_path).unwrap();
    assert_eq!(corpus, expected);

    let from_episode_files: String = (1..=11)
        .map(|no| {
            let path = tmp.path().join("text").join(TITLE).join(format!("{no}.txt"));
            std::fs::read_to_string(path).unwrap()
        })
        .collect();
    assert_eq!(corpus, from_episode_files);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let ocr = EchoOcr::default();
    let pipeline = pipeline(tmp.path(), ocr.clone());
    let entry = TitleEntry::new(TITLE, server.latest(1, 5));

    let first = pipeline.process_title(&entry, "female", 2).await.unwrap();
    let TitleOutcome::Written { path, .. } = first else {
        panic!("first run should write the corpus, got {first:?}");
    };
    let corpus = std::fs::read(&path).unwrap();
    let hits = server.hits();
    let ocr_calls = ocr.calls.load(Ordering::SeqCst);

    let second = pipeline.process_title(&entry, "female", 2).await.unwrap();

    assert_eq!(second, TitleOutcome::Skipped(path.clone()));
    assert_eq!(std::fs::read(&path).unwrap(), corpus);
    assert_eq!(server.hits(), hits);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), ocr_calls);
}

#[tokio::test]
async fn rerun_after_losing_the_corpus_reuses_episode_files() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let ocr = EchoOcr::default();
    let pipeline = pipeline(tmp.path(), ocr.clone());
    let entry = TitleEntry::new(TITLE, server.latest(1, 4));

    let TitleOutcome::Written { path, .. } =
        pipeline.process_title(&entry, "male", 1).await.unwrap()
    else {
        panic!("first run should write the corpus");
    };
    let corpus = std::fs::read(&path).unwrap();
    let ocr_calls = ocr.calls.load(Ordering::SeqCst);
    std::fs::write(&path, b"").unwrap();

    let again = pipeline.process_title(&entry, "male", 1).await.unwrap();

    assert!(matches!(again, TitleOutcome::Written { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), corpus);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), ocr_calls);
}

#[tokio::test]
async fn failed_episode_leaves_the_corpus_for_the_next_run() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let ocr = EchoOcr::default();
    let pipeline = pipeline(tmp.path(), ocr.clone());
    let entry = TitleEntry::new("flaky", server.latest(2, 3));
    let corpus_path = pipeline.layout().corpus_path("male", 7, "flaky");

    let first = pipeline.process_title(&entry, "male", 7).await.unwrap();

    assert_eq!(
        first,
        TitleOutcome::Incomplete {
            episodes: 3,
            failed_episodes: 1,
        }
    );
    assert!(!corpus_path.exists());
    let ocr_calls = ocr.calls.load(Ordering::SeqCst);
    assert_eq!(ocr_calls, 4);

    let second = pipeline.process_title(&entry, "male", 7).await.unwrap();

    assert_eq!(
        second,
        TitleOutcome::Written {
            path: corpus_path.clone(),
            episodes: 3,
        }
    );
    assert!(corpus_path.ends_with("dataset/male/007-flaky.txt"));
    assert_eq!(
        std::fs::read_to_string(&corpus_path).unwrap(),
        episode_text(2, 1) + &episode_text(2, 2) + &episode_text(2, 3)
    );
    // Only the episode that failed was OCRed again.
    assert_eq!(ocr.calls.load(Ordering::SeqCst), ocr_calls + 2);
}

#[tokio::test]
async fn run_numbers_titles_per_group() {
    let server = TestServer::spawn();
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(tmp.path(), EchoOcr::default());
    let groups = vec![
        StudyGroup {
            label: "male".into(),
            entries: vec![
                TitleEntry::new("A", server.latest(4, 1)),
                TitleEntry::new("B", server.latest(5, 2)),
            ],
        },
        StudyGroup {
            label: "female".into(),
            entries: vec![TitleEntry::new("C", server.latest(6, 1))],
        },
    ];

    pipeline.process_run(&groups).await.unwrap();

    let dataset = tmp.path().join("dataset");
    assert_eq!(
        std::fs::read_to_string(dataset.join("male/001-A.txt")).unwrap(),
        episode_text(4, 1)
    );
    assert_eq!(
        std::fs::read_to_string(dataset.join("male/002-B.txt")).unwrap(),
        episode_text(5, 1) + &episode_text(5, 2)
    );
    assert_eq!(
        std::fs::read_to_string(dataset.join("female/001-C.txt")).unwrap(),
        episode_text(6, 1)
    );
}

#[tokio::test]
async fn malformed_latest_reference_ends_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(tmp.path(), EchoOcr::default());
    let groups = vec![StudyGroup {
        label: "male".into(),
        entries: vec![TitleEntry::new(
            "A",
            "https://comic.naver.com/webtoon/detail?titleId=1",
        )],
    }];

    let err = pipeline.process_run(&groups).await.unwrap_err();
    assert!(matches!(err, Error::EpisodeParamMissing { .. }));
}
