//! End-to-end retrieval tests: a real server on an ephemeral port,
//! driven by the client pipeline exactly as the UI would drive it.

mod common;

use bytes::Bytes;
use futures::FutureExt;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use common::{TestApp, test_app_with_ttl, token_for};
use study_share::client::{
    AccessClient, AccessParams, PreviewSurface, RendererLoader, Retriever, RetrievalError,
};
use study_share::models::record::{Bucket, RecordStatus};
use study_share::routes::routes::routes;
use study_share::validation::ValidatedUpload;

const PDF_BYTES: &[u8] = b"%PDF-1.7 exam content";

/// Bind an ephemeral port, build the app against it, and serve.
async fn launch(url_ttl_secs: i64) -> (TestApp, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = test_app_with_ttl(&base, url_ttl_secs).await;
    let router = routes().with_state(app.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    (app, base)
}

async fn seed_payload(app: &TestApp, path: &str, content_type: &str) {
    app.state
        .storage
        .put_object_stream(
            Bucket::Papers,
            path,
            Some(content_type.to_string()),
            futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(PDF_BYTES))]),
        )
        .await
        .expect("seed payload");
}

async fn seed_record(app: &TestApp, owner: &str, path: &str) -> String {
    app.state
        .records
        .create(
            Bucket::Papers,
            owner,
            ValidatedUpload {
                title: "Advanced Calculus Final".into(),
                subject: "Mathematics".into(),
                level: "Undergraduate".into(),
                university: None,
                year: Some(2024),
                description: None,
                chapter_topic: None,
                file_path: path.into(),
            },
        )
        .await
        .expect("seed record")
        .id
}

async fn approve(app: &TestApp, id: &str) {
    app.state
        .records
        .set_status(Bucket::Papers, id, RecordStatus::Approved)
        .await
        .expect("approve record");
}

fn params(id: &str, path: &str) -> AccessParams {
    AccessParams {
        bucket: Bucket::Papers,
        file_path: path.into(),
        item_id: id.into(),
    }
}

#[tokio::test]
async fn preview_and_download_an_approved_record() {
    let (app, base) = launch(3600).await;
    seed_payload(&app, "u1/123_exam.pdf", "application/pdf").await;
    let id = seed_record(&app, "u1", "u1/123_exam.pdf").await;
    approve(&app, &id).await;

    // Anonymous client: approved content needs no credentials.
    let retriever = Retriever::new(AccessClient::new(&base));
    let mut surface = PreviewSurface::new();
    let p = params(&id, "u1/123_exam.pdf");

    // Repeated preview cycles never accumulate byte objects.
    for _ in 0..3 {
        retriever
            .preview_inline(&mut surface, &p, "Advanced Calculus Final")
            .await
            .expect("preview");
        assert_eq!(retriever.blobs().outstanding(), 1);
        let content = surface.content().expect("content presented");
        assert_eq!(&content.bytes()[..], PDF_BYTES);
        assert_eq!(content.content_type(), "application/pdf");

        surface.close();
        assert_eq!(retriever.blobs().outstanding(), 0);
    }

    let state = retriever.state().borrow().clone();
    assert!(!state.loading);
    assert_eq!(state.error, None);

    let progress = *retriever.progress().borrow();
    assert_eq!(progress.received, PDF_BYTES.len() as u64);
    assert_eq!(progress.total, Some(PDF_BYTES.len() as u64));

    // Download saves the bytes and reports exactly one increment.
    let dest = tempfile::tempdir().unwrap();
    let saved = retriever
        .download_to_disk(&p, dest.path(), "Advanced Calculus Final.pdf")
        .await
        .expect("download");
    assert_eq!(std::fs::read(&saved).unwrap(), PDF_BYTES);
    assert_eq!(retriever.blobs().outstanding(), 0);

    let record = app.state.records.fetch(Bucket::Papers, &id).await.unwrap();
    assert_eq!(record.downloads, 1);

    retriever
        .download_to_disk(&p, dest.path(), "again.pdf")
        .await
        .expect("second download");
    let record = app.state.records.fetch(Bucket::Papers, &id).await.unwrap();
    assert_eq!(record.downloads, 2);
}

#[tokio::test]
async fn denials_surface_the_server_message_verbatim() {
    let (app, base) = launch(3600).await;
    seed_payload(&app, "u1/123_exam.pdf", "application/pdf").await;
    let id = seed_record(&app, "u1", "u1/123_exam.pdf").await;
    // Left pending on purpose.

    let retriever = Retriever::new(AccessClient::new(&base));
    let mut surface = PreviewSurface::new();
    let p = params(&id, "u1/123_exam.pdf");

    let err = retriever
        .preview_inline(&mut surface, &p, "Exam")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "This file is not available for public access"
    );
    assert!(!surface.is_open());
    assert_eq!(retriever.blobs().outstanding(), 0);
    assert_eq!(
        retriever.state().borrow().error.as_deref(),
        Some("This file is not available for public access")
    );

    // The owner, with a bearer token, gets through.
    let owner = Retriever::new(AccessClient::new(&base).with_bearer(token_for(&app, "u1")));
    owner
        .preview_inline(&mut surface, &p, "Exam")
        .await
        .expect("owner preview");
    surface.close();

    // A mismatched path shows inline in a fresh viewer context.
    let bad = params(&id, "u1/other.pdf");
    let context = retriever.open_in_new_context(&bad, "Exam").await;
    assert!(!context.is_blank());
    assert_eq!(context.error(), Some("File path mismatch"));
    assert_eq!(retriever.blobs().outstanding(), 0);
}

#[tokio::test]
async fn expired_signed_urls_fail_the_byte_fetch() {
    // TTL in the past: the broker authorizes but the minted URL is dead.
    let (app, base) = launch(-5).await;
    seed_payload(&app, "u1/123_exam.pdf", "application/pdf").await;
    let id = seed_record(&app, "u1", "u1/123_exam.pdf").await;
    approve(&app, &id).await;

    let retriever = Retriever::new(AccessClient::new(&base));
    let mut surface = PreviewSurface::new();

    let err = retriever
        .preview_inline(&mut surface, &params(&id, "u1/123_exam.pdf"), "Exam")
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::FetchFailed(403)));
    assert_eq!(err.to_string(), "Failed to download file (403)");
    assert_eq!(retriever.blobs().outstanding(), 0);
}

#[tokio::test]
async fn renderer_module_is_fetched_once_across_previews() {
    let (app, base) = launch(3600).await;
    // Stored without a PDF content type; the renderer sniffs it.
    seed_payload(&app, "u1/123_exam.pdf", "application/octet-stream").await;
    let id = seed_record(&app, "u1", "u1/123_exam.pdf").await;
    approve(&app, &id).await;

    let fetches = Arc::new(AtomicUsize::new(0));
    let fetches_in = fetches.clone();
    let loader = Arc::new(RendererLoader::new(Arc::new(move || {
        let fetches = fetches_in.clone();
        async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"renderer-module"))
        }
        .boxed()
    })));

    let retriever = Retriever::new(AccessClient::new(&base)).with_renderer(loader);
    let mut surface = PreviewSurface::new();
    let p = params(&id, "u1/123_exam.pdf");

    for _ in 0..3 {
        retriever
            .preview_inline(&mut surface, &p, "Exam")
            .await
            .expect("preview");
        assert_eq!(
            surface.content().unwrap().content_type(),
            "application/pdf"
        );
        surface.close();
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}
