mod common;

use common::{pattern, CountingFs, RecordingSink};
use std::io::ErrorKind;

use http::{header, Request, StatusCode};
use staticfile_stream::{
    stream, FileReference, ResolveResult, Resolver, ServeDir, Served, TransferError,
    TransferOutcome,
};

const ROOT: &str = "/srv/public";
const FILE: &str = "/srv/public/big.bin";

async fn file_ref(fs: &CountingFs) -> FileReference {
    let resolver = Resolver::with_vfs(ROOT, fs.clone()).unwrap();
    match resolver.resolve("/big.bin").await.unwrap() {
        ResolveResult::Found(file) => file,
        other => panic!("unexpected resolve result: {:?}", other),
    }
}

#[tokio::test]
async fn streams_whole_file_without_backpressure() {
    let data = pattern(100_000);
    let fs = CountingFs::new(FILE, data.clone());
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    assert_eq!(sink.body, data);
    assert_eq!(sink.writable_polls, 0);
    assert_eq!(fs.opens(), 1);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn delivers_in_order_through_per_call_limit() {
    let data = pattern(100_000);
    let fs = CountingFs::new(FILE, data.clone());
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::with_limit(3_000);
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    assert_eq!(sink.offset, 100_000);
    assert_eq!(sink.body.len(), data.len());
    assert!(sink.body == data, "body bytes out of order");
    assert!(sink.writable_polls > 0);
    assert_eq!(sink.writes_after_complete, 0);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn retries_only_unacknowledged_tail() {
    // One chunk larger than the limit: every retry must continue where the sink left off.
    let data = pattern(1_000);
    let fs = CountingFs::new(FILE, data.clone());
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::with_limit(300);
    stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(sink.writes, 4);
    assert_eq!(sink.body, data);
}

#[tokio::test]
async fn abort_releases_source_once_and_stops_writing() {
    let fs = CountingFs::new(FILE, pattern(100_000));
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::with_limit(3_000);
    sink.abort_after_writes = Some(2);
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Aborted);
    assert_eq!(sink.writes, 2);
    assert_eq!(sink.writes_after_abort, 0);
    assert_eq!(fs.opens(), 1);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn abort_before_first_poll_never_opens() {
    let fs = CountingFs::new(FILE, pattern(10));
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    sink.aborted = true;
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Aborted);
    assert_eq!(sink.writes, 0);
    assert_eq!(fs.opens(), 0);
    assert_eq!(fs.drops(), 0);
}

#[tokio::test]
async fn read_error_releases_source() {
    let mut fs = CountingFs::new(FILE, pattern(100_000));
    fs.fail_after = Some(8 * 1024);
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    let err = stream(&mut sink, &fs, &file).await.unwrap_err();

    assert!(matches!(err, TransferError::Read(_)), "{:?}", err);
    assert_eq!(sink.body.len(), 8 * 1024);
    assert!(!sink.complete);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn shrunken_file_is_unexpected_eof() {
    let mut fs = CountingFs::new(FILE, pattern(1_000));
    fs.announced_size = Some(5_000);
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    let err = stream(&mut sink, &fs, &file).await.unwrap_err();

    match err {
        TransferError::UnexpectedEof { expected, read } => {
            assert_eq!(expected, 5_000);
            assert_eq!(read, 1_000);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn grown_file_is_cut_at_announced_size() {
    let data = pattern(20_000);
    let mut fs = CountingFs::new(FILE, data.clone());
    fs.announced_size = Some(10_000);
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    assert_eq!(sink.body, &data[..10_000]);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn sink_completing_early_ends_transfer() {
    let fs = CountingFs::new(FILE, pattern(100_000));
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    sink.complete_after_writes = Some(1);
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    assert_eq!(sink.writes, 1);
    assert_eq!(sink.body.len(), 8 * 1024);
    assert_eq!(fs.opens(), 1);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn empty_file_completes_without_opening() {
    let fs = CountingFs::new(FILE, Vec::new());
    let file = file_ref(&fs).await;

    let mut sink = RecordingSink::new();
    let outcome = stream(&mut sink, &fs, &file).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    assert_eq!(sink.writes, 1);
    assert!(sink.complete);
    assert_eq!(fs.opens(), 0);
}

#[tokio::test]
async fn transfer_failure_terminates_without_new_status() {
    let mut fs = CountingFs::new(FILE, pattern(100_000));
    fs.fail_after = Some(16 * 1024);
    let serve_dir = ServeDir::with_vfs(ROOT, fs.clone()).unwrap();

    let req = Request::get("/big.bin").body(()).unwrap();
    let mut sink = RecordingSink::new();
    let served = serve_dir.serve(&req, &mut sink).await;

    assert_eq!(served, Served::Terminated);
    assert!(sink.terminated);
    assert_eq!(sink.status, Some(StatusCode::OK));
    assert_eq!(sink.body.len(), 16 * 1024);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn aborted_request_is_reported() {
    let fs = CountingFs::new(FILE, pattern(100_000));
    let serve_dir = ServeDir::with_vfs(ROOT, fs.clone()).unwrap();

    let req = Request::get("/big.bin").body(()).unwrap();
    let mut sink = RecordingSink::with_limit(1_000);
    sink.abort_after_writes = Some(5);
    let served = serve_dir.serve(&req, &mut sink).await;

    assert_eq!(
        served,
        Served::Streamed(StatusCode::OK, TransferOutcome::Aborted)
    );
    assert!(!sink.terminated);
    assert_eq!(sink.writes_after_abort, 0);
    assert_eq!(fs.drops(), 1);
}

#[tokio::test]
async fn open_failure_is_internal_error() {
    let mut fs = CountingFs::new(FILE, pattern(10));
    fs.open_error = Some(ErrorKind::PermissionDenied);
    let serve_dir = ServeDir::with_vfs(ROOT, fs.clone()).unwrap();

    let req = Request::get("/big.bin").body(()).unwrap();
    let mut sink = RecordingSink::new();
    let served = serve_dir.serve(&req, &mut sink).await;

    assert_eq!(served, Served::Ended(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        sink.header(header::CONTENT_TYPE),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(sink.body, b"failed to open file: access denied");
    assert!(!sink.terminated);
    assert_eq!(sink.writes, 0);
}

#[tokio::test]
async fn read_failure_before_body_is_internal_error() {
    let mut fs = CountingFs::new(FILE, pattern(100_000));
    fs.fail_after = Some(0);
    let serve_dir = ServeDir::with_vfs(ROOT, fs.clone()).unwrap();

    let req = Request::get("/big.bin").body(()).unwrap();
    let mut sink = RecordingSink::new();
    let served = serve_dir.serve(&req, &mut sink).await;

    assert_eq!(served, Served::Ended(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(!sink.terminated);
    assert_eq!(fs.drops(), 1);
}
