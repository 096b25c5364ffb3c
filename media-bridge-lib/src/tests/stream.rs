use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::init_logger;
use super::mock::{MockStream, Read};
use crate::error::Error;
use crate::stream::{
    Chunk, Seeked, StreamReader, StreamState, Whence, AVIO_FLAG_READ, AVIO_FLAG_WRITE,
    AVSEEK_FORCE, AVSEEK_SIZE, SEEK_CUR, SEEK_END, SEEK_SET,
};
use crate::types::{NeverInterrupted, StreamConfig, DEFAULT_SEGMENT_SIZE};

const URI: &str = "https://cdn.example.com/v.mp4";

fn new_reader(mock: MockStream) -> StreamReader<MockStream> {
    StreamReader::new(mock, DEFAULT_SEGMENT_SIZE, NeverInterrupted).unwrap()
}

fn interruptible(mock: MockStream) -> (StreamReader<MockStream, Arc<AtomicBool>>, Arc<AtomicBool>) {
    let flag = Arc::new(AtomicBool::new(false));
    let reader = StreamReader::new(mock, DEFAULT_SEGMENT_SIZE, flag.clone()).unwrap();
    (reader, flag)
}

#[test]
fn test_open_forwards_options() {
    init_logger();
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    reader
        .open(URI, AVIO_FLAG_READ, &options! { "Range" => "bytes=0-" })
        .unwrap();

    assert_eq!(reader.state(), StreamState::Open);
    assert_eq!(reader.mime_type(), Some("video/mp4"));
    let log = log.borrow();
    assert_eq!(log.uri.as_deref(), Some(URI));
    assert_eq!(log.headers, Some(None));
    assert_eq!(
        log.open_map,
        Some(vec![("Range".to_string(), "bytes=0-".to_string())])
    );
    assert_eq!(log.new_buffer, 1);
}

#[test]
fn test_headers_reach_constructor() {
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    reader.set_headers(Some("Referer: https://example.com\r\n".to_string()));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    assert_eq!(
        log.borrow().headers,
        Some(Some("Referer: https://example.com\r\n".to_string()))
    );
}

#[test]
fn test_legacy_open_drops_map() {
    let (mut mock, log) = MockStream::new();
    mock.map_support = false;
    let mut reader = new_reader(mock);
    reader
        .open(URI, AVIO_FLAG_READ, &options! { "Range" => "bytes=0-" })
        .unwrap();
    let log = log.borrow();
    assert_eq!(log.open, 1);
    assert_eq!(log.open_map, None);
}

#[test]
fn test_unrepresentable_option_omitted() {
    let (mut mock, log) = MockStream::new();
    mock.unrepresentable = Some("bad\u{0}value".to_string());
    let mut reader = new_reader(mock);
    let opts = options! { "Range" => "bytes=0-", "Cookie" => "bad\u{0}value", "Accept" => "*/*" };
    reader.open(URI, AVIO_FLAG_READ, &opts).unwrap();
    assert_eq!(
        log.borrow().open_map,
        Some(vec![
            ("Range".to_string(), "bytes=0-".to_string()),
            ("Accept".to_string(), "*/*".to_string()),
        ])
    );
}

#[test]
fn test_read_is_one_bounded_call() {
    let (mock, log) = MockStream::new();
    let body: Vec<u8> = (0..20000u32).map(|i| (i % 256) as u8).collect();
    let mut reader = new_reader(mock.with_reads(vec![Read::Data(body.clone())]));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();

    let mut dst = vec![0u8; 20000];
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::Data(8192));
    assert_eq!(&dst[..8192], &body[..8192]);
    assert!(dst[8192..].iter().all(|b| *b == 0));
    let log = log.borrow();
    assert_eq!(log.read, 1);
    assert_eq!(log.read_lens, vec![8192]);
}

#[test]
fn test_short_read() {
    let (mock, _log) = MockStream::new();
    let mut reader = new_reader(mock.with_reads(vec![Read::Data(b"hello".to_vec())]));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    let mut dst = [0u8; 64];
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::Data(5));
    assert_eq!(&dst[..5], b"hello");
}

#[test]
fn test_end_of_stream_reads() {
    let (mock, _log) = MockStream::new();
    let mut reader = new_reader(mock.with_reads(vec![
        Read::Count(0),
        Read::Count(-1),
        Read::Raise,
        Read::Data(b"more".to_vec()),
    ]));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    let mut dst = [0u8; 16];
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::EndOfStream);
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::EndOfStream);
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::EndOfStream);
    // the stream stays open after an end-of-stream result
    assert_eq!(reader.state(), StreamState::Open);
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::Data(4));
}

#[test]
fn test_oversized_count_rejected() {
    let (mock, _log) = MockStream::new();
    let mut reader = new_reader(mock.with_reads(vec![Read::Count(100)]));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    let mut dst = [0u8; 10];
    assert!(matches!(reader.read(&mut dst), Err(Error::RemoteCall(_))));
}

#[test]
fn test_empty_read_skips_remote() {
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    assert_eq!(reader.read(&mut []).unwrap(), Chunk::Data(0));
    assert_eq!(log.borrow().read, 0);
}

#[test]
fn test_seek_results() {
    let (mut mock, log) = MockStream::new();
    mock.seeks = vec![Some(4096), Some(1_000_000), Some(-1), None].into();
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();

    assert_eq!(reader.seek(4096, Whence::Set).unwrap(), Seeked::Position(4096));
    assert_eq!(
        reader.seek(0, Whence::Size).unwrap(),
        Seeked::Position(1_000_000)
    );
    assert_eq!(reader.seek(10, Whence::End).unwrap(), Seeked::EndOfStream);
    assert!(matches!(
        reader.seek(0, Whence::Current),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(
        log.borrow().seeks,
        vec![(4096, SEEK_SET), (0, AVSEEK_SIZE), (10, SEEK_END), (0, SEEK_CUR)]
    );
}

#[test]
fn test_whence_parsing() {
    assert_eq!(Whence::from_raw(SEEK_SET), Some(Whence::Set));
    assert_eq!(Whence::from_raw(SEEK_CUR | AVSEEK_FORCE), Some(Whence::Current));
    assert_eq!(Whence::from_raw(AVSEEK_SIZE), Some(Whence::Size));
    assert_eq!(Whence::from_raw(7), None);
}

#[test]
fn test_interrupt_blocks_remote_calls() {
    let (mock, log) = MockStream::new();
    let (mut reader, flag) = interruptible(mock);
    flag.store(true, Ordering::SeqCst);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::Interrupted)
    ));
    assert_eq!(log.borrow().remote_calls(), 0);
    assert_eq!(log.borrow().resolve, 0);
    assert_eq!(reader.state(), StreamState::Unopened);
}

#[test]
fn test_interrupt_before_read_and_seek() {
    let (mock, log) = MockStream::new();
    let (mut reader, flag) = interruptible(mock.with_reads(vec![Read::Data(vec![1; 4])]));
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    flag.store(true, Ordering::SeqCst);

    let mut dst = [0u8; 4];
    assert!(matches!(reader.read(&mut dst), Err(Error::Interrupted)));
    assert!(matches!(reader.seek(0, Whence::Set), Err(Error::Interrupted)));
    assert_eq!(log.borrow().read, 0);
    assert_eq!(log.borrow().seek, 0);

    flag.store(false, Ordering::SeqCst);
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::Data(4));
}

#[test]
fn test_interrupt_during_open_closes_remote() {
    let (mut mock, log) = MockStream::new();
    let flag = Arc::new(AtomicBool::new(false));
    mock.interrupt_during_open = Some(flag.clone());
    let mut reader = StreamReader::new(mock, DEFAULT_SEGMENT_SIZE, flag).unwrap();

    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::Interrupted)
    ));
    let log = log.borrow();
    assert_eq!(log.open, 1);
    assert_eq!(log.close, 1);
    assert_eq!(log.mime, 0);
    assert!(log.all_released());
}

#[test]
fn test_failed_open_rolls_back() {
    let (mut mock, log) = MockStream::new();
    mock.open_result = Ok(-5);
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::RemoteOpen(_))
    ));
    assert_eq!(reader.state(), StreamState::Unopened);
    let log = log.borrow();
    assert_eq!(log.close, 0);
    assert_eq!(log.release_buffer, 1);
    assert_eq!(log.release_instance, 1);
    assert!(log.all_released());
}

#[test]
fn test_open_exception_is_open_error() {
    let (mut mock, log) = MockStream::new();
    mock.open_result = Err(Error::remote_call("java.io.IOException"));
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::RemoteOpen(_))
    ));
    assert!(log.borrow().all_released());
}

#[test]
fn test_construction_failures() {
    let (mut mock, log) = MockStream::new();
    mock.fail_resolve = true;
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::Binding(_))
    ));
    assert_eq!(log.borrow().construct, 0);

    let (mut mock, log) = MockStream::new();
    mock.fail_construct = true;
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::RemoteConstruction(_))
    ));
    assert_eq!(log.borrow().new_buffer, 0);
    assert!(log.borrow().all_released());

    let (mut mock, log) = MockStream::new();
    mock.fail_buffer = true;
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::Marshal(_))
    ));
    assert_eq!(log.borrow().open, 0);
    assert!(log.borrow().all_released());
}

#[test]
fn test_mime_failure_tolerated() {
    let (mut mock, _log) = MockStream::new();
    mock.fail_mime = true;
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    assert_eq!(reader.state(), StreamState::Open);
    assert_eq!(reader.mime_type(), None);
}

#[test]
fn test_write_flag_rejected() {
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ | AVIO_FLAG_WRITE, &options! {}),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(log.borrow().resolve, 0);
}

#[test]
fn test_read_before_open() {
    let (mock, _log) = MockStream::new();
    let mut reader = new_reader(mock);
    let mut dst = [0u8; 4];
    assert!(matches!(reader.read(&mut dst), Err(Error::InvalidArgument(_))));
    assert!(matches!(reader.seek(0, Whence::Set), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_close_idempotent() {
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    reader.close().unwrap();
    reader.close().unwrap();
    assert_eq!(reader.state(), StreamState::Closed);
    {
        let log = log.borrow();
        assert_eq!(log.close, 1);
        assert!(log.all_released());
    }

    let mut dst = [0u8; 4];
    assert!(matches!(reader.read(&mut dst), Err(Error::InvalidArgument(_))));
    assert!(matches!(
        reader.open(URI, AVIO_FLAG_READ, &options! {}),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_close_error_still_releases() {
    let (mut mock, log) = MockStream::new();
    mock.fail_close = true;
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    assert!(matches!(reader.close(), Err(Error::RemoteCall(_))));
    assert_eq!(reader.state(), StreamState::Closed);
    assert!(log.borrow().all_released());
}

#[test]
fn test_drop_closes_open_stream() {
    let (mock, log) = MockStream::new();
    let mut reader = new_reader(mock);
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    drop(reader);
    let log = log.borrow();
    assert_eq!(log.close, 1);
    assert!(log.all_released());
}

#[test]
fn test_capacity_from_config() {
    let (mock, log) = MockStream::new();
    let config = StreamConfig {
        segment_size: 16,
        ..StreamConfig::default()
    };
    let mut reader =
        StreamReader::from_config(mock.with_reads(vec![Read::Data(vec![9; 64])]), &config, NeverInterrupted)
            .unwrap();
    reader.open(URI, AVIO_FLAG_READ, &options! {}).unwrap();
    let mut dst = [0u8; 64];
    assert_eq!(reader.read(&mut dst).unwrap(), Chunk::Data(16));
    assert_eq!(log.borrow().read_lens, vec![16]);

    let (mock, _log) = MockStream::new();
    assert!(matches!(
        StreamReader::new(mock, 0, NeverInterrupted),
        Err(Error::Config(_))
    ));
}
