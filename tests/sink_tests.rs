use hbadump::sink::{ScratchLedger, Sink, SinkKind, SinkSet};
use hbadump::error::ErrorKind;

#[test]
fn test_capacity_rounds_down_to_word() {
    let mut sink = Sink::new(SinkKind::Text);
    sink.open(10).unwrap();
    assert_eq!(sink.capacity(), 8);
    assert_eq!(sink.tell(), 0);
}

#[test]
fn test_writes_truncate_at_capacity() {
    let mut sink = Sink::new(SinkKind::Binary);
    sink.open(8).unwrap();

    assert_eq!(sink.write(b"abcdef"), 6);
    assert_eq!(sink.write(b"ghij"), 2);
    assert_eq!(sink.write(b"k"), 0);
    sink.put(b'z');

    assert_eq!(sink.tell(), 8);
    assert_eq!(sink.contents(), b"abcdefgh");
}

#[test]
fn test_close_pads_to_word_boundary() {
    let mut sink = Sink::new(SinkKind::Text);
    sink.open(16).unwrap();
    sink.write(b"hello");
    sink.close();

    assert_eq!(sink.tell(), 8);
    assert_eq!(&sink.contents()[5..], &[0, 0, 0]);

    // already aligned
    sink.close();
    assert_eq!(sink.tell(), 8);
}

#[test]
fn test_reopen_reuses_and_zeroes_buffer() {
    let mut sink = Sink::new(SinkKind::VendorLog);
    sink.open(64).unwrap();
    sink.write(b"first session");

    // A second open keeps the existing allocation whatever capacity is asked for.
    sink.open(4096).unwrap();
    assert_eq!(sink.capacity(), 64);
    assert_eq!(sink.tell(), 0);
    assert!(sink.contents().is_empty());
}

#[test]
fn test_clear_and_dispose() {
    let mut sinks = SinkSet::new();
    sinks.text.open(32).unwrap();
    sinks.text.write(b"abc");

    sinks.text.clear();
    assert!(sinks.text.is_allocated());
    assert_eq!(sinks.text.tell(), 0);

    sinks.dispose();
    assert!(sinks.iter().all(|s| !s.is_allocated()));
}

#[test]
fn test_formatted_writes_truncate_silently() {
    use std::fmt::Write;

    let mut sink = Sink::new(SinkKind::Text);
    sink.open(4).unwrap();
    write!(sink, "{}", "truncated").unwrap();
    assert_eq!(sink.contents(), b"trun");
}

#[test]
fn test_scratch_ledger_tracks_every_buffer() {
    let ledger = ScratchLedger::new(None);
    {
        let words = ledger.alloc::<u32>(16).unwrap();
        let bytes = ledger.alloc::<u8>(10).unwrap();
        assert_eq!(words.size_in_bytes(), 64);
        assert_eq!(words.len(), 16);
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(ledger.outstanding(), 74);
    }
    assert_eq!(ledger.outstanding(), 0);
    assert_eq!(ledger.allocations(), 2);
    assert_eq!(ledger.releases(), 2);
}

#[test]
fn test_scratch_limit_surfaces_allocation_failure() {
    let ledger = ScratchLedger::new(Some(100));
    let held = ledger.alloc::<u8>(80).unwrap();

    let err = ledger.alloc::<u8>(40).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocationFailure);

    drop(held);
    assert!(ledger.alloc::<u8>(40).is_ok());
}
