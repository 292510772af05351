use hbadump::device::sim::SimulatedHba;
use hbadump::encode::{BinaryEncoder, ByteOrder, TextEncoder};
use hbadump::error::ErrorKind;
use hbadump::sink::{ScratchLedger, Sink, SinkKind};
use hbadump::walker::{
    ChainPolicy, TableEntry, TableVariant, TableWalker, FW_BUG_SENTINEL, INDIRECT_FLAG,
};

const TABLE: u32 = 0x2000;

fn encode(entries: &[TableEntry]) -> Vec<u32> {
    entries.iter().flat_map(TableEntry::encode).collect()
}

fn open_binary() -> Sink {
    let mut sink = Sink::new(SinkKind::Binary);
    sink.open(64 * 1024).unwrap();
    sink
}

#[test]
fn test_single_block_scenario() {
    let data: Vec<u8> = (1..=16).collect();
    let sim = SimulatedHba::new()
        .with_dump_table(
            TABLE,
            &encode(&[
                TableEntry::NewTable(TableVariant::Primary),
                TableEntry::Block {
                    sid: 5,
                    byte_count: 16,
                    address: 0x1000,
                },
                TableEntry::Terminator,
            ]),
        )
        .with_bytes(0x1000, &data);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);

    assert_eq!(walker.size().unwrap(), 16);

    let mut trace = String::new();
    let table = walker.store(16, &mut trace).unwrap();
    assert_eq!(table.words().len(), 4);
    assert_eq!(table.size_in_bytes(), 16);
    assert!(trace.contains("\n Addr=00002000: w0=c1000000"));
    assert!(trace.contains("\n Addr=00002004: w0=05000010, w1=00001000"));

    sim.clear_calls();
    let mut sink = open_binary();
    let summary = {
        let mut enc = BinaryEncoder::new(&mut sink, ByteOrder::Little);
        walker.harvest(&table, &mut enc).unwrap()
    };

    let mut expected = vec![5, 16, 0, 0, 0x00, 0x10, 0x00, 0x00];
    expected.extend_from_slice(&data);
    assert_eq!(sink.contents(), &expected[..]);

    assert_eq!(sim.memory_reads(), vec![(0x1000, 4)]);
    assert_eq!(summary.regions.len(), 1);
    assert!(!summary.regions[0].is_partial());

    drop(table);
    assert_eq!(ledger.outstanding(), 0);
}

#[test]
fn test_size_equals_store_for_every_policy() {
    let words = encode(&[
        TableEntry::NewTable(TableVariant::Primary),
        TableEntry::Block {
            sid: 5,
            byte_count: 8,
            address: 0x1000,
        },
        TableEntry::NewTable(TableVariant::Secondary),
        TableEntry::Struct {
            sid: 0x25,
            element_length: 4,
            element_count: 2,
            address: 0x1100,
        },
        TableEntry::Terminator,
    ]);
    let sim = SimulatedHba::new().with_dump_table(TABLE, &words);
    let ledger = ScratchLedger::new(None);

    for (policy, consumed) in [(ChainPolicy::Stop, 4), (ChainPolicy::Follow, 7)] {
        let walker = TableWalker::new(&sim, &ledger, policy);
        let size = walker.size().unwrap();
        let table = walker.store(size, &mut String::new()).unwrap();

        assert_eq!(size, 4 * consumed, "{:?}", policy);
        assert_eq!(table.size_in_bytes(), size);
        assert_eq!(table.words().len(), consumed);
    }
}

#[test]
fn test_follow_policy_harvests_chained_entries() {
    let words = encode(&[
        TableEntry::NewTable(TableVariant::Primary),
        TableEntry::Block {
            sid: 5,
            byte_count: 8,
            address: 0x1000,
        },
        TableEntry::NewTable(TableVariant::Tertiary),
        TableEntry::Block {
            sid: 6,
            byte_count: 8,
            address: 0x1100,
        },
        TableEntry::Terminator,
    ]);
    let sim = SimulatedHba::new().with_dump_table(TABLE, &words);
    let ledger = ScratchLedger::new(None);

    let harvest = |policy| {
        let walker = TableWalker::new(&sim, &ledger, policy);
        let table = walker.read_table(None).unwrap();
        let mut sink = open_binary();
        let mut enc = BinaryEncoder::new(&mut sink, ByteOrder::Little);
        walker.harvest(&table, &mut enc).unwrap()
    };

    assert_eq!(harvest(ChainPolicy::Stop).regions.len(), 1);
    let follow = harvest(ChainPolicy::Follow);
    assert_eq!(follow.regions.len(), 2);
    assert_eq!(follow.regions[1].sid, 6);
}

#[test]
fn test_struct_entry_with_zero_count_means_256() {
    let entry = TableEntry::Struct {
        sid: 0x25,
        element_length: 4,
        element_count: 0,
        address: 0,
    };
    assert_eq!(entry.byte_count(), 1024);

    let parsed = TableEntry::parse(&entry.encode()).unwrap();
    assert_eq!(parsed, entry);
}

#[test]
fn test_firmware_bug_entry_is_skipped() {
    let words = [
        0xC100_0000,
        0x0500_0010,
        FW_BUG_SENTINEL,
        0x0600_0008,
        0x1000,
        0xFF00_0000,
    ];
    let sim = SimulatedHba::new().with_dump_table(TABLE, &words);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);
    let table = walker.read_table(None).unwrap();

    sim.clear_calls();
    let mut sink = open_binary();
    let summary = walker
        .harvest(&table, &mut BinaryEncoder::new(&mut sink, ByteOrder::Little))
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.regions.len(), 1);
    assert_eq!(summary.regions[0].sid, 6);
    assert!(sim.memory_reads().iter().all(|(addr, _)| *addr != FW_BUG_SENTINEL));
}

#[test]
fn test_indirect_address_is_resolved() {
    let words = encode(&[
        TableEntry::Block {
            sid: 7,
            byte_count: 4,
            address: INDIRECT_FLAG | 0x700,
        },
        TableEntry::Terminator,
    ]);
    let sim = SimulatedHba::new()
        .with_dump_table(TABLE, &words)
        .with_word(0x700, 0x3000)
        .with_word(0x3000, 0xCAFE_F00D);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);
    let table = walker.read_table(None).unwrap();

    let mut sink = open_binary();
    let summary = walker
        .harvest(&table, &mut BinaryEncoder::new(&mut sink, ByteOrder::Little))
        .unwrap();

    assert_eq!(summary.regions[0].address, 0x3000);
    assert_eq!(
        sink.contents(),
        &[7, 4, 0, 0, 0x00, 0x30, 0x00, 0x00, 0x0D, 0xF0, 0xFE, 0xCA]
    );
}

#[test]
fn test_failed_chunk_keeps_partial_region() {
    let words = encode(&[
        TableEntry::Block {
            sid: 5,
            byte_count: 256,
            address: 0x1000,
        },
        TableEntry::Terminator,
    ]);
    let sim = SimulatedHba::new()
        .with_dump_table(TABLE, &words)
        .with_bytes(0x1000, &[0x55; 256])
        .with_failing_address(0x1000 + 0x60);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);
    let table = walker.read_table(None).unwrap();

    let mut sink = open_binary();
    let summary = walker
        .harvest(&table, &mut BinaryEncoder::new(&mut sink, ByteOrder::Little))
        .unwrap();

    let region = &summary.regions[0];
    assert_eq!(region.bytes_read, 0x60);
    assert!(region.is_partial());

    // Full record is still written, zero-filled past the failure.
    let payload = &sink.contents()[8..];
    assert_eq!(payload.len(), 256);
    assert!(payload[..0x60].iter().all(|b| *b == 0x55));
    assert!(payload[0x60..].iter().all(|b| *b == 0));
}

#[test]
fn test_reads_are_chunked_to_mailbox_limit() {
    let words = encode(&[
        TableEntry::Block {
            sid: 5,
            byte_count: 0x70,
            address: 0x1000,
        },
        TableEntry::Terminator,
    ]);
    let sim = SimulatedHba::new().with_dump_table(TABLE, &words);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);
    let table = walker.read_table(None).unwrap();

    sim.clear_calls();
    let mut sink = open_binary();
    walker
        .harvest(&table, &mut BinaryEncoder::new(&mut sink, ByteOrder::Little))
        .unwrap();

    assert_eq!(sim.memory_reads(), vec![(0x1000, 0x18), (0x1060, 4)]);
}

#[test]
fn test_zero_table_address_is_protocol_violation() {
    let sim = SimulatedHba::new();
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);

    let err = walker.size().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn test_unterminated_table_is_bounded() {
    // Unmapped memory reads as zero, which parses as an endless run of empty blocks.
    let sim = SimulatedHba::new().with_word(hbadump::walker::BOOTSTRAP_ADDRESS, 0x8000);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);

    let err = walker.size().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn test_read_table_writes_trace_record() {
    let words = encode(&[TableEntry::NewTable(TableVariant::Primary), TableEntry::Terminator]);
    let sim = SimulatedHba::new().with_dump_table(TABLE, &words);
    let ledger = ScratchLedger::new(None);
    let walker = TableWalker::new(&sim, &ledger, ChainPolicy::Stop);

    let mut sink = Sink::new(SinkKind::Text);
    sink.open(4096).unwrap();
    walker.read_table(Some(&mut TextEncoder::new(&mut sink))).unwrap();

    let text = String::from_utf8(sink.contents().to_vec()).unwrap();
    assert!(text.starts_with("HBA Memory Dump: Dump Table\n"));
    assert!(text.contains("w0=ff000000"));
}
