use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hbadump::device::sim::{sample_identity, SimPanicLog, SimRingLog, SimulatedHba};
use hbadump::device::{ChipFamily, DriverRegion, Hba};
use hbadump::kernel::parse_frame;
use hbadump::walker::{TableEntry, TableVariant};
use hbadump::{DumpConfig, DumpController, DumpRequest, TriggerOutcome};

// Adapter memory layout of the demo device.
const TABLE_ADDRESS: u32 = 0x0010_0000;
const SRAM_ADDRESS: u32 = 0x0020_0000;
const IOCB_ADDRESS: u32 = 0x0030_0000;
const INDIRECT_SLOT: u32 = 0x0000_0700;

fn demo_table() -> Vec<u32> {
    [
        TableEntry::NewTable(TableVariant::Primary),
        TableEntry::Block {
            sid: 0x05,
            byte_count: 256,
            address: SRAM_ADDRESS,
        },
        TableEntry::Struct {
            sid: 0x25,
            element_length: 32,
            element_count: 4,
            address: IOCB_ADDRESS,
        },
        TableEntry::Block {
            sid: 0x06,
            byte_count: 64,
            address: hbadump::walker::INDIRECT_FLAG | INDIRECT_SLOT,
        },
        TableEntry::Terminator,
    ]
    .iter()
    .flat_map(TableEntry::encode)
    .collect()
}

fn demo_device() -> SimulatedHba {
    let sram: Vec<u8> = (0..=255u8).collect();
    let vpd = [
        &[0x82, 0x07, 0x00][..],
        b"LP11002",
        &[0x90, 0x0c, 0x00],
        b"PN",
        &[0x03],
        b"ABC",
        b"RV",
        &[0x01, 0x00],
    ]
    .concat();

    SimulatedHba::new()
        .with_dump_table(TABLE_ADDRESS, &demo_table())
        .with_bytes(SRAM_ADDRESS, &sram)
        .with_words(IOCB_ADDRESS, &[0xdead_beef; 32])
        .with_word(INDIRECT_SLOT, SRAM_ADDRESS + 0x80)
        .with_config_region(0, vec![0x11; 64])
        .with_config_region(14, vpd)
        .with_driver_region(DriverRegion::SliRegs, vec![0x01; 16])
        .with_driver_region(DriverRegion::Slim, vec![0x02; 256])
        .with_driver_region(DriverRegion::Rings, vec![0x03; 64])
        .with_ring_log(SimRingLog {
            name: "fw_trace".into(),
            entry_size: 32,
            num_entries: 4,
            head: 2,
            entries: vec!["link up".into(), "port login".into(), "abts".into(), "link down".into()],
        })
        .with_panic_log(SimPanicLog {
            kind: 1,
            epc: 0x8000_1234,
            cause: 0x10,
            status: 0x1000_0001,
            log: SimRingLog {
                name: "panic".into(),
                entry_size: 32,
                num_entries: 2,
                head: 0,
                entries: vec!["assert in tx path".into()],
            },
            ..Default::default()
        })
}

#[derive(Parser)]
#[command(about = "Capture a core dump from a simulated adapter")]
struct Args {
    /// Directory the frame and per-sink files are written to
    #[arg(default_value = "dump")]
    out_dir: PathBuf,
    /// JSON dump configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let out_dir = args.out_dir;
    let config = match args.config {
        Some(path) => DumpConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?,
        None => DumpConfig::default(),
    };

    let hba = Hba::from_device(Arc::new(demo_device()), sample_identity(), ChipFamily::Coprocessor);
    let controller = DumpController::attach(hba, config)?;

    match controller.trigger(DumpRequest::User) {
        TriggerOutcome::Scheduled => {}
        other => anyhow::bail!("dump not started: {:?}", other),
    }
    controller.wait().await;

    let frame = controller.retrieve_vec()?;
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    std::fs::write(out_dir.join("dump.frame"), &frame)?;

    for (kind, bytes) in parse_frame(&frame)? {
        let name = match kind {
            hbadump::sink::SinkKind::Text => "dump.txt",
            hbadump::sink::SinkKind::Binary => "dump.bin",
            hbadump::sink::SinkKind::VendorLog => "vendor.txt",
        };
        std::fs::write(out_dir.join(name), bytes)?;
        tracing::info!("Wrote {} ({} bytes)", name, bytes.len());
    }

    let stats = controller.telemetry();
    tracing::info!(
        "Steps: {} ok, {} failed; harvested {} of {} bytes; mode changes: {}",
        stats.step_stats.completed,
        stats.step_stats.failed,
        stats.harvest_stats.bytes_read,
        stats.harvest_stats.bytes_requested,
        stats.mode_stats.transitions
    );

    controller.detach();
    Ok(())
}
