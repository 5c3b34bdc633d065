//! Raw OptoRx frame dump utility
//! Decodes one raw readout buffer from a file and prints the frames found

use serde::Serialize;
use std::env;
use std::fs;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};
use vfat_unpack::{Defect, DefectReport, FrameCollection, RawDataUnpacker, RecordingSink, VfatFrame};

#[derive(Serialize)]
struct JsonSummary<'a> {
    fed: u16,
    frames: Vec<JsonFrame>,
    report: &'a DefectReport,
    diagnostics: Vec<String>,
}

#[derive(Serialize)]
struct JsonFrame {
    position: String,
    presence_flags: u8,
    daq_error_flags: u8,
    bc: Option<u16>,
    ec: Option<u8>,
    chip_id: Option<u16>,
    active_channels: Vec<u8>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <raw_file.bin> <fed_id> [--json]", args[0]);
        eprintln!("\nExamples:");
        eprintln!(
            "  {} optorx_468.bin 468          # Human-readable frame dump",
            args[0]
        );
        eprintln!(
            "  {} optorx_468.bin 468 --json   # JSON summary on stdout",
            args[0]
        );
        std::process::exit(1);
    }

    let raw_file = &args[1];
    let fed: u16 = args[2].parse()?;
    let as_json = args.get(3).map(|s| s.as_str()) == Some("--json");

    // Read raw buffer
    let data = fs::read(raw_file)?;
    if !as_json {
        println!("Read {} bytes from {}", data.len(), raw_file);
    }

    // Decode
    let mut sink = RecordingSink::default();
    let mut coll = FrameCollection::new();
    let report = RawDataUnpacker::new(&mut sink).run(fed, &data, &mut coll)?;

    if as_json {
        let summary = JsonSummary {
            fed,
            frames: coll
                .iter()
                .map(|(pos, frame)| JsonFrame {
                    position: pos.to_string(),
                    presence_flags: frame.presence_flags,
                    daq_error_flags: frame.daq_error_flags,
                    bc: frame.bc(),
                    ec: frame.ec(),
                    chip_id: frame.chip_id(),
                    active_channels: frame.active_channels(),
                })
                .collect(),
            report: &report,
            diagnostics: sink.defects.iter().map(Defect::to_string).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== Decoded frames ({}) ===\n", coll.len());
    for (pos, frame) in coll.iter() {
        print_frame(pos.to_string(), frame);
    }

    if !sink.defects.is_empty() {
        println!("=== Diagnostics ({}) ===\n", sink.defects.len());
        for defect in &sink.defects {
            println!("  {defect}");
        }
        println!();
    }

    println!("=== Defect report ===\n");
    println!("  structural:               {}", report.structural);
    println!("  unknown format:           {}", report.unknown_format);
    println!("  lane errors:              {}", report.lane_errors);
    println!("  record errors:            {}", report.record_errors);
    println!("  channel range reported:   {}", report.channel_range_reported);
    println!("  channel range suppressed: {}", report.channel_range_suppressed);
    println!("  total:                    {}", report.total());

    Ok(())
}

fn print_frame(position: String, frame: &VfatFrame) {
    println!("Frame {position}");
    if let Some(bc) = frame.bc() {
        println!("  BC:       {bc:#05x}");
    }
    if let Some(ec) = frame.ec() {
        println!("  EC:       {ec:#04x}");
    }
    if let Some(id) = frame.chip_id() {
        println!("  chip id:  {id:#05x}");
    }
    if let Some(crc) = frame.crc() {
        println!("  CRC:      {crc:#06x}");
    }
    if frame.daq_error_flags != 0 {
        println!("  DAQ error flags: {:#x}", frame.daq_error_flags);
    }

    let channels = frame.active_channels();
    if channels.is_empty() {
        println!("  channels: none");
    } else {
        let list: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        println!("  channels: {}", list.join(" "));
    }
    println!();
}
