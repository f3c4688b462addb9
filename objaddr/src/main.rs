//! # objaddr - Main Entry Point
//!
//! Supports two operational modes:
//! - **Resolve** (`objaddr [--pid PID | --process NAME] ADDRESS...`): map raw
//!   addresses captured in a process to `(binary, link-time address)` pairs
//! - **Image base** (`objaddr --image-base FILE...`): print the link-time base
//!   address declared in each binary's headers

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use objaddr::cli::{parse_address, Args};
use objaddr::image_base::{ImageBaseSource, ObjectFileBase};
use objaddr::locator::MappedModules;
use objaddr::process_lookup::find_process;
use objaddr::{FramePtr, LogSink, ObjectFrame, ObjectResolver};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("missing required argument") || msg.contains("invalid address") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if !args.image_base.is_empty() {
        print_image_bases(&args, &mut out)?;
    } else {
        resolve_addresses(&args, &mut out)?;
    }

    out.flush().context("Failed to write output")?;
    Ok(())
}

/// Print the link-time image base of every `--image-base` file.
///
/// Unlike address resolution this reports failures: the user asked about
/// these files specifically.
fn print_image_bases(args: &Args, out: &mut impl Write) -> Result<()> {
    for path in &args.image_base {
        let base = ObjectFileBase
            .image_base(path)
            .with_context(|| format!("Failed to read image base of {}", path.display()))?;

        if args.json {
            let record = serde_json::json!({ "path": path, "image_base": base });
            writeln!(out, "{record}")?;
        } else {
            writeln!(out, "0x{base:016x}  {}", path.display())?;
        }
    }
    Ok(())
}

/// Resolve the positional addresses against the target's memory map.
fn resolve_addresses(args: &Args, out: &mut impl Write) -> Result<()> {
    if args.addresses.is_empty() {
        bail!(
            "Missing required argument: ADDRESS or --image-base\n\n\
             Run 'objaddr --help' for usage"
        );
    }
    let addresses = args
        .addresses
        .iter()
        .map(|text| parse_address(text).with_context(|| format!("Invalid address: {text}")))
        .collect::<Result<Vec<FramePtr>>>()?;

    let pid = match (&args.process, args.pid) {
        (Some(name), _) => Some(find_process(name)?.pid),
        (None, pid) => pid,
    };
    let modules = match pid {
        Some(pid) => MappedModules::for_process(pid)?,
        None => MappedModules::for_current_process()?,
    };
    info!("Loaded {} modules from the target's memory map", modules.len());

    let resolver = ObjectResolver::with_sink(modules, ObjectFileBase, Arc::new(LogSink));
    let frames = resolver.resolve_batch(&addresses);

    if !args.quiet && !args.json {
        writeln!(out, "{:<18}  {:<18}  OBJECT", "ADDRESS", "OBJECT ADDRESS")?;
    }
    for frame in &frames {
        write_frame(out, frame, args.json)?;
    }
    Ok(())
}

fn write_frame(out: &mut impl Write, frame: &ObjectFrame, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(frame)?)?;
    } else if frame.is_resolved() {
        writeln!(
            out,
            "{}  0x{:016x}  {}",
            frame.raw_address,
            frame.object_address,
            frame.object_path.display()
        )?;
    } else {
        writeln!(out, "{}  {:<18}  <unknown>", frame.raw_address, "-")?;
    }
    Ok(())
}
