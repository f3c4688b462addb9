//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "objaddr",
    about = "Map raw addresses to the binary containing them and its link-time address",
    after_help = "\
EXAMPLES:
    objaddr --pid 1234 0x55d4a0a03f10 0x7f1c2e43a1b2   Resolve addresses from process 1234
    objaddr --process my-app 0x55d4a0a03f10            Find the process by name
    objaddr --image-base /usr/lib/libc.so.6            Print a binary's image base"
)]
pub struct Args {
    /// Raw addresses to resolve (hex, with or without 0x)
    #[arg(value_name = "ADDRESS")]
    pub addresses: Vec<String>,

    /// Process whose address space the addresses come from (default: this one)
    #[arg(short, long, conflicts_with = "process")]
    pub pid: Option<i32>,

    /// Process name to look up instead of --pid
    #[arg(long, value_name = "NAME")]
    pub process: Option<String>,

    /// Print the link-time image base of FILE instead of resolving addresses
    #[arg(long, value_name = "FILE", num_args = 1.., conflicts_with_all = ["addresses", "pid", "process"])]
    pub image_base: Vec<PathBuf>,

    /// Emit one JSON object per line
    #[arg(long)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
