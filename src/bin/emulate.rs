//! Command-line glue around the simulator core: parse arguments, build
//! a machine with the default memory map, load a boot-ROM image and an
//! optional virtual disk, and run execution to completion.

use clap::Parser;
use clap_num::maybe_hex;
use riscvemu::{default_layout, load_brom_file, Core, Machine, VirtualDisk};

/// Run an RV32I boot-ROM image against the simulator core.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a raw (non-ELF) boot-ROM binary image.
    brom_image: String,

    /// Enable per-instruction trace logging (equivalent to
    /// RUST_LOG=trace, but scoped to this flag rather than every
    /// dependency's logs).
    #[arg(short, long)]
    trace: bool,

    /// Attach a virtual disk backed by this file at the default I/O
    /// offset.
    #[arg(long)]
    vdisk: Option<String>,

    /// Override the reset vector (use 0x prefix for hexadecimal).
    #[arg(long, value_parser=maybe_hex::<u32>)]
    start_pc: Option<u32>,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let mut machine = Machine::with_default_layout("emulate");
    load_brom_file(&mut machine, &args.brom_image);

    if let Some(path) = &args.vdisk {
        let disk = VirtualDisk::load(0, path)
            .unwrap_or_else(|e| panic!("failed to attach vdisk {path}: {e}"));
        machine
            .attach_device(Box::new(disk))
            .unwrap_or_else(|e| panic!("failed to attach vdisk {path}: {e}"));
    }

    let mut core = Core::new();
    core.set_trace(args.trace);

    let start_pc = args.start_pc.unwrap_or(default_layout::BROM_BASE);
    core.execute(&mut machine, start_pc);
}
