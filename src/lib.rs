//! Core of an RV32I instruction-set simulator: the fetch/decode/execute
//! loop, the machine memory map, and the I/O device abstraction with
//! one concrete device (a block-backed virtual disk).
//!
//! Out of scope, by design: log formatting detail beyond what the
//! `log` facade requires, command-line argument parsing (see
//! `src/bin/emulate.rs`), and a descriptive pretty-printer for
//! diagnostics beyond `Core`'s and `RegisterFile`'s `Display` impls.

pub mod core;
pub mod decode;
pub mod device;
pub mod error;
pub mod machine;
pub mod registers;
pub mod utils;
pub mod vdisk;

pub use crate::core::Core;
pub use device::IoDevice;
pub use error::{DeviceError, Fault, MachineError, VdiskError};
pub use machine::Machine;
pub use vdisk::VirtualDisk;

/// Default memory map used by the `emulate` binary and by tests that
/// don't care about a specific layout: 64 KiB of DRAM at
/// `0x8000_0000`, 4 KiB of boot ROM at `0x0000_0000` (the reset
/// vector), and a 4 KiB I/O aperture at `0x1000_0000`.
///
/// This is the "default machine-construction helper that wires base
/// addresses" the core spec treats as external glue; it still has to
/// exist somewhere for the crate to be runnable, so it lives here
/// rather than being duplicated between the binary and tests.
pub mod default_layout {
    pub const BROM_BASE: u32 = 0x0000_0000;
    pub const BROM_SIZE: u32 = 0x1000;
    pub const MEMORY_BASE: u32 = 0x8000_0000;
    pub const MEMORY_SIZE: u32 = 0x0001_0000;
    pub const IOMEM_BASE: u32 = 0x1000_0000;
    pub const IOMEM_SIZE: u32 = 0x0000_1000;
}

impl Machine {
    /// Build a machine using [`default_layout`]'s base addresses and
    /// sizes, with an empty device list.
    pub fn with_default_layout(descr: impl Into<String>) -> Self {
        use default_layout::*;
        Machine::new(
            descr,
            MEMORY_BASE,
            MEMORY_SIZE,
            BROM_BASE,
            BROM_SIZE,
            IOMEM_BASE,
            IOMEM_SIZE,
        )
    }
}

/// Read a raw boot-ROM image from `path` and load it into `machine`.
/// This is the "one-time boot-ROM file loader" the core spec names as
/// external collaborator glue: it must run once, before `execute`, and
/// asserts (rather than returning a recoverable error) on failure,
/// matching the original's `r5sim_assert`-guarded loader.
pub fn load_brom_file(machine: &mut Machine, path: &str) {
    let image = std::fs::read(path)
        .unwrap_or_else(|e| panic!("failed to read boot ROM image {path}: {e}"));
    machine.load_brom(&image);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_regions_do_not_overlap() {
        // Machine::new's internal asserts would panic on overlap; a
        // successful construction is the test.
        let _m = Machine::with_default_layout("test");
    }

    #[test]
    fn mmio_scenario_reads_vdisk_registers() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; 8192]).unwrap();
        f.flush().unwrap();

        let mut m = Machine::with_default_layout("test");
        let disk = VirtualDisk::load(0, f.path()).unwrap();
        m.attach_device(Box::new(disk)).unwrap();

        assert_eq!(m.load32(default_layout::IOMEM_BASE + vdisk::PRESENT).unwrap(), 1);
        assert_eq!(m.load32(default_layout::IOMEM_BASE + vdisk::PAGE_SIZE).unwrap(), 4096);
        assert_eq!(m.load32(default_layout::IOMEM_BASE + vdisk::SIZE_LO).unwrap(), 8192);
    }
}
