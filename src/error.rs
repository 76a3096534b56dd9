//! Error taxonomy for the core. Fallible operations report through
//! `thiserror`-derived enums rather than panicking; structural
//! preconditions (bad register index, failed device allocation) remain
//! `assert!`/`panic!`, per the programmer-error vs runtime-error split.

use thiserror::Error;

/// Failures from the address-space router.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MachineError {
    #[error("physical address 0x{0:08x} is outside DRAM, ROM, and the I/O aperture")]
    AddressFault(u32),
}

/// Failures attaching a device to a machine.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device {name} io_offset 0x{io_offset:08x} is not a multiple of 4")]
    MisalignedOffset { name: String, io_offset: u32 },
    #[error("device {name} io_size 0x{io_size:08x} is not a multiple of 4")]
    MisalignedSize { name: String, io_size: u32 },
    #[error("device {name} [0x{io_offset:08x}, 0x{:08x}) overlaps device {other}", io_offset + io_size)]
    Overlap {
        name: String,
        io_offset: u32,
        io_size: u32,
        other: String,
    },
}

/// Failures constructing the virtual disk from its backing file.
#[derive(Error, Debug)]
pub enum VdiskError {
    #[error("failed to open vdisk backing file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stat vdisk backing file {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to mmap vdisk backing file {path}: {source}")]
    Mmap {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal conditions that halt the interpreter. Every variant corresponds
/// to one of the `step()` fatal conditions in the core spec; there is no
/// variant for the local-recovery conditions (FENCE no-op, x0 write
/// drop, device-offset-out-of-bounds soft failure) because those never
/// reach this type.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Fault {
    #[error("fetch word 0x{word:08x} at pc=0x{pc:08x} is not a 32-bit standard encoding")]
    NotStandardEncoding { pc: u32, word: u32 },

    #[error("opcode family {family} at pc=0x{pc:08x} has no handler (word=0x{word:08x})")]
    UndefinedOpcodeFamily { pc: u32, word: u32, family: u32 },

    #[error("{insn} at pc=0x{pc:08x} has undefined func3={func3}")]
    UndefinedFunc3 { pc: u32, insn: &'static str, func3: u32 },

    #[error("SYSTEM instruction at pc=0x{pc:08x} is not implemented (word=0x{word:08x})")]
    UnimplementedSystem { pc: u32, word: u32 },

    #[error("memory fault while executing {insn} at pc=0x{pc:08x}: {source}")]
    Memory {
        pc: u32,
        insn: &'static str,
        #[source]
        source: MachineError,
    },
}
