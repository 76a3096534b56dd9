//! Virtual disk: the reference I/O device. Backs onto a host file
//! mapped shared read/write, and exposes a small register bank over
//! the MMIO contract so software can discover the disk's size and
//! page granularity.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::device::IoDevice;
use crate::error::VdiskError;

/// Byte offset of the "device present" register.
pub const PRESENT: u32 = 0x00;
/// Byte offset of the page-size register.
pub const PAGE_SIZE: u32 = 0x04;
/// Byte offset of the low 32 bits of the backing file's size.
pub const SIZE_LO: u32 = 0x08;
/// Byte offset of the high 32 bits of the backing file's size.
pub const SIZE_HI: u32 = 0x0c;

/// Upper bound, in bytes, on register offsets this device answers.
/// Matches the 4 KiB register aperture the device reserves in the I/O
/// address space.
const MAX_REG: u32 = 0x1000;

/// A disk-like MMIO device backed by a file mapped into host memory.
///
/// The mapping is writable but this core does not yet wire any
/// instruction path to read or write through it; the device exists to
/// demonstrate the MMIO register protocol (`PRESENT`/`PAGE_SIZE`/
/// `SIZE_LO`/`SIZE_HI`).
pub struct VirtualDisk {
    name: String,
    io_offset: u32,
    io_size: u32,
    #[allow(dead_code)]
    file: std::fs::File,
    #[allow(dead_code)]
    mapping: MmapMut,
    size: u64,
    registers: [u32; (MAX_REG >> 2) as usize],
}

impl VirtualDisk {
    /// Open `path` read/write, map it shared, and initialize the
    /// register bank. `io_offset` is this device's offset within the
    /// machine's I/O aperture.
    pub fn load<P: AsRef<Path>>(io_offset: u32, path: P) -> Result<Self, VdiskError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path_ref)
            .map_err(|source| VdiskError::Open {
                path: path_str.clone(),
                source,
            })?;

        let metadata = file.metadata().map_err(|source| VdiskError::Stat {
            path: path_str.clone(),
            source,
        })?;
        let size = metadata.len();

        let mapping = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|source| VdiskError::Mmap {
                    path: path_str.clone(),
                    source,
                })?
        };

        let mut registers = [0u32; (MAX_REG >> 2) as usize];
        registers[(PRESENT >> 2) as usize] = 1;
        registers[(PAGE_SIZE >> 2) as usize] = 4096;
        registers[(SIZE_LO >> 2) as usize] = (size & 0xFFFF_FFFF) as u32;
        registers[(SIZE_HI >> 2) as usize] = (size >> 32) as u32;

        log::info!("vdisk @ 0x{io_offset:08x}: path={path_str} size={size}");

        Ok(Self {
            name: "vdisk".to_string(),
            io_offset,
            io_size: MAX_REG,
            file,
            mapping,
            size,
            registers,
        })
    }

    /// Byte length of the backing file, as recorded at load time.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl IoDevice for VirtualDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn io_offset(&self) -> u32 {
        self.io_offset
    }

    fn io_size(&self) -> u32 {
        self.io_size
    }

    fn readl(&mut self, offset: u32) -> u32 {
        if offset >= MAX_REG {
            return 0;
        }
        self.registers[(offset >> 2) as usize]
    }

    fn writel(&mut self, offset: u32, value: u32) {
        if offset >= MAX_REG {
            return;
        }
        self.registers[(offset >> 2) as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn backing_file(size: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; size]).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn registers_reflect_file_size() {
        let f = backing_file(8192);
        let mut disk = VirtualDisk::load(0, f.path()).unwrap();
        assert_eq!(disk.readl(PRESENT), 1);
        assert_eq!(disk.readl(PAGE_SIZE), 4096);
        assert_eq!(disk.readl(SIZE_LO), 8192);
        assert_eq!(disk.readl(SIZE_HI), 0);
        assert_eq!(disk.size(), 8192);
    }

    #[test]
    fn out_of_bounds_offset_is_soft_failure() {
        let f = backing_file(4096);
        let mut disk = VirtualDisk::load(0, f.path()).unwrap();
        assert_eq!(disk.readl(MAX_REG), 0);
        disk.writel(MAX_REG, 0xdead_beef);
        assert_eq!(disk.readl(MAX_REG - 4), 0);
    }

    #[test]
    fn writel_then_readl_round_trips() {
        let f = backing_file(4096);
        let mut disk = VirtualDisk::load(0, f.path()).unwrap();
        disk.writel(0x20, 0x1234_5678);
        assert_eq!(disk.readl(0x20), 0x1234_5678);
    }

    #[test]
    fn open_missing_file_is_an_error() {
        let result = VirtualDisk::load(0, "/nonexistent/path/to/vdisk.img");
        assert!(matches!(result, Err(VdiskError::Open { .. })));
    }
}
