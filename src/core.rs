//! Fetch/decode/execute: architectural state (register file, PC) and
//! the interpreter loop. Dispatch is a fixed-size table of opcode
//! families indexed by the 5-bit `word[6:2]` field; an empty slot is a
//! decode fault by construction rather than a null function pointer,
//! per the teacher's original dispatch-by-function-pointer idiom
//! hardened against the "no entry" failure mode.

use crate::decode::{
    decode_btype, decode_itype, decode_jtype, decode_rtype, decode_stype, decode_utype,
    is_standard_encoding, opcode_family,
};
use crate::error::{Fault, MachineError};
use crate::machine::Machine;
use crate::registers::RegisterFile;
use crate::utils::sign_extend;

type ExecFn = fn(&mut Core, &mut Machine, u32) -> Result<(), Fault>;

#[derive(Clone, Copy)]
struct OpFamily {
    name: &'static str,
    advance_pc: bool,
    exec: ExecFn,
}

const NUM_FAMILIES: usize = 32;

/// The 5-bit opcode family table. Families that control their own PC
/// (BRANCH, JALR, JAL) carry `advance_pc: false`; everything else is
/// auto-incremented by `step` after the handler runs.
fn family_table() -> [Option<OpFamily>; NUM_FAMILIES] {
    const NONE: Option<OpFamily> = None;
    let mut table: [Option<OpFamily>; NUM_FAMILIES] = [NONE; NUM_FAMILIES];
    table[0] = Some(OpFamily { name: "LOAD", advance_pc: true, exec: exec_load });
    table[3] = Some(OpFamily { name: "MISC-MEM", advance_pc: true, exec: exec_misc_mem });
    table[4] = Some(OpFamily { name: "OP-IMM", advance_pc: true, exec: exec_op_imm });
    table[5] = Some(OpFamily { name: "AUIPC", advance_pc: true, exec: exec_auipc });
    table[8] = Some(OpFamily { name: "STORE", advance_pc: true, exec: exec_store });
    table[12] = Some(OpFamily { name: "OP", advance_pc: true, exec: exec_op });
    table[13] = Some(OpFamily { name: "LUI", advance_pc: true, exec: exec_lui });
    table[24] = Some(OpFamily { name: "BRANCH", advance_pc: false, exec: exec_branch });
    table[25] = Some(OpFamily { name: "JALR", advance_pc: false, exec: exec_jalr });
    table[27] = Some(OpFamily { name: "JAL", advance_pc: false, exec: exec_jal });
    // SYSTEM is decoded as a family but has no handler: any SYSTEM
    // instruction is fatal. `advance_pc` is irrelevant since `exec`
    // always errors before it would matter.
    table[28] = Some(OpFamily { name: "SYSTEM", advance_pc: true, exec: exec_system });
    table
}

/// Architectural state for a single hardware thread: 32 general
/// registers and a program counter.
pub struct Core {
    regs: RegisterFile,
    pc: u32,
    trace: bool,
    families: [Option<OpFamily>; NUM_FAMILIES],
}

impl Core {
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            pc: 0,
            trace: false,
            families: family_table(),
        }
    }

    /// Current program counter.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Read register `which` (0..=31). Register 0 always reads zero.
    pub fn reg(&self, which: u32) -> u32 {
        self.regs.read(which)
    }

    /// Enable or disable per-instruction trace logging.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Set PC to `start_pc` and run `step()` to completion, logging an
    /// informational line at start and at halt. Returns normally after
    /// halt; it never terminates the process.
    pub fn execute(&mut self, machine: &mut Machine, start_pc: u32) {
        self.pc = start_pc;
        log::info!("Execution begins @ 0x{start_pc:08x}");

        loop {
            match self.step(machine) {
                Ok(()) => continue,
                Err(fault) => {
                    log::error!("Core error detected: {fault}");
                    log::error!("{self}");
                    break;
                }
            }
        }

        log::info!("HALT.");
    }

    /// Run one fetch/decode/execute cycle. Returns `Err(fault)` on any
    /// of the fatal conditions in the core spec; the caller is
    /// expected to halt on error.
    pub fn step(&mut self, machine: &mut Machine) -> Result<(), Fault> {
        let pc = self.pc;
        let word = machine.load32(pc).map_err(|source| Fault::Memory {
            pc,
            insn: "fetch",
            source,
        })?;

        if !is_standard_encoding(word) {
            return Err(Fault::NotStandardEncoding { pc, word });
        }

        let family_idx = opcode_family(word);
        let Some(family) = self.families[family_idx as usize].as_ref() else {
            return Err(Fault::UndefinedOpcodeFamily { pc, word, family: family_idx });
        };

        if self.trace {
            log::trace!("PC 0x{pc:08x} | inst=0x{word:08x}");
            log::trace!("  opcode family: {} ({})", family.name, family_idx);
        }

        let advance_pc = family.advance_pc;
        let exec = family.exec;
        (exec)(self, machine, word)?;

        if advance_pc {
            self.pc = self.pc.wrapping_add(4);
        }

        Ok(())
    }

    fn get(&self, which: u32) -> u32 {
        self.regs.read(which)
    }

    fn set(&mut self, which: u32, value: u32) {
        self.regs.write(which, value)
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Core state:")?;
        writeln!(f, "  pc = 0x{:08x}", self.pc)?;
        write!(f, "  {}", self.regs)
    }
}

fn mem_fault(pc: u32, insn: &'static str) -> impl Fn(MachineError) -> Fault {
    move |source| Fault::Memory { pc, insn, source }
}

fn exec_misc_mem(_core: &mut Core, _machine: &mut Machine, _word: u32) -> Result<(), Fault> {
    // FENCE: no-op in a single-threaded, in-order model.
    Ok(())
}

fn exec_load(core: &mut Core, machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let i = decode_itype(word);
    let pc = core.pc;
    let addr = core.get(i.rs1).wrapping_add(i.imm);

    let value = match i.func3 {
        0 => sign_extend(machine.load8(addr).map_err(mem_fault(pc, "LB"))? as u32, 7),
        1 => sign_extend(machine.load16(addr).map_err(mem_fault(pc, "LH"))? as u32, 15),
        2 => machine.load32(addr).map_err(mem_fault(pc, "LW"))?,
        4 => machine.load8(addr).map_err(mem_fault(pc, "LBU"))? as u32,
        5 => machine.load16(addr).map_err(mem_fault(pc, "LHU"))? as u32,
        func3 => return Err(Fault::UndefinedFunc3 { pc, insn: "LOAD", func3 }),
    };
    core.set(i.rd, value);
    Ok(())
}

fn exec_store(core: &mut Core, machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let s = decode_stype(word);
    let pc = core.pc;
    let addr = core.get(s.rs1).wrapping_add(s.imm);
    let value = core.get(s.rs2);

    match s.func3 {
        0 => machine.store8(addr, value as u8).map_err(mem_fault(pc, "SB"))?,
        1 => machine.store16(addr, value as u16).map_err(mem_fault(pc, "SH"))?,
        2 => machine.store32(addr, value).map_err(mem_fault(pc, "SW"))?,
        func3 => return Err(Fault::UndefinedFunc3 { pc, insn: "STORE", func3 }),
    }
    Ok(())
}

fn exec_op_imm(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let i = decode_itype(word);
    let rs1 = core.get(i.rs1);
    let signed_rs1 = rs1 as i32;
    let imm = i.imm;
    let shamt = i.imm_11_0 & 0x1f;

    let value = match i.func3 {
        0 => rs1.wrapping_add(imm), // ADDI
        1 => rs1 << shamt,          // SLLI
        2 => (signed_rs1 < (imm as i32)) as u32, // SLTI
        3 => (rs1 < imm) as u32,    // SLTIU
        4 => rs1 ^ imm,             // XORI
        5 => {
            // SRLI if imm[11:5] == 0, SRAI if imm[11:5] == 0b0100000.
            if (i.imm_11_0 >> 5) & 0x7f == 0b0100000 {
                ((signed_rs1) >> shamt) as u32 // SRAI
            } else {
                rs1 >> shamt // SRLI
            }
        }
        6 => rs1 | imm, // ORI
        7 => rs1 & imm, // ANDI
        func3 => return Err(Fault::UndefinedFunc3 { pc: core.pc, insn: "OP-IMM", func3 }),
    };
    core.set(i.rd, value);
    Ok(())
}

fn exec_op(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let r = decode_rtype(word);
    let rs1 = core.get(r.rs1);
    let rs2 = core.get(r.rs2);
    let alt = r.func7 & (1 << 5) != 0;

    let value = match r.func3 {
        0 => {
            if alt {
                rs1.wrapping_sub(rs2) // SUB
            } else {
                rs1.wrapping_add(rs2) // ADD
            }
        }
        1 => rs1 << (rs2 & 0x1f), // SLL
        2 => ((rs1 as i32) < (rs2 as i32)) as u32, // SLT
        3 => (rs1 < rs2) as u32,  // SLTU
        4 => rs1 ^ rs2,           // XOR
        5 => {
            if alt {
                ((rs1 as i32) >> (rs2 & 0x1f)) as u32 // SRA
            } else {
                rs1 >> (rs2 & 0x1f) // SRL
            }
        }
        6 => rs1 | rs2, // OR
        7 => rs1 & rs2, // AND
        func3 => return Err(Fault::UndefinedFunc3 { pc: core.pc, insn: "OP", func3 }),
    };
    core.set(r.rd, value);
    Ok(())
}

fn exec_lui(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let u = decode_utype(word);
    core.set(u.rd, u.imm);
    Ok(())
}

fn exec_auipc(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let u = decode_utype(word);
    core.set(u.rd, core.pc.wrapping_add(u.imm));
    Ok(())
}

fn exec_jal(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let j = decode_jtype(word);
    let link = core.pc.wrapping_add(4);
    core.set(j.rd, link);
    core.pc = core.pc.wrapping_add(j.imm);
    Ok(())
}

fn exec_jalr(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let i = decode_itype(word);
    let link = core.pc.wrapping_add(4);
    // Read rs1 before writing rd: they may alias.
    let target = core.get(i.rs1).wrapping_add(i.imm) & !1;
    core.set(i.rd, link);
    core.pc = target;
    Ok(())
}

fn exec_branch(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    let b = decode_btype(word);
    let rs1 = core.get(b.rs1);
    let rs2 = core.get(b.rs2);

    let take = match b.func3 {
        0 => rs1 == rs2,                         // BEQ
        1 => rs1 != rs2,                         // BNE
        4 => (rs1 as i32) < (rs2 as i32),        // BLT
        5 => (rs1 as i32) >= (rs2 as i32),       // BGE
        6 => rs1 < rs2,                          // BLTU
        7 => rs1 >= rs2,                          // BGEU
        func3 => return Err(Fault::UndefinedFunc3 { pc: core.pc, insn: "BRANCH", func3 }),
    };

    core.pc = if take {
        core.pc.wrapping_add(b.imm)
    } else {
        core.pc.wrapping_add(4)
    };
    Ok(())
}

fn exec_system(core: &mut Core, _machine: &mut Machine, word: u32) -> Result<(), Fault> {
    Err(Fault::UnimplementedSystem { pc: core.pc, word })
}
