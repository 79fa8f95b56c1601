//! Decoding of AArch64 instruction words.
//!
//! Only the encodings the trampoline generator and the test bodies produce
//! are recognized; anything else decodes to `None`. Decoded operations print
//! in the same assembly syntax the generator's listings use.

use core::fmt;

/// A general-purpose register operand, with encoding 31 resolved to `sp` or
/// the zero register according to the instruction's context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XReg {
    /// `x0` through `x30`.
    X(u8),
    /// The stack pointer.
    Sp,
    /// The zero register.
    Zr,
}

impl XReg {
    fn sp_or_x(enc: u32) -> XReg {
        match enc & 31 {
            31 => XReg::Sp,
            n => XReg::X(n as u8),
        }
    }

    fn zr_or_x(enc: u32) -> XReg {
        match enc & 31 {
            31 => XReg::Zr,
            n => XReg::X(n as u8),
        }
    }

    fn show(self, sf: bool) -> String {
        let prefix = if sf { "x" } else { "w" };
        match self {
            XReg::X(n) => format!("{prefix}{n}"),
            XReg::Sp if sf => "sp".to_string(),
            XReg::Sp => "wsp".to_string(),
            XReg::Zr => format!("{prefix}zr"),
        }
    }
}

/// Width and register file of a load or store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LdStKind {
    /// 32-bit integer register.
    W,
    /// 64-bit integer register.
    X,
    /// 32-bit float register.
    S,
    /// 64-bit float register.
    D,
    /// 128-bit vector register.
    Q,
}

impl LdStKind {
    /// Access width in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            LdStKind::W | LdStKind::S => 4,
            LdStKind::X | LdStKind::D => 8,
            LdStKind::Q => 16,
        }
    }

    /// Whether the transfer register is a float/vector register.
    pub fn is_fp(self) -> bool {
        matches!(self, LdStKind::S | LdStKind::D | LdStKind::Q)
    }

    fn show(self, rt: u8) -> String {
        let prefix = match self {
            LdStKind::W => "w",
            LdStKind::X => "x",
            LdStKind::S => "s",
            LdStKind::D => "d",
            LdStKind::Q => "q",
        };
        if rt == 31 && !self.is_fp() {
            format!("{prefix}zr")
        } else {
            format!("{prefix}{rt}")
        }
    }
}

/// The address computation of a load or store. The base is never the zero
/// register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Addr {
    /// `[rn, #off]` with a scaled unsigned offset, already multiplied out.
    UnsignedOffset {
        /// Base.
        rn: XReg,
        /// Byte offset.
        offset: u64,
    },
    /// `[rn, #off]` with an unscaled signed offset.
    Unscaled {
        /// Base.
        rn: XReg,
        /// Byte offset.
        offset: i64,
    },
    /// `[rn], #off`: access at `rn`, then add the offset to `rn`.
    PostIndex {
        /// Base, written back.
        rn: XReg,
        /// Byte offset added after the access.
        offset: i64,
    },
    /// `[rn, rm]`.
    RegOffset {
        /// Base.
        rn: XReg,
        /// Index register.
        rm: XReg,
    },
}

impl Addr {
    /// The base register.
    pub fn base(&self) -> XReg {
        match *self {
            Addr::UnsignedOffset { rn, .. }
            | Addr::Unscaled { rn, .. }
            | Addr::PostIndex { rn, .. }
            | Addr::RegOffset { rn, .. } => rn,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base().show(true);
        match *self {
            Addr::UnsignedOffset { offset: 0, .. } | Addr::Unscaled { offset: 0, .. } => {
                write!(f, "[{base}]")
            }
            Addr::UnsignedOffset { offset, .. } => write!(f, "[{base}, #{offset}]"),
            Addr::Unscaled { offset, .. } => write!(f, "[{base}, #{offset}]"),
            Addr::PostIndex { offset, .. } => write!(f, "[{base}], #{offset}"),
            Addr::RegOffset { rm, .. } => write!(f, "[{base}, {}]", rm.show(true)),
        }
    }
}

/// A decoded operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `orr rd, rn, rm` (shifted register form, no shift).
    OrrReg {
        /// 64-bit operation.
        sf: bool,
        /// Destination.
        rd: XReg,
        /// First source.
        rn: XReg,
        /// Second source.
        rm: XReg,
    },
    /// `add`/`sub` with a 12-bit immediate, optionally shifted by 12.
    AddSubImm {
        /// 64-bit operation.
        sf: bool,
        /// Subtract rather than add.
        sub: bool,
        /// Destination, may be `sp`.
        rd: XReg,
        /// Source, may be `sp`.
        rn: XReg,
        /// The 12-bit immediate.
        imm12: u32,
        /// Whether the immediate is shifted left by 12.
        shift12: bool,
    },
    /// `add`/`sub` of two registers, no shift.
    AddSubReg {
        /// 64-bit operation.
        sf: bool,
        /// Subtract rather than add.
        sub: bool,
        /// Destination.
        rd: XReg,
        /// First source.
        rn: XReg,
        /// Second source.
        rm: XReg,
    },
    /// `movz`/`movk`.
    MovWide {
        /// 64-bit operation.
        sf: bool,
        /// `movk`: keep the other bits of `rd`.
        keep: bool,
        /// Destination.
        rd: XReg,
        /// The 16-bit immediate.
        imm16: u16,
        /// Left shift of the immediate in bits.
        shift: u8,
    },
    /// A load or store.
    LdSt {
        /// Load rather than store.
        load: bool,
        /// Width and register file.
        kind: LdStKind,
        /// Transfer register number.
        rt: u8,
        /// Address.
        addr: Addr,
    },
    /// Scalar `fadd`.
    FAdd {
        /// Double rather than single precision.
        double: bool,
        /// Destination.
        rd: u8,
        /// First source.
        rn: u8,
        /// Second source.
        rm: u8,
    },
    /// `bl` to a displacement from this instruction.
    Bl {
        /// Byte displacement.
        offset: i64,
    },
    /// `b` to a displacement from this instruction.
    B {
        /// Byte displacement.
        offset: i64,
    },
    /// `ret` through a register.
    Ret {
        /// The register holding the return address.
        rn: XReg,
    },
}

fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    (i64::from(value) << shift) >> shift
}

/// Decodes one instruction word.
pub fn decode(word: u32) -> Option<Op> {
    let sf = word >> 31 == 1;
    let rd = word & 31;
    let rn = (word >> 5) & 31;
    let rm = (word >> 16) & 31;

    // Loads and stores: op0 = x1x0.
    if (word >> 27) & 0b111 == 0b111 && (word >> 25) & 1 == 0 {
        return decode_ldst(word);
    }

    if word & 0xffff_fc1f == 0xd65f_0000 {
        return Some(Op::Ret {
            rn: XReg::zr_or_x(rn),
        });
    }
    match word >> 26 {
        0b100101 => {
            return Some(Op::Bl {
                offset: sign_extend(word & 0x3ff_ffff, 26) * 4,
            });
        }
        0b000101 => {
            return Some(Op::B {
                offset: sign_extend(word & 0x3ff_ffff, 26) * 4,
            });
        }
        _ => {}
    }

    // Add/subtract (immediate), flags not set.
    if (word >> 23) & 0x3f == 0b100010 && (word >> 29) & 1 == 0 {
        return Some(Op::AddSubImm {
            sf,
            sub: (word >> 30) & 1 == 1,
            rd: XReg::sp_or_x(rd),
            rn: XReg::sp_or_x(rn),
            imm12: (word >> 10) & 0xfff,
            shift12: (word >> 22) & 1 == 1,
        });
    }

    // Add/subtract (shifted register), LSL #0 only, flags not set.
    if (word >> 24) & 0x1f == 0b01011 && (word >> 21) & 0b111 == 0 && (word >> 29) & 1 == 0 {
        if (word >> 10) & 0x3f != 0 {
            return None;
        }
        return Some(Op::AddSubReg {
            sf,
            sub: (word >> 30) & 1 == 1,
            rd: XReg::zr_or_x(rd),
            rn: XReg::zr_or_x(rn),
            rm: XReg::zr_or_x(rm),
        });
    }

    // ORR (shifted register), LSL #0 only.
    if (word >> 21) & 0x3ff == 0b01_01010_00_0 {
        if (word >> 10) & 0x3f != 0 {
            return None;
        }
        return Some(Op::OrrReg {
            sf,
            rd: XReg::zr_or_x(rd),
            rn: XReg::zr_or_x(rn),
            rm: XReg::zr_or_x(rm),
        });
    }

    // Move wide: movz and movk.
    if (word >> 23) & 0x3f == 0b100101 {
        let keep = match (word >> 29) & 0b11 {
            0b10 => false,
            0b11 => true,
            _ => return None,
        };
        let hw = (word >> 21) & 0b11;
        if !sf && hw > 1 {
            return None;
        }
        return Some(Op::MovWide {
            sf,
            keep,
            rd: XReg::zr_or_x(rd),
            imm16: ((word >> 5) & 0xffff) as u16,
            shift: (hw * 16) as u8,
        });
    }

    // Scalar FADD.
    if word & 0xff20_fc00 == 0x1e20_2800 {
        let double = match (word >> 22) & 0b11 {
            0b00 => false,
            0b01 => true,
            _ => return None,
        };
        return Some(Op::FAdd {
            double,
            rd: rd as u8,
            rn: rn as u8,
            rm: rm as u8,
        });
    }

    None
}

fn decode_ldst(word: u32) -> Option<Op> {
    let size = word >> 30;
    let v = (word >> 26) & 1 == 1;
    let opc = (word >> 22) & 0b11;
    let (kind, load) = match (v, size, opc) {
        (false, 0b10, 0b00 | 0b01) => (LdStKind::W, opc == 0b01),
        (false, 0b11, 0b00 | 0b01) => (LdStKind::X, opc == 0b01),
        (true, 0b00, 0b10 | 0b11) => (LdStKind::Q, opc == 0b11),
        (true, 0b10, 0b00 | 0b01) => (LdStKind::S, opc == 0b01),
        (true, 0b11, 0b00 | 0b01) => (LdStKind::D, opc == 0b01),
        _ => return None,
    };
    let rt = (word & 31) as u8;
    let rn = XReg::sp_or_x(word >> 5);

    let addr = if (word >> 24) & 1 == 1 {
        Addr::UnsignedOffset {
            rn,
            offset: u64::from((word >> 10) & 0xfff) * kind.bytes(),
        }
    } else if (word >> 21) & 1 == 1 {
        // Register offset: only `LSL` with no scaling.
        if (word >> 10) & 0b11 != 0b10 || (word >> 12) & 0b1111 != 0b0110 {
            return None;
        }
        Addr::RegOffset {
            rn,
            rm: XReg::zr_or_x(word >> 16),
        }
    } else {
        let offset = sign_extend((word >> 12) & 0x1ff, 9);
        match (word >> 10) & 0b11 {
            0b00 => Addr::Unscaled { rn, offset },
            0b01 => Addr::PostIndex { rn, offset },
            _ => return None,
        }
    };
    Some(Op::LdSt {
        load,
        kind,
        rt,
        addr,
    })
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::OrrReg {
                sf,
                rd,
                rn: XReg::Zr,
                rm,
            } => write!(f, "mov {}, {}", rd.show(sf), rm.show(sf)),
            Op::OrrReg { sf, rd, rn, rm } => {
                write!(f, "orr {}, {}, {}", rd.show(sf), rn.show(sf), rm.show(sf))
            }
            Op::AddSubImm {
                sf,
                sub: false,
                rd,
                rn,
                imm12: 0,
                ..
            } if rd == XReg::Sp || rn == XReg::Sp => {
                write!(f, "mov {}, {}", rd.show(sf), rn.show(sf))
            }
            Op::AddSubImm {
                sf,
                sub,
                rd,
                rn,
                imm12,
                shift12,
            } => {
                let op = if sub { "sub" } else { "add" };
                write!(f, "{op} {}, {}, #{imm12}", rd.show(sf), rn.show(sf))?;
                if shift12 {
                    write!(f, ", lsl #12")?;
                }
                Ok(())
            }
            Op::AddSubReg {
                sf,
                sub,
                rd,
                rn,
                rm,
            } => {
                let op = if sub { "sub" } else { "add" };
                write!(f, "{op} {}, {}, {}", rd.show(sf), rn.show(sf), rm.show(sf))
            }
            Op::MovWide {
                sf,
                keep,
                rd,
                imm16,
                shift,
            } => {
                let op = if keep { "movk" } else { "movz" };
                write!(f, "{op} {}, #{imm16}", rd.show(sf))?;
                if shift != 0 {
                    write!(f, ", LSL #{shift}")?;
                }
                Ok(())
            }
            Op::LdSt {
                load,
                kind,
                rt,
                addr,
            } => {
                let op = match (load, matches!(addr, Addr::Unscaled { .. })) {
                    (true, false) => "ldr",
                    (true, true) => "ldur",
                    (false, false) => "str",
                    (false, true) => "stur",
                };
                write!(f, "{op} {}, {addr}", kind.show(rt))
            }
            Op::FAdd { double, rd, rn, rm } => {
                let p = if double { "d" } else { "s" };
                write!(f, "fadd {p}{rd}, {p}{rn}, {p}{rm}")
            }
            Op::Bl { offset } => write!(f, "bl #{offset}"),
            Op::B { offset } => write!(f, "b #{offset}"),
            Op::Ret { rn: XReg::X(30) } => write!(f, "ret"),
            Op::Ret { rn } => write!(f, "ret {}", rn.show(true)),
        }
    }
}

/// Disassembles `code`, one instruction per line, each prefixed with its
/// offset. Words that don't decode are shown as `.word`.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in code.chunks(4).enumerate() {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        let word = u32::from_le_bytes(bytes);
        let text = match decode(word) {
            Some(op) => op.to_string(),
            None => format!(".word {word:#010x}"),
        };
        out.push_str(&format!("{:>4}: {text}\n", i * 4));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dis(word: u32) -> String {
        decode(word).map(|op| op.to_string()).unwrap_or_default()
    }

    #[test]
    fn known_words() {
        assert_eq!(dis(0xd65f03c0), "ret");
        assert_eq!(dis(0xaa0003f4), "mov x20, x0");
        assert_eq!(dis(0x910003fb), "mov x27, sp");
        assert_eq!(dis(0x9100035f), "mov sp, x26");
        assert_eq!(dis(0xd100435a), "sub x26, x26, #16");
        assert_eq!(dis(0xd1400b5a), "sub x26, x26, #2, lsl #12");
        assert_eq!(dis(0x0b030040), "add w0, w2, w3");
        assert_eq!(dis(0xd2900010), "movz x16, #32768");
        assert_eq!(dis(0xf2a00030), "movk x16, #1, LSL #16");
        assert_eq!(dis(0xb8408722), "ldr w2, [x25], #8");
        assert_eq!(dis(0x3cc1072f), "ldr q15, [x25], #16");
        assert_eq!(dis(0xf9000a9d), "str x29, [x20, #16]");
        assert_eq!(dis(0x3d8003ef), "str q15, [sp]");
        assert_eq!(dis(0xf800c3fb), "stur x27, [sp, #12]");
        assert_eq!(dis(0xf8306bfb), "str x27, [sp, x16]");
        assert_eq!(dis(0x1e632840), "fadd d0, d2, d3");
        assert_eq!(dis(0x94000007), "bl #28");
        assert_eq!(dis(0x97ffffff), "bl #-4");
        assert_eq!(dis(0x14000002), "b #8");
    }

    #[test]
    fn unknown_words() {
        // udf #0, `ldr x0, [x1, #8]!` (pre-index) and `adds x0, x0, #1`.
        assert_eq!(decode(0x0000_0000), None);
        assert_eq!(decode(0xf8408c20), None);
        assert_eq!(decode(0xb1000400), None);
    }

    #[test]
    fn disassembles_offsets() {
        let code = [0xc0, 0x03, 0x5f, 0xd6, 0, 0, 0, 0];
        assert_eq!(disassemble(&code), "   0: ret\n   4: .word 0x00000000\n");
    }
}
