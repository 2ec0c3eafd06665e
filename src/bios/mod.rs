//! Bare-metal (BIOS) support code.

pub mod runtime;

pub use runtime::{RUNTIME, SUBROUTINES};

/// Text-mode video memory segment.
pub const VIDEO_SEGMENT: u16 = 0xB800;

/// Load address of a BIOS boot sector.
pub const LOAD_ADDRESS: u16 = 0x7C00;

/// Offset of the boot signature inside the 512-byte sector.
pub const SIGNATURE_OFFSET: u16 = 510;

/// Boot signature the BIOS checks before jumping to the sector.
pub const SIGNATURE: u16 = 0xAA55;
