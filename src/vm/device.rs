// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output devices reachable through `out`/`outb`.

use std::io::Write;

/// A device registered at a memory-mapped address. Handlers run
/// synchronously inside instruction dispatch.
pub trait OutputDevice {
    fn out(&mut self, addr: u16, value: u16);
    fn outb(&mut self, addr: u16, value: u8);
}

/// Byte-oriented console. `outb` writes the byte to stdout as-is; `out`
/// writes both bytes of the word, high byte first.
#[derive(Debug, Default)]
pub struct Console;

impl OutputDevice for Console {
    fn out(&mut self, addr: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.outb(addr, hi);
        self.outb(addr, lo);
    }

    fn outb(&mut self, _addr: u16, value: u8) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(&[value]);
        let _ = stdout.flush();
    }
}
