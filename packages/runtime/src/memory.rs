//! String marshalling over the module's linear memory.
//!
//! The engine and the host exchange text through a single input cell at a
//! fixed address. The host writes NUL-terminated UTF-8 there before
//! invoking an export; the engine hands text back by passing the address
//! of a NUL-terminated string to an import.
//!
//! The [`Marshaller`] works on plain byte slices so the same code serves a
//! live wasmtime memory (`Memory::data`/`Memory::data_mut`) and tests.

use crate::error::MemoryFault;

/// Start of the host-to-engine text handoff region.
pub const INPUT_ADDRESS: usize = 51200;

/// Reads and writes NUL-terminated strings at a fixed input address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marshaller {
    input_address: usize,
}

impl Default for Marshaller {
    fn default() -> Self {
        Self::new(INPUT_ADDRESS)
    }
}

impl Marshaller {
    /// Create a marshaller whose input cell starts at `input_address`.
    pub fn new(input_address: usize) -> Self {
        Self { input_address }
    }

    /// The address of the input cell.
    pub fn input_address(&self) -> usize {
        self.input_address
    }

    /// Store `text` plus a terminator at the input cell, replacing
    /// whatever was there.
    pub fn write_string(&self, memory: &mut [u8], text: &str) -> Result<(), MemoryFault> {
        let bytes = text.as_bytes();
        let end = checked_end(memory.len(), self.input_address, bytes.len() + 1)?;
        memory[self.input_address..end - 1].copy_from_slice(bytes);
        memory[end - 1] = 0;
        Ok(())
    }

    /// Extend the pending input with `bytes`.
    ///
    /// The write starts at the first NUL at or after the input cell, so
    /// bytes the engine has not consumed yet stay in place. `bytes` is
    /// copied up to its own first NUL (or its end) and then terminated.
    pub fn append_string(&self, memory: &mut [u8], bytes: &[u8]) -> Result<(), MemoryFault> {
        let offset = self.input_address + nul_offset(memory, self.input_address)?;
        let chunk = match bytes.iter().position(|&b| b == 0) {
            Some(nul) => &bytes[..nul],
            None => bytes,
        };
        let end = checked_end(memory.len(), offset, chunk.len() + 1)?;
        memory[offset..end - 1].copy_from_slice(chunk);
        memory[end - 1] = 0;
        Ok(())
    }

    /// Decode the NUL-terminated string starting at `address`.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected; the
    /// engine's own output is the only producer of these strings.
    pub fn read_string(&self, memory: &[u8], address: usize) -> Result<String, MemoryFault> {
        let len = nul_offset(memory, address)?;
        Ok(String::from_utf8_lossy(&memory[address..address + len]).into_owned())
    }

    /// Borrow `len` raw bytes at `address`.
    pub fn read_bytes<'m>(
        &self,
        memory: &'m [u8],
        address: usize,
        len: usize,
    ) -> Result<&'m [u8], MemoryFault> {
        let end = checked_end(memory.len(), address, len)?;
        Ok(&memory[address..end])
    }

    /// Read back the pending input at the input cell.
    pub fn read_input(&self, memory: &[u8]) -> Result<String, MemoryFault> {
        self.read_string(memory, self.input_address)
    }
}

fn checked_end(size: usize, address: usize, len: usize) -> Result<usize, MemoryFault> {
    address
        .checked_add(len)
        .filter(|&end| end <= size)
        .ok_or(MemoryFault { address, len, size })
}

/// Distance from `address` to the next NUL byte.
fn nul_offset(memory: &[u8], address: usize) -> Result<usize, MemoryFault> {
    let fault = MemoryFault {
        address,
        len: memory.len().saturating_sub(address) + 1,
        size: memory.len(),
    };
    memory
        .get(address..)
        .and_then(|tail| tail.iter().position(|&b| b == 0))
        .ok_or(fault)
}
