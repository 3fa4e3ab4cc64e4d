//! Symbol resolution.
//!
//! [`SymbolManager`] reads the ELF symbol table of the firmware image.
//! [`SymbolTable`] holds the addresses one RTOS backend asked for, resolved
//! once before detection and treated as read-only afterwards.

use anyhow::{Context, Result};
use object::{Object, ObjectSymbol};
use std::path::Path;

/// A kernel symbol a backend needs resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRequest {
    pub name: &'static str,
    pub optional: bool,
}

impl SymbolRequest {
    pub const fn required(name: &'static str) -> Self {
        Self { name, optional: false }
    }
}

/// Resolved addresses for a backend's [`SymbolRequest`]s, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<(SymbolRequest, u64)>,
}

impl SymbolTable {
    /// Resolve every request through `lookup`. Unresolved names are kept with
    /// address zero.
    pub fn resolve(requests: &[SymbolRequest], mut lookup: impl FnMut(&str) -> Option<u64>) -> Self {
        let entries = requests
            .iter()
            .map(|&request| {
                let address = lookup(request.name).unwrap_or(0);
                if address == 0 {
                    log::debug!("Symbol {} not resolved", request.name);
                }
                (request, address)
            })
            .collect();
        Self { entries }
    }

    /// Non-zero address of `name`, if it was requested and resolved.
    pub fn address(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(request, _)| request.name == name)
            .map(|&(_, address)| address)
            .filter(|&address| address != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolRequest, u64)> + '_ {
        self.entries.iter().map(|(request, address)| (request, *address))
    }

    /// Required symbols that did not resolve.
    pub fn unresolved(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(request, address)| !request.optional && *address == 0)
            .map(|(request, _)| request.name)
            .collect()
    }
}

/// Manager for the firmware's ELF symbol table.
pub struct SymbolManager {
    elf_data: Option<Vec<u8>>,
}

impl SymbolManager {
    pub fn new() -> Self {
        Self { elf_data: None }
    }

    /// Load symbols from an ELF file.
    pub fn load_elf(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        object::File::parse(&*data)
            .with_context(|| format!("Failed to parse ELF {}", path.display()))?;

        self.elf_data = Some(data);
        log::info!("Loaded symbols from {}", path.display());
        Ok(())
    }

    pub fn has_symbols(&self) -> bool {
        self.elf_data.is_some()
    }

    /// Lookup a symbol address by name from the ELF symbol table.
    pub fn lookup_symbol(&self, name: &str) -> Option<u64> {
        let data = self.elf_data.as_ref()?;
        let obj = object::File::parse(&**data).ok()?;

        obj.symbols()
            .find(|symbol| symbol.name().is_ok_and(|sym_name| sym_name == name))
            .map(|symbol| symbol.address())
    }
}

impl Default for SymbolManager {
    fn default() -> Self {
        Self::new()
    }
}
