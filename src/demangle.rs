//! In-process symbol demangling.
//!
//! Rust symbols are tried first (`rustc-demangle`, alternate form to drop
//! the trailing hash), then Itanium C++ symbols (`cpp_demangle`). Anything
//! neither library understands is returned unchanged. The stripped mode
//! drops function parameter lists, which keeps symbol labels readable at
//! the cost of ambiguity between overloads; the full mode exists for
//! disambiguating them.

use cpp_demangle::{DemangleOptions, Symbol};

/// How much of the demangled name to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemangleMode {
    /// The full demangled name, parameters included.
    Full,
    /// Parameter lists and return types stripped.
    Stripped,
}

/// Demangle `name` for display. Always returns something printable; on
/// any parse failure the mangled input comes back unchanged.
#[must_use]
pub fn demangle(name: &str, mode: DemangleMode) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        // The alternate form omits the trailing disambiguator hash.
        return format!("{demangled:#}");
    }

    if let Ok(symbol) = Symbol::new(name.as_bytes()) {
        let options = match mode {
            DemangleMode::Full => DemangleOptions::new(),
            DemangleMode::Stripped => DemangleOptions::new().no_params().no_return_type(),
        };
        if let Ok(demangled) = symbol.demangle(&options) {
            return demangled;
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_symbol_loses_hash() {
        let mangled = "_ZN4core3fmt9Formatter3pad17h2e9e9c7e8e3e0c01E";
        let demangled = demangle(mangled, DemangleMode::Full);
        assert_eq!(demangled, "core::fmt::Formatter::pad");
    }

    #[test]
    fn test_cpp_symbol_full_keeps_params() {
        let mangled = "_ZN5bloat8RangeMap3addEmmRKNSt3__112basic_stringIcEE";
        let full = demangle(mangled, DemangleMode::Full);
        assert!(full.contains("RangeMap::add"), "{full}");
        assert!(full.contains('('), "{full}");
    }

    #[test]
    fn test_cpp_symbol_stripped_drops_params() {
        let mangled = "_Z9live_fastiPKc";
        let stripped = demangle(mangled, DemangleMode::Stripped);
        assert_eq!(stripped, "live_fast");
    }

    #[test]
    fn test_unmangled_name_passes_through() {
        assert_eq!(demangle("main", DemangleMode::Full), "main");
        assert_eq!(demangle("_start", DemangleMode::Stripped), "_start");
    }
}
