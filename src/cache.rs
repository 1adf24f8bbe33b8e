//! The process-wide parse-and-compile cache
//!
//! The only cross-call state in the crate: a map from query source strings
//! to their compiled form. Entries are immutable once inserted and handed
//! out as `Arc`s, so in-flight evaluations are never invalidated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::error::ParseError;
use crate::eval::compile::{compile, CompiledPath};
use crate::parser;

static COMPILED: Lazy<Mutex<HashMap<String, Arc<CompiledPath>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch the compiled form of a query source, parsing and compiling on the
/// first use
pub(crate) fn compiled(source: &str) -> Result<Arc<CompiledPath>, ParseError> {
    if let Some(hit) = COMPILED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(source)
    {
        return Ok(Arc::clone(hit));
    }
    // parse outside the lock; a racing insert of the same source wins and
    // this one is dropped
    let fresh = Arc::new(compile(parser::parse(source)?));
    let mut cache = COMPILED.lock().unwrap_or_else(PoisonError::into_inner);
    let entry = cache
        .entry(source.to_owned())
        .or_insert_with(|| Arc::clone(&fresh));
    Ok(Arc::clone(entry))
}

#[cfg(test)]
mod tests {
    use super::compiled;

    #[test]
    fn same_source_shares_the_compiled_path() {
        let a = compiled("$.cache.test[0]").unwrap();
        let b = compiled("$.cache.test[0]").unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn parse_errors_are_not_cached() {
        assert!(compiled("$[").is_err());
        assert!(compiled("$[").is_err());
    }
}
