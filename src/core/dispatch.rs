use crate::core::extract::{BillExtractor, EndesaExtractor, IberdrolaExtractor};
use crate::utils::error::{BillEtlError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

fn extractor_by_name(name: &str) -> Option<Arc<dyn BillExtractor>> {
    match name {
        "endesa" => Some(Arc::new(EndesaExtractor::new())),
        "iberdrola" => Some(Arc::new(IberdrolaExtractor::new())),
        _ => None,
    }
}

/// Routes a document to its issuer's extractor. The routing table is built
/// once at startup from the `dispatchers` configuration (issuer identity
/// string, tax id or free-text name, mapped to an extractor name) and is
/// read-only afterwards.
pub struct Dispatcher {
    routes: BTreeMap<String, Arc<dyn BillExtractor>>,
}

impl Dispatcher {
    pub fn from_config(dispatchers: &BTreeMap<String, String>) -> Result<Self> {
        let mut routes = BTreeMap::new();
        for (identity, extractor_name) in dispatchers {
            let extractor = extractor_by_name(extractor_name).ok_or_else(|| {
                BillEtlError::config(format!(
                    "dispatchers.'{identity}': unknown extractor '{extractor_name}'"
                ))
            })?;
            routes.insert(identity.clone(), extractor);
        }
        Ok(Dispatcher { routes })
    }

    /// Exact-match lookup of an issuer identity string. Unknown issuers are
    /// a hard stop for the document: skipped and reported, never guessed.
    pub fn dispatch(&self, issuer: &str) -> Result<&dyn BillExtractor> {
        self.routes
            .get(issuer)
            .map(|e| e.as_ref())
            .ok_or_else(|| BillEtlError::UnknownIssuer {
                issuer: issuer.to_string(),
            })
    }

    /// Scans document lines for any configured identity string and returns
    /// the first match, in deterministic (sorted-identity) order per line.
    pub fn identify(&self, text: &str) -> Option<&str> {
        for line in text.lines() {
            for identity in self.routes.keys() {
                if line.contains(identity.as_str()) {
                    return Some(identity);
                }
            }
        }
        None
    }
}
