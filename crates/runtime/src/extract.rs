//! Turns the model's free text into offers and its grounding chunks into
//! citations.
//!
//! The model is asked for a bare JSON array but routinely wraps it in prose or
//! markdown fences, so the array is located by its outermost brackets before
//! parsing.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use hyperscan_core::{Citation, Offer};

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No `[` ... `]` span in the text.  Treated as an empty result.
    #[error("no JSON array found in model output")]
    NoJsonFound,
    #[error("model output contained a malformed JSON array: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub offers: Vec<Offer>,
    pub citations: Vec<Citation>,
}

/// The widest bracket span: first `[` through last `]`, inclusive.
pub fn locate_json_array(raw_text: &str) -> Option<&str> {
    let start = raw_text.find('[')?;
    let end = raw_text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw_text[start..=end])
}

/// Parse the embedded array into offers, dropping elements that lack any of
/// the four required fields.  Order is preserved.
pub fn extract_offers(raw_text: &str) -> Result<Vec<Offer>, ExtractionError> {
    let span = locate_json_array(raw_text).ok_or(ExtractionError::NoJsonFound)?;
    let elements: Vec<Value> = serde_json::from_str(span)?;

    let total = elements.len();
    let offers: Vec<Offer> = elements.iter().filter_map(offer_from_value).collect();
    if offers.len() != total {
        debug!(
            total,
            kept = offers.len(),
            dropped = total - offers.len(),
            "dropped invalid offer elements"
        );
    }
    Ok(offers)
}

fn offer_from_value(value: &Value) -> Option<Offer> {
    let object = value.as_object()?;
    // Values are kept verbatim; only the empty string counts as missing.
    let required = |key: &str| -> Option<String> {
        let text = object.get(key)?.as_str()?;
        (!text.is_empty()).then(|| text.to_string())
    };

    Some(Offer {
        name: required("name")?,
        store: required("store")?,
        price: required("price")?,
        link: required("link")?,
        image: object
            .get("image")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_default(),
    })
}

/// Citations from raw grounding chunks, unique by URI (first occurrence
/// wins).  Chunks without a `web.uri` are skipped.
pub fn extract_citations(chunks: &[Value]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for chunk in chunks {
        let Some(web) = chunk.get("web") else {
            continue;
        };
        let Some(uri) = web
            .get("uri")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
        else {
            continue;
        };
        if !seen.insert(uri.to_string()) {
            continue;
        }

        let title = web
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| fallback_title(uri));

        citations.push(Citation {
            uri: uri.to_string(),
            title,
        });
    }

    citations
}

fn fallback_title(uri: &str) -> String {
    url::Url::parse(uri)
        .ok()
        .and_then(|parsed| parsed.host_str().map(ToString::to_string))
        .unwrap_or_else(|| uri.to_string())
}

/// Offers and citations together.  Citation extraction never fails, so on
/// [`ExtractionError::NoJsonFound`] callers still get citations from
/// [`extract_citations`].
pub fn extract(raw_text: &str, chunks: &[Value]) -> Result<Extraction, ExtractionError> {
    Ok(Extraction {
        offers: extract_offers(raw_text)?,
        citations: extract_citations(chunks),
    })
}
