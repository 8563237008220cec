//! Classification of the confirmed-live URL set.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ClassifiedUrls;

/// JavaScript asset paths, with or without a trailing query string.
static JS_ASSET_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.js(\?|$)").unwrap());

/// URLs carrying at least one `key=value` query parameter.
static QUERY_PARAM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?[^=]+=.+$").unwrap());

/// Splits live URLs into the full set, JS assets, and parameterized
/// endpoints. The splits overlap: a `.js?v=2` URL lands in all three.
pub fn classify(live: &[String]) -> ClassifiedUrls {
    let mut classified = ClassifiedUrls {
        all: live.to_vec(),
        ..Default::default()
    };
    for url in live {
        if JS_ASSET_REGEX.is_match(url) {
            classified.js.push(url.clone());
        }
        if QUERY_PARAM_REGEX.is_match(url) {
            classified.parameterized.push(url.clone());
        }
    }
    classified
}
