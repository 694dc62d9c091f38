//! URL handling module for Press-Sieve
//!
//! Domain extraction, wildcard domain patterns and the URL canonicalisation
//! that feeds the URL fingerprint.

mod domain;
mod matcher;
mod normalize;

pub use domain::{domain_of, extract_domain};
pub use matcher::{matches_wildcard, DomainPatterns};
pub use normalize::normalize_url;
