//! Placeholder substitution engine.
//!
//! Template files carry literal tokens (`MERCHANT_ID`, `localhost`, `8080`,
//! `http://`, and a legacy hard-coded IP) that are replaced with
//! merchant-specific values. Replacement is literal and global, applied rule
//! by rule over the output of the previous rule, so rule order is part of the
//! contract: the identifier goes first because a domain or port value may
//! itself contain text that a later token would match.
//!
//! Matching is deliberately unbounded. A token that appears inside unrelated
//! text (`18080`, `localhost.example`) is replaced too; sites already in
//! production were provisioned with exactly this behavior and must keep
//! reconfiguring the same way.
//!
//! Everything operates on raw bytes so binary assets under `static/` pass
//! through untouched unless they happen to contain a token.

use serde::Serialize;

use crate::merchant::MerchantId;

/// Identifier placeholder in template content and file names.
pub const MERCHANT_ID_TOKEN: &str = "MERCHANT_ID";
/// Default host literal in template content.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port literal in template content.
pub const DEFAULT_PORT: &str = "8080";
/// Plain-HTTP scheme literal in template content.
pub const HTTP_SCHEME: &str = "http://";
/// Legacy hard-coded host that older templates still point at.
pub const LEGACY_HOST_IP: &str = "16.163.193.74";
/// Scheme used when none is configured.
pub const DEFAULT_PROTOCOL: &str = "https";

/// Tokens matched by the network rules, in rule order.
pub const NETWORK_TOKENS: [&str; 4] = [DEFAULT_HOST, DEFAULT_PORT, HTTP_SCHEME, LEGACY_HOST_IP];

/// One literal replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub from: String,
    pub to: String,
}

impl Rule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Where a merchant site is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteAddress {
    pub domain: String,
    pub port: String,
    pub protocol: String,
}

impl SiteAddress {
    pub fn new(
        domain: impl Into<String>,
        port: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            port: port.into(),
            protocol: protocol.into(),
        }
    }

    /// Public URL of the merchant's landing page.
    pub fn index_url(&self, merchant: &MerchantId) -> String {
        format!(
            "{}://{}:{}/{}/html/{}",
            self.protocol,
            self.domain,
            self.port,
            merchant.dir_name(),
            merchant.index_file_name()
        )
    }
}

/// An ordered list of literal replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionRules(Vec<Rule>);

impl SubstitutionRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    /// Rules for seeding a new site from the template: identifier first,
    /// then the network-location tokens.
    pub fn for_provisioning(merchant: &MerchantId, address: &SiteAddress) -> Self {
        let mut rules = vec![Rule::new(MERCHANT_ID_TOKEN, merchant.as_str())];
        rules.extend(Self::network_rules(address));
        Self(rules)
    }

    /// Rules for re-pointing an already provisioned site. The identifier was
    /// substituted at provisioning time and is not touched again.
    pub fn for_reconfiguration(address: &SiteAddress) -> Self {
        Self(Self::network_rules(address))
    }

    fn network_rules(address: &SiteAddress) -> Vec<Rule> {
        vec![
            Rule::new(DEFAULT_HOST, address.domain.as_str()),
            Rule::new(DEFAULT_PORT, address.port.as_str()),
            Rule::new(HTTP_SCHEME, format!("{}://", address.protocol)),
            Rule::new(LEGACY_HOST_IP, address.domain.as_str()),
        ]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.0
    }
}

/// The first network token a later pass would match inside `value`, if any.
///
/// A value written into a site must not contain a token, or reconfiguring
/// twice with the same arguments keeps rewriting it (`18080` becomes
/// `118080`). `identities` are tokens `value` may equal outright, since a
/// rule that writes a token over itself changes nothing.
pub fn rematched_token(value: &str, identities: &[&str]) -> Option<&'static str> {
    NETWORK_TOKENS
        .into_iter()
        .find(|token| value.contains(token) && !(value == *token && identities.contains(token)))
}

/// Apply `rules` to `content` in order and return the rewritten bytes.
pub fn substitute(content: &[u8], rules: &SubstitutionRules) -> Vec<u8> {
    let mut current = content.to_vec();
    for rule in rules.rules() {
        current = replace_all(&current, rule.from.as_bytes(), rule.to.as_bytes());
    }
    current
}

/// Replace every non-overlapping occurrence of `from`, scanning left to right.
fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
