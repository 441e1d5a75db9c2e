//! Cache key namespacing and per-domain TTL policy.
//!
//! Every cached artifact lives under `{domain}:{id}[:{subkey}]`. The helpers
//! here are the only place that knows the templates, so invalidation and
//! lookup can never drift apart.
//!
//! | Domain              | Key                              | Default TTL |
//! |---------------------|----------------------------------|-------------|
//! | product             | `product:{id}`                   | 1 hour      |
//! | search results      | `search:{query json}`            | 30 minutes  |
//! | session             | `session:{id}`                   | 24 hours    |
//! | recommendations     | `recommendations:{user}`         | 2 hours     |
//! | popular products    | `popular_products:{category}`    | 1 hour      |
//! | dynamic price       | `dynamic_price:{product}`        | 30 minutes  |
//! | inventory           | `inventory:{product}`            | 15 minutes  |
//! | supplier rankings   | `supplier_rankings:{category}`   | 2 hours     |
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::TtlConfig;
use crate::error::{AppError, Result};
use regex::Regex;
use serde::Serialize;

/// Category used when a listing is not scoped to one
pub const ALL_CATEGORIES: &str = "all";

/// Cached data classes, each with a fixed key domain and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    Product,
    SearchResults,
    Session,
    Recommendations,
    PopularProducts,
    DynamicPrice,
    Inventory,
    SupplierRankings,
}

impl CachePolicy {
    pub const ALL: [CachePolicy; 8] = [
        CachePolicy::Product,
        CachePolicy::SearchResults,
        CachePolicy::Session,
        CachePolicy::Recommendations,
        CachePolicy::PopularProducts,
        CachePolicy::DynamicPrice,
        CachePolicy::Inventory,
        CachePolicy::SupplierRankings,
    ];

    /// Key prefix for this data class
    pub fn domain(&self) -> &'static str {
        match self {
            CachePolicy::Product => "product",
            CachePolicy::SearchResults => "search",
            CachePolicy::Session => "session",
            CachePolicy::Recommendations => "recommendations",
            CachePolicy::PopularProducts => "popular_products",
            CachePolicy::DynamicPrice => "dynamic_price",
            CachePolicy::Inventory => "inventory",
            CachePolicy::SupplierRankings => "supplier_rankings",
        }
    }

    /// TTL in seconds under the given policy table
    pub fn ttl(&self, ttl: &TtlConfig) -> u64 {
        match self {
            CachePolicy::Product => ttl.product,
            CachePolicy::SearchResults => ttl.search_results,
            CachePolicy::Session => ttl.session,
            CachePolicy::Recommendations => ttl.recommendations,
            CachePolicy::PopularProducts => ttl.popular_products,
            CachePolicy::DynamicPrice => ttl.dynamic_price,
            CachePolicy::Inventory => ttl.inventory,
            CachePolicy::SupplierRankings => ttl.supplier_rankings,
        }
    }

    /// Build the key for `id` in this domain
    pub fn key(&self, id: &str) -> String {
        key_for(self.domain(), id, None)
    }
}

/// Build a namespaced key: `domain:id` or `domain:id:subkey`.
pub fn key_for(domain: &str, id: &str, subkey: Option<&str>) -> String {
    match subkey {
        Some(sub) => format!("{}:{}:{}", domain, id, sub),
        None => format!("{}:{}", domain, id),
    }
}

pub fn product(product_id: &str) -> String {
    CachePolicy::Product.key(product_id)
}

/// Search result key. The query is embedded as canonical JSON so that
/// product-scoped pattern invalidation can find entries mentioning a product.
pub fn search_results<Q: Serialize + ?Sized>(query: &Q) -> serde_json::Result<String> {
    // serde_json::Value keeps object keys sorted, which makes the key canonical
    let canonical = serde_json::to_value(query)?;
    Ok(CachePolicy::SearchResults.key(&serde_json::to_string(&canonical)?))
}

pub fn session(session_id: &str) -> String {
    CachePolicy::Session.key(session_id)
}

pub fn recommendations(user_id: &str) -> String {
    CachePolicy::Recommendations.key(user_id)
}

pub fn popular_products(category: Option<&str>) -> String {
    CachePolicy::PopularProducts.key(category.unwrap_or(ALL_CATEGORIES))
}

pub fn dynamic_price(product_id: &str) -> String {
    CachePolicy::DynamicPrice.key(product_id)
}

pub fn inventory(product_id: &str) -> String {
    CachePolicy::Inventory.key(product_id)
}

pub fn supplier_rankings(category: Option<&str>) -> String {
    CachePolicy::SupplierRankings.key(category.unwrap_or(ALL_CATEGORIES))
}

/// Glob pattern matching every search key that mentions `product_id`.
pub fn search_pattern_for_product(product_id: &str) -> String {
    format!("{}:*{}*", CachePolicy::SearchResults.domain(), escape_glob(product_id))
}

/// Escape Redis glob metacharacters so ids are matched literally.
pub fn escape_glob(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Compile a Redis-style glob (`*`, `?`, `[...]`, `\` escapes) into an
/// anchored regex, for stores that have no native pattern support.
///
/// An empty or unterminated class is matched as literal text. Reversed
/// ranges such as `[z-a]` are accepted, as Redis does.
pub fn compile_glob(pattern: &str) -> Result<Regex> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("(?s)^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                re.push_str(&escape_char(chars[i]));
            }
            '[' => match glob_class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    re.push_str(&class);
                    i += consumed;
                }
                None => re.push_str(&escape_char('[')),
            },
            c => re.push_str(&escape_char(c)),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re).map_err(|e| AppError::InvalidRequest(format!("Invalid key pattern '{}': {}", pattern, e)))
}

/// Translate the body of a `[...]` class. Returns the regex class and the
/// number of pattern chars consumed, closing `]` included.
fn glob_class(body: &[char]) -> Option<(String, usize)> {
    let negate = body.first() == Some(&'^');
    let mut j = usize::from(negate);
    let mut members = String::new();

    loop {
        let lo = match *body.get(j)? {
            ']' => break,
            '\\' => {
                j += 1;
                *body.get(j)?
            }
            c => c,
        };
        match (body.get(j + 1), body.get(j + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                members.push_str(&format!("{}-{}", escape_char(lo), escape_char(hi)));
                j += 3;
            }
            _ => {
                members.push_str(&escape_char(lo));
                j += 1;
            }
        }
    }

    if members.is_empty() {
        return None;
    }
    let class = format!("[{}{}]", if negate { "^" } else { "" }, members);
    Some((class, j + 1))
}

fn escape_char(c: char) -> String {
    let mut buf = [0u8; 4];
    regex::escape(c.encode_utf8(&mut buf))
}
