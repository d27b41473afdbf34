//! Boolean filter expression language and its translation to IMAP search
//! predicates.
//!
//! An expression like `!JUNK && FROM == 'billing@example.com'` compiles into
//! a [`SearchCriteria`] tree that renders as an RFC 3501 `SEARCH` argument.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::FilterError;

mod criteria;
mod lex;
mod parse;

pub use criteria::{Flag, SearchCriteria, UidRange};
pub use parse::{lower, parse, FilterNode};

/// Compile a single filter expression.
pub fn compile(input: &str) -> Result<SearchCriteria, FilterError> {
    Ok(lower(&parse(input)?))
}

/// Expression-string keyed cache of compiled criteria. Compiled trees are
/// immutable; consumers clone before and-merging them into a working copy.
#[derive(Debug, Default)]
pub struct FilterCache {
    cache: RwLock<HashMap<String, Arc<SearchCriteria>>>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, input: &str) -> Result<Arc<SearchCriteria>, FilterError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(compiled) = cache.get(input) {
                return Ok(compiled.clone());
            }
        }

        let compiled = Arc::new(compile(input)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(input.to_string(), compiled.clone());
        }

        Ok(compiled)
    }
}

/// And-merge all non-blank filter expressions of a client into a single
/// predicate bounded below by `uid_from`. The UID bound applies to the top
/// level only; nested `or`/`not` subtrees carry no UID constraint.
pub fn build_search_criteria(
    cache: &FilterCache,
    filters: &[String],
    uid_from: u32,
) -> Result<SearchCriteria, FilterError> {
    let mut criteria = SearchCriteria {
        uid: vec![UidRange::since(uid_from)],
        ..Default::default()
    };

    for expr in filters {
        if expr.trim().is_empty() {
            continue;
        }
        let compiled = cache.compile(expr)?;
        criteria.and((*compiled).clone());
    }

    Ok(criteria)
}
