use std::fmt;

/// Message flags addressable from filter expressions. System flags map to
/// their RFC 3501 names; the rest are widely deployed keyword flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Junk,
    Phishing,
    Forwarded,
    Important,
    Wildcard,
}

impl Flag {
    pub fn imap_name(&self) -> &'static str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Deleted => "\\Deleted",
            Flag::Draft => "\\Draft",
            Flag::Junk => "$Junk",
            Flag::Phishing => "$Phishing",
            Flag::Forwarded => "$Forwarded",
            Flag::Important => "$Important",
            Flag::Wildcard => "\\*",
        }
    }

    /// SEARCH key matching messages carrying the flag.
    fn positive_key(&self) -> String {
        match self {
            Flag::Seen => "SEEN".to_string(),
            Flag::Answered => "ANSWERED".to_string(),
            Flag::Flagged => "FLAGGED".to_string(),
            Flag::Deleted => "DELETED".to_string(),
            Flag::Draft => "DRAFT".to_string(),
            other => format!("KEYWORD {}", other.imap_name()),
        }
    }

    /// SEARCH key matching messages without the flag.
    fn negative_key(&self) -> String {
        match self {
            Flag::Seen => "UNSEEN".to_string(),
            Flag::Answered => "UNANSWERED".to_string(),
            Flag::Flagged => "UNFLAGGED".to_string(),
            Flag::Deleted => "UNDELETED".to_string(),
            Flag::Draft => "UNDRAFT".to_string(),
            other => format!("UNKEYWORD {}", other.imap_name()),
        }
    }
}

/// Resolve a filter flag token (already uppercased). The boolean is true
/// for `UN`-prefixed tokens, which match on the *absence* of the flag.
pub(crate) fn flag_token(token: &str) -> Option<(Flag, bool)> {
    let (flag, negated) = match token {
        "SEEN" => (Flag::Seen, false),
        "UNSEEN" => (Flag::Seen, true),
        "ANSWERED" => (Flag::Answered, false),
        "UNANSWERED" => (Flag::Answered, true),
        "FLAGGED" => (Flag::Flagged, false),
        "UNFLAGGED" => (Flag::Flagged, true),
        "DELETED" => (Flag::Deleted, false),
        "UNDELETED" => (Flag::Deleted, true),
        "DRAFT" => (Flag::Draft, false),
        "UNDRAFT" => (Flag::Draft, true),
        "JUNK" => (Flag::Junk, false),
        "PHISHING" => (Flag::Phishing, false),
        "FORWARDED" => (Flag::Forwarded, false),
        "IMPORTANT" => (Flag::Important, false),
        "WILDCARD" => (Flag::Wildcard, false),
        _ => return None,
    };

    Some((flag, negated))
}

/// Inclusive UID range; an open `stop` stands for `*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UidRange {
    pub start: u32,
    pub stop: Option<u32>,
}

impl UidRange {
    pub fn since(start: u32) -> Self {
        UidRange { start, stop: None }
    }

    pub fn contains(&self, uid: u32) -> bool {
        uid >= self.start && self.stop.map_or(true, |stop| uid <= stop)
    }
}

impl fmt::Display for UidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            Some(stop) => write!(f, "{}:{}", self.start, stop),
            None => write!(f, "{}:*", self.start),
        }
    }
}

/// IMAP-level search predicate. Scalar fields are implicitly and-ed, which
/// mirrors how RFC 3501 composes multiple SEARCH keys; `or` holds nested
/// alternative pairs and `not` nested negated criteria.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub uid: Vec<UidRange>,
    pub flag: Vec<Flag>,
    pub not_flag: Vec<Flag>,
    pub header: Vec<(String, String)>,
    pub body: Vec<String>,
    pub text: Vec<String>,
    pub or: Vec<(SearchCriteria, SearchCriteria)>,
    pub not: Vec<SearchCriteria>,
}

impl SearchCriteria {
    /// Field-wise conjunction with `other`. The receiver is the working
    /// copy; callers merging a cached criteria clone it first.
    pub fn and(&mut self, other: SearchCriteria) {
        self.uid.extend(other.uid);
        self.flag.extend(other.flag);
        self.not_flag.extend(other.not_flag);
        self.header.extend(other.header);
        self.body.extend(other.body);
        self.text.extend(other.text);
        self.or.extend(other.or);
        self.not.extend(other.not);
    }

    /// Render the RFC 3501 SEARCH argument form of this predicate.
    pub fn to_query(&self) -> String {
        let mut keys = Vec::new();
        self.push_keys(&mut keys);

        if keys.is_empty() {
            return "ALL".to_string();
        }

        keys.join(" ")
    }

    fn push_keys(&self, keys: &mut Vec<String>) {
        for range in &self.uid {
            keys.push(format!("UID {range}"));
        }
        for flag in &self.flag {
            keys.push(flag.positive_key());
        }
        for flag in &self.not_flag {
            keys.push(flag.negative_key());
        }
        for (key, value) in &self.header {
            keys.push(format!("HEADER {} {}", quote(key), quote(value)));
        }
        for value in &self.body {
            keys.push(format!("BODY {}", quote(value)));
        }
        for value in &self.text {
            keys.push(format!("TEXT {}", quote(value)));
        }
        for (left, right) in &self.or {
            keys.push(format!("OR ({}) ({})", left.to_query(), right.to_query()));
        }
        for inner in &self.not {
            keys.push(format!("NOT ({})", inner.to_query()));
        }
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');

    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_renders_all() {
        assert_eq!(SearchCriteria::default().to_query(), "ALL");
    }

    #[test]
    fn renders_uid_bound_and_flags() {
        let criteria = SearchCriteria {
            uid: vec![UidRange::since(100)],
            flag: vec![Flag::Seen],
            not_flag: vec![Flag::Deleted],
            ..Default::default()
        };

        assert_eq!(criteria.to_query(), "UID 100:* SEEN UNDELETED");
    }

    #[test]
    fn renders_keyword_flags() {
        let criteria = SearchCriteria {
            flag: vec![Flag::Junk],
            not_flag: vec![Flag::Important],
            ..Default::default()
        };

        assert_eq!(criteria.to_query(), "KEYWORD $Junk UNKEYWORD $Important");
    }

    #[test]
    fn quotes_header_and_substring_values() {
        let criteria = SearchCriteria {
            header: vec![("FROM".to_string(), "a\"b".to_string())],
            body: vec!["needle".to_string()],
            text: vec!["hay stack".to_string()],
            ..Default::default()
        };

        assert_eq!(
            criteria.to_query(),
            r#"HEADER "FROM" "a\"b" BODY "needle" TEXT "hay stack""#
        );
    }

    #[test]
    fn renders_nested_or_and_not() {
        let junk = SearchCriteria {
            flag: vec![Flag::Junk],
            ..Default::default()
        };
        let from = SearchCriteria {
            header: vec![("FROM".to_string(), "x@y.z".to_string())],
            ..Default::default()
        };
        let criteria = SearchCriteria {
            or: vec![(junk.clone(), from)],
            not: vec![junk],
            ..Default::default()
        };

        assert_eq!(
            criteria.to_query(),
            r#"OR (KEYWORD $Junk) (HEADER "FROM" "x@y.z") NOT (KEYWORD $Junk)"#
        );
    }

    #[test]
    fn and_concatenates_fields() {
        let mut left = SearchCriteria {
            flag: vec![Flag::Seen],
            header: vec![("FROM".to_string(), "a@b.c".to_string())],
            ..Default::default()
        };
        let right = SearchCriteria {
            flag: vec![Flag::Flagged],
            not_flag: vec![Flag::Deleted],
            ..Default::default()
        };

        left.and(right);

        assert_eq!(left.flag, vec![Flag::Seen, Flag::Flagged]);
        assert_eq!(left.not_flag, vec![Flag::Deleted]);
        assert_eq!(left.header.len(), 1);
    }

    #[test]
    fn uid_range_bounds() {
        let open = UidRange::since(100);
        assert!(open.contains(100));
        assert!(open.contains(u32::MAX));
        assert!(!open.contains(99));
        assert_eq!(open.to_string(), "100:*");

        let closed = UidRange {
            start: 5,
            stop: Some(7),
        };
        assert!(closed.contains(7));
        assert!(!closed.contains(8));
        assert_eq!(closed.to_string(), "5:7");
    }
}
