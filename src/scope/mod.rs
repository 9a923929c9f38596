//! Scope filter: suppress false-positive "out-of-scope file" reports.
//!
//! The model sometimes flags files as unrelated to the ticket when they are
//! topically central to it (an authentication ticket flagging
//! `auth_middleware.py`). This filter reconciles the model's out-of-scope
//! list against ticket semantics:
//! - classify the ticket into a keyword family;
//! - files matching the family's in-scope path fragments are removed from
//!   the out-of-scope list;
//! - files matching an always-exclude fragment (CI config, docs,
//!   demo/sample/test files) stay out of scope no matter what.
//!
//! This is a heuristic, not ground truth: it only ever shrinks the
//! out-of-scope list and never touches other finding categories. The
//! classifier is pluggable because hardcoded keyword lists are inherently
//! approximate.

use tracing::debug;

/// Keyword families a ticket can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFamily {
    Authentication,
    Payment,
    Api,
    Database,
}

/// Pluggable ticket classifier. `None` means "no known family": the
/// filter then leaves the model's out-of-scope list untouched.
pub trait TicketClassifier {
    fn classify(&self, ticket_text: &str) -> Option<TicketFamily>;
}

const AUTH_KEYWORDS: &[&str] = &[
    "auth", "login", "logout", "password", "session", "token", "oauth", "sso", "signin",
    "sign-in", "credential", "2fa", "mfa",
];
const PAYMENT_KEYWORDS: &[&str] = &[
    "payment", "billing", "invoice", "checkout", "refund", "charge", "subscription", "payout",
];
const API_KEYWORDS: &[&str] = &["endpoint", "rest api", " api", "route", "controller", "webhook"];
const DATABASE_KEYWORDS: &[&str] = &["database", "migration", "schema", "sql", "query", "index"];

/// In-scope path fragments per family.
fn in_scope_fragments(family: TicketFamily) -> &'static [&'static str] {
    match family {
        TicketFamily::Authentication => &[
            "auth", "login", "session", "token", "credential", "middleware", "security", "user",
            "account",
        ],
        TicketFamily::Payment => &[
            "payment", "billing", "invoice", "checkout", "charge", "refund", "transaction",
            "wallet", "order",
        ],
        TicketFamily::Api => &[
            "api", "controller", "route", "handler", "endpoint", "view", "serializer",
        ],
        TicketFamily::Database => &[
            "db", "database", "model", "migration", "schema", "repository", "dao", "query",
        ],
    }
}

/// Fragments that are never in scope regardless of ticket family.
const ALWAYS_EXCLUDE: &[&str] = &[
    ".github/",
    ".gitlab-ci",
    ".circleci",
    "jenkinsfile",
    "ci/",
    "docs/",
    "readme",
    "changelog",
    "license",
    ".md",
    "demo",
    "sample",
    "example",
    "fixture",
    "mock",
    "test",
    "spec",
];

/// Default keyword-based classifier. First family whose keyword list
/// matches the lowercased ticket text wins; order is fixed.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl TicketClassifier for KeywordClassifier {
    fn classify(&self, ticket_text: &str) -> Option<TicketFamily> {
        let text = ticket_text.to_lowercase();
        let families: [(&[&str], TicketFamily); 4] = [
            (AUTH_KEYWORDS, TicketFamily::Authentication),
            (PAYMENT_KEYWORDS, TicketFamily::Payment),
            (API_KEYWORDS, TicketFamily::Api),
            (DATABASE_KEYWORDS, TicketFamily::Database),
        ];
        for (keywords, family) in families {
            if keywords.iter().any(|k| text.contains(k)) {
                return Some(family);
            }
        }
        None
    }
}

/// Whether a path can never be in ticket scope (exclude wins over any
/// in-scope fragment match).
pub fn is_always_excluded(path: &str) -> bool {
    let p = path.to_lowercase();
    ALWAYS_EXCLUDE.iter().any(|frag| p.contains(frag))
}

/// Scope filter over the model's out-of-scope file list.
#[derive(Debug, Clone)]
pub struct ScopeFilter<C = KeywordClassifier> {
    classifier: C,
}

impl Default for ScopeFilter<KeywordClassifier> {
    fn default() -> Self {
        Self {
            classifier: KeywordClassifier,
        }
    }
}

impl<C: TicketClassifier> ScopeFilter<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Returns the subset of `candidates` confirmed still out of scope.
    ///
    /// Idempotent: filtering an already-filtered list is a no-op.
    pub fn filter_out_of_scope(&self, ticket_text: &str, candidates: &[String]) -> Vec<String> {
        let Some(family) = self.classifier.classify(ticket_text) else {
            debug!("scope: no known ticket family, out-of-scope list kept as-is");
            return candidates.to_vec();
        };

        let fragments = in_scope_fragments(family);
        candidates
            .iter()
            .filter(|path| {
                if is_always_excluded(path) {
                    return true;
                }
                let p = path.to_lowercase();
                let related = fragments.iter().any(|frag| p.contains(frag));
                if related {
                    debug!(
                        "scope: '{}' matches {:?} family, removed from out-of-scope list",
                        path, family
                    );
                }
                !related
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn auth_ticket_keeps_related_files_in_scope() {
        let filter = ScopeFilter::default();
        let out = filter.filter_out_of_scope(
            "AUTH-12 add login endpoint must rate-limit login attempts",
            &files(&["src/controllers/login.py", "docs/CHANGELOG.md", "utils/math.py"]),
        );
        // login.py reclassified as in scope; changelog and math stay out.
        assert_eq!(out, files(&["docs/CHANGELOG.md", "utils/math.py"]));
    }

    #[test]
    fn always_exclude_wins_over_in_scope_fragment() {
        let filter = ScopeFilter::default();
        let out = filter.filter_out_of_scope(
            "fix login session handling",
            &files(&["tests/test_auth_login.py", "src/auth_middleware.py"]),
        );
        assert_eq!(out, files(&["tests/test_auth_login.py"]));
    }

    #[test]
    fn unknown_family_leaves_list_untouched() {
        let filter = ScopeFilter::default();
        let input = files(&["src/anything.py", "docs/README.md"]);
        let out = filter.filter_out_of_scope("improve typography kerning", &input);
        assert_eq!(out, input);
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = ScopeFilter::default();
        let text = "PAY-7 checkout refund flow";
        let input = files(&[
            "src/billing/refund.py",
            "src/utils/strings.py",
            ".github/workflows/ci.yml",
        ]);
        let once = filter.filter_out_of_scope(text, &input);
        let twice = filter.filter_out_of_scope(text, &once);
        assert_eq!(once, twice);
        assert_eq!(once, files(&["src/utils/strings.py", ".github/workflows/ci.yml"]));
    }

    #[test]
    fn classifier_is_pluggable() {
        struct Always(TicketFamily);
        impl TicketClassifier for Always {
            fn classify(&self, _t: &str) -> Option<TicketFamily> {
                Some(self.0)
            }
        }
        let filter = ScopeFilter::with_classifier(Always(TicketFamily::Database));
        let out = filter.filter_out_of_scope("anything", &files(&["app/models/user.rb"]));
        assert!(out.is_empty());
    }
}
