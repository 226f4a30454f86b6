//! Policy filter deciding which discovered jobs are worth bidding on.
//!
//! Pure predicate over a [`JobDetails`] snapshot: no I/O, no state, and
//! identical input always yields the identical decision. All thresholds
//! are named constants.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::jobs::JobDetails;

/// Keywords that disqualify a posting outright when found in the
/// description.
const AVOID_WORDS: [&str; 9] = [
    "wordpress",
    "shopify",
    "woocommerce",
    "magento",
    "wix",
    "squarespace",
    "webflow",
    "video editing",
    "laravel",
];

/// Minimum lifetime client spend in dollars.
const MINIMUM_SPENT: f64 = 50_000.0;

/// Shortest duration class; only acceptable from clients who have spent
/// at least [`SHORT_DURATION_MIN_SPENT`].
const SHORT_DURATION_CLASS: &str = "duration1";

/// Spend floor applied to [`SHORT_DURATION_CLASS`] postings.
const SHORT_DURATION_MIN_SPENT: f64 = 200.0;

/// Fixed-price postings at or below this rate are rejected.
const FIXED_PRICE_RATE_FLOOR: f64 = 3.5;

/// Hire-rate percentage below which a client needs spend history.
const LOW_HIRE_RATE: f64 = 50.0;

/// Spend below which a low hire rate is disqualifying.
const LOW_HIRE_RATE_MIN_SPENT: f64 = 200.0;

#[allow(clippy::expect_used)]
static SPEND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*([kKmM]?)").expect("spend regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HIRE_RATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)%").expect("hire-rate regex is valid") // Static pattern, safe to panic
});

/// Parses scraped spend text like `"$12.3k"`, `"1,200"`, or `"2m"` into
/// dollars.
///
/// Returns `None` for `"N/A"` or anything without a leading number.
#[must_use]
pub fn parse_spend(raw: &str) -> Option<f64> {
    if raw.trim().eq_ignore_ascii_case("n/a") {
        return None;
    }
    let cleaned = raw.replace(',', "");
    let captures = SPEND_PATTERN.captures(cleaned.trim())?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let multiplier = match captures
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        _ => 1.0,
    };
    Some(number * multiplier)
}

/// Parses scraped hire-rate text like `"80% hire rate"` into a
/// percentage.
#[must_use]
pub fn parse_hire_rate(raw: &str) -> Option<f64> {
    let captures = HIRE_RATE_PATTERN.captures(raw)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Accept/reject predicate over discovered jobs.
///
/// Built once per discovery session; user-supplied avoid words are
/// merged with the built-in list at construction.
#[derive(Debug, Clone)]
pub struct JobFilter {
    avoid_words: HashSet<String>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl JobFilter {
    /// Creates a filter with the built-in avoid list plus any extra
    /// words, matched case-insensitively.
    #[must_use]
    pub fn new(extra_avoid_words: &[String]) -> Self {
        let avoid_words = AVOID_WORDS
            .iter()
            .map(|w| (*w).to_string())
            .chain(extra_avoid_words.iter().map(|w| w.to_lowercase()))
            .collect();
        Self { avoid_words }
    }

    /// Returns whether the description mentions any avoided keyword.
    #[must_use]
    pub fn has_avoided_keyword(&self, description: &str) -> bool {
        let description = description.to_lowercase();
        self.avoid_words.iter().any(|word| description.contains(word))
    }

    /// Decides whether a discovered job is worth acting on.
    ///
    /// Hard rejects: unverified payment, unmet qualification,
    /// unparsable or insufficient spend, avoided keyword, cheap
    /// fixed-price rate, and low hire rate from a low-spend client.
    /// Short-duration postings carry their own spend floor.
    #[must_use]
    pub fn is_allowed(&self, job: &JobDetails) -> bool {
        if !job.payment_verified {
            return false;
        }
        if !job.qualified {
            return false;
        }

        let Some(total_spent) = parse_spend(&job.total_spent) else {
            return false;
        };

        if self.has_avoided_keyword(&job.summary) {
            return false;
        }

        if total_spent < MINIMUM_SPENT {
            return false;
        }

        if job.duration_type == SHORT_DURATION_CLASS && total_spent < SHORT_DURATION_MIN_SPENT {
            return false;
        }

        if job.job_type == "Fixed Price" {
            let Some(rate) = parse_spend(&job.hourly_rate) else {
                return false;
            };
            if rate <= FIXED_PRICE_RATE_FLOOR {
                return false;
            }
        }

        let Some(hire_rate) = parse_hire_rate(&job.hire_rate) else {
            return false;
        };
        if hire_rate < LOW_HIRE_RATE && total_spent < LOW_HIRE_RATE_MIN_SPENT {
            return false;
        }

        true
    }
}
