//! Derived statistics over a review set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::review::{Review, Source};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_reviews: u32,
    pub average_rating: f64,
    /// Keys 1 through 5 are always present.
    pub rating_distribution: BTreeMap<u8, u32>,
    pub google_reviews: u32,
    pub apple_reviews: u32,
    pub trustpilot_reviews: u32,
}

impl Default for ReviewStats {
    fn default() -> Self {
        Self {
            total_reviews: 0,
            average_rating: 0.0,
            rating_distribution: empty_distribution(),
            google_reviews: 0,
            apple_reviews: 0,
            trustpilot_reviews: 0,
        }
    }
}

fn empty_distribution() -> BTreeMap<u8, u32> {
    (1..=5).map(|rating| (rating, 0)).collect()
}

impl ReviewStats {
    /// Recompute statistics from scratch for `reviews`.
    pub fn compute(reviews: &[Review]) -> Self {
        let mut stats = Self::default();
        if reviews.is_empty() {
            return stats;
        }

        let mut rating_sum: u64 = 0;
        for review in reviews {
            // Normalized reviews never carry ratings outside 1..=5.
            if let Some(count) = stats.rating_distribution.get_mut(&review.rating) {
                *count += 1;
            }
            rating_sum += u64::from(review.rating);

            match review.source {
                Source::Google => stats.google_reviews += 1,
                Source::Apple => stats.apple_reviews += 1,
                Source::Trustpilot => stats.trustpilot_reviews += 1,
            }
        }

        stats.total_reviews = reviews.len() as u32;
        let average = rating_sum as f64 / reviews.len() as f64;
        stats.average_rating = (average * 100.0).round() / 100.0;
        stats
    }

    pub fn count_for(&self, source: Source) -> u32 {
        match source {
            Source::Google => self.google_reviews,
            Source::Apple => self.apple_reviews,
            Source::Trustpilot => self.trustpilot_reviews,
        }
    }
}
