use serde::{Deserialize, Serialize};

/// Summary stored when every analysis attempt came back unusable.
pub const ANALYSIS_FAILED_SUMMARY: &str = "AI analysis failed";

/// Output of the scoring/summarisation service for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub score: u8,
    pub summary: String,
    #[serde(default)]
    pub is_ad: bool,
}

impl Analysis {
    /// Fixed fallback used once the retry budget is spent.
    pub fn sentinel() -> Self {
        Self {
            score: 0,
            summary: ANALYSIS_FAILED_SUMMARY.to_string(),
            is_ad: false,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }
}

/// One line of input to the daily digest insight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestItem {
    pub title: String,
    pub summary: String,
}
