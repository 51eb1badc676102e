//! The state record threaded through the pipeline, and its merge policy.
//!
//! Stages never mutate [`AnalysisState`] in place. Each returns a
//! [`StateUpdate`], and the runner folds it in with [`AnalysisState::merge`]:
//! per field, a present value replaces the old one and an absent value leaves
//! it alone. Nothing can un-set a populated field, and setting `error` leaves
//! every other field as it was.

use serde::{Deserialize, Serialize};
use serpwatch_shared::{SearchResult, SearchResults};

/// What the caller supplies to start a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisInput {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl AnalysisInput {
    pub fn new(keyword: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            domain: Some(domain.into()),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// The accumulated result of a run. Serialized verbatim as the API response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Locale hint, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<SearchResults>,
    /// 1-based rank of the domain, or `-1` when it is not in the scanned window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub our_position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// First error encountered. Once set, later stages only echo it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AnalysisInput> for AnalysisState {
    fn from(input: AnalysisInput) -> Self {
        Self {
            domain: input.domain,
            keyword: input.keyword,
            region: input.region,
            ..Default::default()
        }
    }
}

impl AnalysisState {
    /// Fold a stage's partial output into this state.
    pub fn merge(self, update: StateUpdate) -> Self {
        Self {
            domain: update.domain.or(self.domain),
            keyword: update.keyword.or(self.keyword),
            region: update.region.or(self.region),
            search_results: update.search_results.or(self.search_results),
            our_position: update.our_position.or(self.our_position),
            analysis: update.analysis.or(self.analysis),
            error: update.error.or(self.error),
        }
    }

    /// The result list, only if there is at least one entry.
    pub fn ranked_results(&self) -> Option<&[SearchResult]> {
        self.search_results
            .as_ref()
            .map(|r| r.results.as_slice())
            .filter(|r| !r.is_empty())
    }

    /// The keyword, treating a blank string as missing.
    pub fn keyword(&self) -> Option<&str> {
        non_blank(self.keyword.as_deref())
    }

    /// The domain, treating a blank string as missing.
    pub fn domain(&self) -> Option<&str> {
        non_blank(self.domain.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A partial state: the fields a stage wants to set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub domain: Option<String>,
    pub keyword: Option<String>,
    pub region: Option<String>,
    pub search_results: Option<SearchResults>,
    pub our_position: Option<i32>,
    pub analysis: Option<String>,
    pub error: Option<String>,
}

impl StateUpdate {
    /// An update that changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn search_results(results: SearchResults) -> Self {
        Self {
            search_results: Some(results),
            ..Default::default()
        }
    }

    pub fn our_position(position: i32) -> Self {
        Self {
            our_position: Some(position),
            ..Default::default()
        }
    }

    pub fn analysis(text: impl Into<String>) -> Self {
        Self {
            analysis: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
