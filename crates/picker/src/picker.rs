//! Rejection-sampling recommendation picker.
//!
//! Every mode is a bounded loop: draw a candidate, test it, redraw on a
//! miss. Nothing is written anywhere.

use std::sync::Arc;

use plexrecs_core::error::{ParameterProblem, PickError};
use plexrecs_core::types::{ContentItem, LibraryPartition, LibraryPartitions, RatingBound, SampleScope};
use plexrecs_index::{CandidatePool, IndexError, Sample};
use plexrecs_providers::{
    HistoryLookup, HistoryProvider, ListMember, ListProvider, ProviderError, RatingProvider,
};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::resolver::{Candidate, Resolver};

pub const UNWATCHED_ATTEMPTS: u32 = 10;
pub const RATED_ATTEMPTS: u32 = 10;
pub const LIST_ATTEMPTS: u32 = 5;

/// Categories a rating filter can apply to.
const RATED_CATEGORIES: [&str; 2] = ["movie", "show"];

pub type PickResult = Result<ContentItem, PickError>;

#[derive(Debug, Clone, PartialEq)]
pub enum PickRequest {
    Plain {
        category: String,
    },
    Unwatched {
        category: String,
        username: String,
    },
    Rated {
        category: String,
        threshold: f64,
        bound: RatingBound,
    },
    FromList {
        list_name: String,
        category: Option<String>,
    },
}

impl PickRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "plain",
            Self::Unwatched { .. } => "unwatched",
            Self::Rated { .. } => "rated",
            Self::FromList { .. } => "list",
        }
    }
}

pub struct Picker {
    pool: Arc<dyn CandidatePool>,
    partitions: LibraryPartitions,
    history: Arc<dyn HistoryProvider>,
    ratings: Option<Arc<dyn RatingProvider>>,
    lists: Option<Arc<dyn ListProvider>>,
    resolver: Resolver,
}

impl Picker {
    pub fn new(
        pool: Arc<dyn CandidatePool>,
        partitions: LibraryPartitions,
        history: Arc<dyn HistoryProvider>,
        resolver: Resolver,
    ) -> Self {
        Self {
            pool,
            partitions,
            history,
            ratings: None,
            lists: None,
            resolver,
        }
    }

    pub fn with_ratings(mut self, ratings: Arc<dyn RatingProvider>) -> Self {
        self.ratings = Some(ratings);
        self
    }

    pub fn with_lists(mut self, lists: Arc<dyn ListProvider>) -> Self {
        self.lists = Some(lists);
        self
    }

    pub fn partitions(&self) -> &LibraryPartitions {
        &self.partitions
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub async fn pick(&self, request: &PickRequest) -> PickResult {
        let result = match request {
            PickRequest::Plain { category } => self.pick_plain(category).await,
            PickRequest::Unwatched { category, username } => {
                self.pick_unwatched(category, username).await
            }
            PickRequest::Rated {
                category,
                threshold,
                bound,
            } => self.pick_rated(category, *threshold, *bound).await,
            PickRequest::FromList {
                list_name,
                category,
            } => self.pick_from_list(list_name, category.as_deref()).await,
        };

        match &result {
            Ok(item) => info!(mode = request.mode(), title = %item.title, "picked"),
            Err(e) => info!(mode = request.mode(), outcome = e.code(), "pick failed"),
        }
        result
    }

    fn partition(&self, category: &str) -> Result<&LibraryPartition, PickError> {
        self.partitions.get(category).ok_or_else(|| {
            PickError::Parameter(ParameterProblem::UnknownCategory {
                category: category.to_string(),
                accepted: self.partitions.names().iter().map(|n| n.to_string()).collect(),
            })
        })
    }

    async fn pick_plain(&self, category: &str) -> PickResult {
        let partition = self.partition(category)?;
        let scope = SampleScope::Partition(partition.name.clone());
        self.pool
            .sample_random(&scope)
            .await
            .map_err(index_error)?
            .ok_or(PickError::EmptyScope)
    }

    async fn pick_unwatched(&self, category: &str, username: &str) -> PickResult {
        let partition = self.partition(category)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(PickError::Parameter(ParameterProblem::MissingUsername));
        }

        let watched = match self
            .history
            .watched_titles(username, &partition.section_ids)
            .await
        {
            Ok(HistoryLookup::Watched(titles)) => titles,
            Ok(HistoryLookup::UserNotFound) => return Err(PickError::UnknownUser),
            Err(e) => {
                warn!(provider = self.history.name(), error = %e, "history lookup failed");
                return Err(PickError::ProviderUnavailable(e.to_string()));
            }
        };
        debug!(username, watched = watched.len(), "history loaded");

        let scope = SampleScope::Partition(partition.name.clone());
        match self
            .pool
            .sample_random_excluding(&scope, &watched, UNWATCHED_ATTEMPTS)
            .await
            .map_err(index_error)?
        {
            Sample::Found(item) => Ok(item),
            Sample::Exhausted { attempts } => Err(PickError::TooManyAttempts { attempts }),
            Sample::EmptyScope => Err(PickError::EmptyScope),
        }
    }

    async fn pick_rated(&self, category: &str, threshold: f64, bound: RatingBound) -> PickResult {
        let partition = self.partition(category)?;
        if !RATED_CATEGORIES.contains(&partition.name.as_str()) {
            return Err(PickError::Parameter(ParameterProblem::RatingUnsupported {
                category: category.to_string(),
            }));
        }
        let Some(ratings) = &self.ratings else {
            return Err(PickError::Parameter(ParameterProblem::RatingsDisabled));
        };

        let scope = SampleScope::Partition(partition.name.clone());
        let mut rejected = Vec::new();
        for attempt in 0..RATED_ATTEMPTS {
            let Some(item) = self
                .pool
                .sample_random_skipping(&scope, &rejected)
                .await
                .map_err(index_error)?
            else {
                if attempt == 0 {
                    return Err(PickError::EmptyScope);
                }
                return Err(PickError::TooManyAttempts { attempts: attempt });
            };

            match ratings.rating(&item.title, item.year).await {
                Ok(Some(rating)) if bound.admits(rating, threshold) => return Ok(item),
                Ok(Some(rating)) => {
                    debug!(attempt, title = %item.title, rating, threshold, "rating out of bounds");
                }
                Ok(None) => debug!(attempt, title = %item.title, "no rating"),
                Err(e) => {
                    warn!(attempt, title = %item.title, error = %e, "rating lookup failed");
                }
            }
            rejected.push(item.external_key);
        }

        Err(PickError::TooManyAttempts {
            attempts: RATED_ATTEMPTS,
        })
    }

    async fn pick_from_list(&self, list_name: &str, category: Option<&str>) -> PickResult {
        let sections = match category {
            Some(category) => self.partition(category)?.section_ids.clone(),
            None => self.partitions.all_section_ids(),
        };
        let Some(lists) = &self.lists else {
            return Err(PickError::Parameter(ParameterProblem::ListsDisabled));
        };

        let members = match lists.list_members(list_name).await {
            Ok(members) => members,
            Err(ProviderError::NotFound) => {
                return Err(PickError::Parameter(ParameterProblem::UnknownList {
                    list: list_name.to_string(),
                }));
            }
            Err(e) => {
                warn!(provider = lists.name(), list = list_name, error = %e, "list fetch failed");
                return Err(PickError::ProviderUnavailable(e.to_string()));
            }
        };
        if members.is_empty() {
            return Err(PickError::EmptyScope);
        }

        for attempt in 0..LIST_ATTEMPTS {
            let Some(member) = choose_member(&members) else {
                return Err(PickError::EmptyScope);
            };
            let candidate = Candidate::from(&member);

            let resolved = match self.resolver.resolve_in(&candidate, &sections, false).await {
                Ok(Some(found)) => found,
                Ok(None) => {
                    debug!(attempt, title = %member.title, "list member not on server");
                    continue;
                }
                Err(e) => {
                    warn!(attempt, title = %member.title, error = %e, "list member lookup failed");
                    continue;
                }
            };

            match self
                .pool
                .find_by_external_key(&resolved.rating_key)
                .await
                .map_err(index_error)?
            {
                Some(item) => return Ok(item),
                None => {
                    debug!(attempt, rating_key = %resolved.rating_key, "list member not indexed yet");
                }
            }
        }

        Err(PickError::TooManyAttempts {
            attempts: LIST_ATTEMPTS,
        })
    }
}

fn choose_member(members: &[ListMember]) -> Option<ListMember> {
    members.choose(&mut rand::thread_rng()).cloned()
}

fn index_error(e: IndexError) -> PickError {
    PickError::Index(e.to_string())
}
