//! Confirm a candidate against the live media server.

use std::collections::HashSet;
use std::sync::Arc;

use plexrecs_core::types::{ContentItem, CrossRefId, ServerItem};
use plexrecs_providers::{ListMember, MediaServer, ProviderError, SectionQuery};
use tracing::{debug, warn};

/// What we know about an item we want to find on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub year: Option<i32>,
    /// Rating key recorded at index time, if any.
    pub external_key: Option<String>,
    /// Section the item was indexed from, if any.
    pub section_id: Option<i64>,
    pub cross_ref_ids: Vec<CrossRefId>,
}

impl From<&ContentItem> for Candidate {
    fn from(item: &ContentItem) -> Self {
        Self {
            title: item.title.clone(),
            year: item.year,
            external_key: Some(item.external_key.clone()),
            section_id: Some(item.section_id),
            cross_ref_ids: item.cross_ref_ids.clone(),
        }
    }
}

impl From<&ListMember> for Candidate {
    fn from(member: &ListMember) -> Self {
        Self {
            title: member.title.clone(),
            year: member.year,
            external_key: None,
            section_id: None,
            cross_ref_ids: member.cross_ref_ids.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    server: Arc<dyn MediaServer>,
    default_sections: Vec<i64>,
}

impl Resolver {
    /// `default_sections` is searched when neither the candidate nor the
    /// caller narrows the scope.
    pub fn new(server: Arc<dyn MediaServer>, default_sections: Vec<i64>) -> Self {
        Self {
            server,
            default_sections,
        }
    }

    pub async fn resolve(
        &self,
        candidate: &Candidate,
        match_by_exact_id: bool,
    ) -> Result<Option<ServerItem>, ProviderError> {
        self.resolve_in(candidate, &self.default_sections, match_by_exact_id)
            .await
    }

    /// Search the candidate's own section, or else each of `sections`.
    ///
    /// Without `match_by_exact_id` the first hit wins, which may be a
    /// different item sharing the title or id. With it, only the entry whose
    /// rating key equals the candidate's `external_key` is accepted.
    pub async fn resolve_in(
        &self,
        candidate: &Candidate,
        sections: &[i64],
        match_by_exact_id: bool,
    ) -> Result<Option<ServerItem>, ProviderError> {
        let own;
        let sections = match candidate.section_id {
            Some(id) => {
                own = [id];
                &own[..]
            }
            None => sections,
        };

        let mut failures = 0usize;
        let mut last_error = None;

        for &section_id in sections {
            let matches = match self.search(section_id, candidate).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(section_id, title = %candidate.title, error = %e, "section search failed");
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            let hit = if match_by_exact_id {
                matches
                    .into_iter()
                    .find(|m| candidate.external_key.as_deref() == Some(m.rating_key.as_str()))
            } else {
                matches.into_iter().next()
            };

            if let Some(item) = hit {
                debug!(section_id, rating_key = %item.rating_key, "candidate resolved");
                return Ok(Some(item));
            }
        }

        match last_error {
            Some(e) if failures == sections.len() => Err(e),
            _ => Ok(None),
        }
    }

    async fn search(
        &self,
        section_id: i64,
        candidate: &Candidate,
    ) -> Result<Vec<ServerItem>, ProviderError> {
        if candidate.cross_ref_ids.is_empty() {
            let query = SectionQuery::TitleYear {
                title: candidate.title.clone(),
                year: candidate.year,
            };
            return self.server.search_section(section_id, &query).await;
        }

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for id in &candidate.cross_ref_ids {
            let found = self
                .server
                .search_section(section_id, &SectionQuery::Guid(id.clone()))
                .await?;
            for item in found {
                if seen.insert(item.rating_key.clone()) {
                    matches.push(item);
                }
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeServer, content_item, server_item};
    use plexrecs_core::types::MediaKind;

    fn member(title: &str, year: Option<i32>, ids: &[&str]) -> ListMember {
        ListMember {
            title: title.to_string(),
            year,
            cross_ref_ids: ids.iter().filter_map(|s| CrossRefId::parse(s)).collect(),
        }
    }

    #[tokio::test]
    async fn guid_search_dedups_by_rating_key() {
        let server = Arc::new(FakeServer::default());
        let mut heat = server_item("7", "Heat", 1);
        heat.guids = vec![CrossRefId::new("imdb", "tt0113277"), CrossRefId::new("tmdb", "949")];
        server.add(heat);

        let resolver = Resolver::new(server.clone(), vec![1]);
        let candidate = Candidate::from(&member("Heat", Some(1995), &["imdb://tt0113277", "tmdb://949"]));
        let matches = resolver.search(1, &candidate).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(server.guid_searches(), 2);
    }

    #[tokio::test]
    async fn title_search_without_cross_refs() {
        let server = Arc::new(FakeServer::default());
        server.add(server_item("5", "Ran", 2));
        let resolver = Resolver::new(server.clone(), vec![1, 2]);

        let found = resolver
            .resolve(&Candidate::from(&member("Ran", Some(1985), &[])), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rating_key, "5");
        assert_eq!(server.title_searches(), 2);

        let missing = resolver
            .resolve(&Candidate::from(&member("Ran", Some(2001), &[])), false)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn exact_mode_rejects_a_different_rating_key() {
        let server = Arc::new(FakeServer::default());
        // same title and year, re-added under a new key
        server.add(server_item("900", "Solaris", 1));
        let resolver = Resolver::new(server, vec![1]);

        let mut item = content_item("1", "Solaris", "movie", MediaKind::Movie);
        item.external_key = "12".into();
        let candidate = Candidate::from(&item);

        assert!(resolver.resolve(&candidate, true).await.unwrap().is_none());
        let loose = resolver.resolve(&candidate, false).await.unwrap().unwrap();
        assert_eq!(loose.rating_key, "900");
    }

    #[tokio::test]
    async fn candidate_section_overrides_scope() {
        let server = Arc::new(FakeServer::default());
        server.add(server_item("3", "Paprika", 9));
        let resolver = Resolver::new(server.clone(), vec![1, 2, 3]);

        let mut item = content_item("3", "Paprika", "anime", MediaKind::Movie);
        item.section_id = 9;
        let found = resolver.resolve(&Candidate::from(&item), true).await.unwrap();
        assert_eq!(found.unwrap().section_id, 9);
        assert_eq!(server.title_searches(), 1);
    }

    #[tokio::test]
    async fn failing_sections_are_skipped_until_all_fail() {
        let server = Arc::new(FakeServer::default());
        server.add(server_item("4", "Stalker", 2));
        server.fail_section(1);
        let resolver = Resolver::new(server.clone(), vec![1, 2]);
        let candidate = Candidate::from(&member("Stalker", Some(1985), &[]));

        let found = resolver.resolve(&candidate, false).await.unwrap();
        assert_eq!(found.unwrap().rating_key, "4");

        server.fail_section(2);
        let err = resolver.resolve(&candidate, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
