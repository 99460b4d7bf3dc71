//! Candidate generator (C3): merges a viewer's mailbox ("social") with a
//! vector-index ANN search ("discovery") into one deduplicated list.

use crate::config::{CandidateConfig, MailboxConfig};
use crate::mailbox::MailboxStore;
use crate::models::{Candidate, PostId, Source, UserId};
use crate::vector_index::VectorIndexClient;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

pub struct CandidateResult {
    pub candidates: Vec<Candidate>,
    pub social_count: usize,
    pub discovery_count: usize,
}

/// Generate up to `2K` merged candidates for `viewer`, where `K` is
/// `candidate_cfg`'s ranking candidate limit supplied by the caller.
pub async fn generate_candidates(
    mailbox: &Arc<dyn MailboxStore>,
    vector_index: &VectorIndexClient,
    mailbox_cfg: &MailboxConfig,
    candidate_cfg: &CandidateConfig,
    viewer: UserId,
    k: usize,
) -> CandidateResult {
    let interest_vector = ensure_interest_vector(mailbox, mailbox_cfg, viewer).await;

    let (social, discovery) = tokio::join!(
        fetch_social(mailbox, viewer, k),
        fetch_discovery(vector_index, viewer, &interest_vector, k, candidate_cfg),
    );

    let social_count = social.len();
    let discovery_count = discovery.len();

    let merged = merge(social, discovery);

    CandidateResult {
        candidates: merged,
        social_count,
        discovery_count,
    }
}

/// Ensure `viewer` has an interest vector, synthesizing a uniform random
/// `[-1,1]^D` vector on cold start rather than blocking for a learned one.
async fn ensure_interest_vector(
    mailbox: &Arc<dyn MailboxStore>,
    mailbox_cfg: &MailboxConfig,
    viewer: UserId,
) -> Vec<f32> {
    match mailbox.get_interest_vector(viewer).await {
        Ok(Some(vector)) => vector,
        Ok(None) => {
            let vector = random_interest_vector(mailbox_cfg.embedding_dimension);
            if let Err(e) = mailbox.set_interest_vector(viewer, &vector).await {
                warn!(user_id = %viewer, error = %e, "failed to persist cold-start interest vector");
            }
            vector
        }
        Err(e) => {
            warn!(user_id = %viewer, error = %e, "interest vector lookup failed, using ephemeral cold-start vector");
            random_interest_vector(mailbox_cfg.embedding_dimension)
        }
    }
}

fn random_interest_vector(dimension: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dimension).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

async fn fetch_social(mailbox: &Arc<dyn MailboxStore>, viewer: UserId, k: usize) -> Vec<PostId> {
    match mailbox.top(viewer, k).await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(user_id = %viewer, error = %e, "mailbox retrieval failed, contributing zero social candidates");
            Vec::new()
        }
    }
}

async fn fetch_discovery(
    vector_index: &VectorIndexClient,
    viewer: UserId,
    interest_vector: &[f32],
    k: usize,
    candidate_cfg: &CandidateConfig,
) -> Vec<PostId> {
    match vector_index
        .search(interest_vector, k, viewer, candidate_cfg.discovery_lookback_hours)
        .await
    {
        Ok(posts) => posts,
        Err(e) => {
            warn!(user_id = %viewer, error = %e, "vector index search failed, contributing zero discovery candidates");
            Vec::new()
        }
    }
}

/// Merge social and discovery candidate lists, preserving the social tag on
/// any PostId seen in both.
fn merge(social: Vec<PostId>, discovery: Vec<PostId>) -> Vec<Candidate> {
    let mut seen = HashSet::with_capacity(social.len() + discovery.len());
    let mut merged = Vec::with_capacity(social.len() + discovery.len());

    for post_id in social {
        if seen.insert(post_id) {
            merged.push(Candidate::new(post_id, Source::Social));
        }
    }
    for post_id in discovery {
        if seen.insert(post_id) {
            merged.push(Candidate::new(post_id, Source::Discovery));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn post(n: u128) -> PostId {
        PostId::new(Uuid::from_u128(n))
    }

    #[test]
    fn merge_preserves_first_seen_source_on_collision() {
        let social = vec![post(1), post(2)];
        let discovery = vec![post(2), post(3)];

        let merged = merge(social, discovery);

        assert_eq!(merged.len(), 3);
        let by_id: std::collections::HashMap<_, _> =
            merged.iter().map(|c| (c.post_id, c.source)).collect();
        assert_eq!(by_id[&post(1)], Source::Social);
        assert_eq!(by_id[&post(2)], Source::Social);
        assert_eq!(by_id[&post(3)], Source::Discovery);
    }

    #[test]
    fn merge_is_idempotent_on_duplicate_within_same_list() {
        let social = vec![post(1), post(1)];
        let merged = merge(social, vec![]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn random_interest_vector_has_requested_dimension_and_bounded_range() {
        let vector = random_interest_vector(384);
        assert_eq!(vector.len(), 384);
        assert!(vector.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
