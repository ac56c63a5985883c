//! Link selection
//!
//! Decides which targets an item links to:
//! 1. Filter the pool (language, status, self, platform, excluded targets)
//! 2. Score relevance and drop candidates below the floor
//! 3. Add country, topic and hub boosts
//! 4. Pick greedily by boosted score, then backfill to the minimum
//! 5. Assign anchor types from the configured mix
//!
//! Hub and spoke linking lives here too: hubs link down to their children
//! and every leaf links up to one parent hub.

mod anchors;

pub use anchors::{assign_anchor_types, distribute, AnchorTextProvider, TitleAnchorProvider};

use crate::relevance::{RelevanceScorer, ScoredCandidate, TermVector};
use linkforge_common::config::{EngineConfig, RelevanceBoosts};
use linkforge_common::errors::Result;
use linkforge_common::types::{AnchorType, ContentItem, ContentKind, LinkContext, LinkEdge};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// An item together with its term vector
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub item: &'a ContentItem,
    pub terms: &'a TermVector,
}

impl<'a> Candidate<'a> {
    pub fn new(item: &'a ContentItem, terms: &'a TermVector) -> Self {
        Self { item, terms }
    }
}

/// A selected link, not yet stored or placed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkDraft {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub anchor_type: AnchorType,
    pub anchor_text: String,

    /// Relevance before boosts, 0-100
    pub base_score: f64,

    /// Relevance after boosts; used for ordering only
    pub boosted_score: f64,

    pub context: LinkContext,
    pub shared_terms: Vec<String>,

    /// Picked below the relevance floor to reach the minimum
    pub backfilled: bool,
}

impl LinkDraft {
    /// Automatic edge for this draft, storing the base score
    pub fn to_edge(&self, platform_id: Uuid) -> Result<LinkEdge> {
        LinkEdge::automatic(
            platform_id,
            self.source_id,
            self.target_id,
            self.anchor_text.clone(),
            self.anchor_type,
            self.base_score.round() as i32,
            self.context,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRules {
    pub min_relevance: f64,
    pub boosts: RelevanceBoosts,
    pub anchor_distribution: BTreeMap<AnchorType, u32>,
}

impl From<&EngineConfig> for SelectionRules {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_relevance: f64::from(config.min_relevance),
            boosts: config.relevance_boosts.clone(),
            anchor_distribution: config.anchor_type_distribution.clone(),
        }
    }
}

/// Why a link exists between two items
pub fn context_for(source: &ContentItem, target: &ContentItem) -> LinkContext {
    match (source.kind, target.kind) {
        (ContentKind::Leaf, ContentKind::Hub) => LinkContext::LeafToHub,
        (ContentKind::Hub, ContentKind::Leaf) => LinkContext::HubToLeaf,
        _ if source.same_topic(target) => LinkContext::SameTopic,
        _ => LinkContext::Related,
    }
}

/// Whether `target` may be linked from `source` at all
fn linkable(source: &ContentItem, target: &ContentItem) -> bool {
    target.id != source.id
        && target.platform_id == source.platform_id
        && target.is_published()
        && target.primary_language() == source.primary_language()
}

struct Ranked<'a> {
    item: &'a ContentItem,
    base: f64,
    boosted: f64,
    shared_terms: Vec<String>,
}

/// Selects link targets for content items
pub struct LinkSelectionOrchestrator {
    rules: SelectionRules,
    scorer: RelevanceScorer,
    anchors: Arc<dyn AnchorTextProvider>,
}

impl LinkSelectionOrchestrator {
    pub fn new(rules: SelectionRules, scorer: RelevanceScorer, anchors: Arc<dyn AnchorTextProvider>) -> Self {
        Self {
            rules,
            scorer,
            anchors,
        }
    }

    pub fn from_config(config: &EngineConfig, anchors: Arc<dyn AnchorTextProvider>) -> Self {
        Self::new(
            SelectionRules::from(config),
            RelevanceScorer::new(config.max_terms),
            anchors,
        )
    }

    pub fn rules(&self) -> &SelectionRules {
        &self.rules
    }

    fn boosted(&self, source: &ContentItem, target: &ContentItem, base: f64) -> f64 {
        let boosts = &self.rules.boosts;
        let mut score = base;
        if source.same_country(target) {
            score += boosts.same_country;
        }
        if source.same_topic(target) {
            score += boosts.same_topic;
        }
        if target.is_hub() {
            score += boosts.hub;
        }
        score
    }

    /// Score `pool` against `source`, keyed by candidate id
    fn score_pool<'a>(&self, source: Candidate<'_>, pool: &[Candidate<'a>]) -> HashMap<Uuid, ScoredCandidate> {
        let vectors: Vec<&TermVector> = pool.iter().map(|c| c.terms).collect();
        self.scorer
            .score(source.terms, &vectors)
            .into_iter()
            .map(|scored| (scored.candidate_id, scored))
            .collect()
    }

    fn draft(
        &self,
        source: &ContentItem,
        target: &ContentItem,
        anchor_type: AnchorType,
        context: LinkContext,
        ranked: (f64, f64, Vec<String>),
        backfilled: bool,
    ) -> LinkDraft {
        let (base_score, boosted_score, shared_terms) = ranked;
        LinkDraft {
            source_id: source.id,
            target_id: target.id,
            anchor_text: self.anchors.anchor_text(source, target, anchor_type),
            anchor_type,
            base_score,
            boosted_score,
            context,
            shared_terms,
            backfilled,
        }
    }

    /// Choose between `min_links` and `max_links` targets for `source`.
    ///
    /// Targets in `exclude_targets` (typically manual links) are never
    /// picked. Fewer than `min_links` drafts come back only when the
    /// filtered pool is smaller than that.
    pub fn select_candidates<R: Rng + ?Sized>(
        &self,
        source: Candidate<'_>,
        pool: &[Candidate<'_>],
        exclude_targets: &HashSet<Uuid>,
        min_links: usize,
        max_links: usize,
        rng: &mut R,
    ) -> Vec<LinkDraft> {
        let eligible: Vec<Candidate<'_>> = pool
            .iter()
            .copied()
            .filter(|c| linkable(source.item, c.item) && !exclude_targets.contains(&c.item.id))
            .collect();
        if eligible.is_empty() || max_links == 0 {
            return Vec::new();
        }

        let mut scores = self.score_pool(source, &eligible);
        let mut ranked: Vec<Ranked<'_>> = eligible
            .iter()
            .map(|c| {
                let scored = scores.remove(&c.item.id);
                let base = scored.as_ref().map_or(0.0, |s| s.score);
                Ranked {
                    item: c.item,
                    base,
                    boosted: self.boosted(source.item, c.item, base),
                    shared_terms: scored.map(|s| s.shared_terms).unwrap_or_default(),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.boosted
                .partial_cmp(&a.boosted)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.base.partial_cmp(&a.base).unwrap_or(Ordering::Equal))
                .then_with(|| a.item.id.cmp(&b.item.id))
        });

        let mut taken: HashSet<Uuid> = HashSet::new();
        let mut picked: Vec<(usize, bool)> = Vec::new();

        for (i, r) in ranked.iter().enumerate() {
            if picked.len() >= max_links {
                break;
            }
            if r.base >= self.rules.min_relevance && taken.insert(r.item.id) {
                picked.push((i, false));
            }
        }

        let minimum = min_links.min(max_links);
        if picked.len() < minimum {
            for (i, r) in ranked.iter().enumerate() {
                if picked.len() >= minimum {
                    break;
                }
                if taken.insert(r.item.id) {
                    picked.push((i, true));
                }
            }
        }

        let anchor_types = assign_anchor_types(&self.rules.anchor_distribution, picked.len(), rng);

        picked
            .into_iter()
            .zip(anchor_types)
            .map(|((i, backfilled), anchor_type)| {
                let r = &ranked[i];
                self.draft(
                    source.item,
                    r.item,
                    anchor_type,
                    context_for(source.item, r.item),
                    (r.base, r.boosted, r.shared_terms.clone()),
                    backfilled,
                )
            })
            .collect()
    }

    /// One `hub_to_leaf` draft per eligible child, ordered by child id
    pub fn link_hub_to_children(
        &self,
        hub: Candidate<'_>,
        children: &[Candidate<'_>],
        already_targeted: &HashSet<Uuid>,
    ) -> Vec<LinkDraft> {
        let mut eligible: Vec<Candidate<'_>> = children
            .iter()
            .copied()
            .filter(|c| {
                c.item.kind == ContentKind::Leaf
                    && linkable(hub.item, c.item)
                    && !already_targeted.contains(&c.item.id)
            })
            .collect();
        eligible.sort_by_key(|c| c.item.id);
        eligible.dedup_by_key(|c| c.item.id);

        let mut scores = self.score_pool(hub, &eligible);
        eligible
            .iter()
            .map(|child| {
                let scored = scores.remove(&child.item.id);
                let base = scored.as_ref().map_or(0.0, |s| s.score);
                self.draft(
                    hub.item,
                    child.item,
                    AnchorType::ExactMatch,
                    LinkContext::HubToLeaf,
                    (base, base, scored.map(|s| s.shared_terms).unwrap_or_default()),
                    false,
                )
            })
            .collect()
    }

    /// Parent hub of a leaf.
    ///
    /// Prefers hubs sharing topic and country, then topic, then country.
    /// Within a tier the most relevant hub wins, ties by id.
    pub fn select_parent_hub(&self, leaf: Candidate<'_>, hubs: &[Candidate<'_>]) -> Option<LinkDraft> {
        let eligible: Vec<Candidate<'_>> = hubs
            .iter()
            .copied()
            .filter(|c| c.item.is_hub() && linkable(leaf.item, c.item))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let scores = self.score_pool(leaf, &eligible);
        let score_of = |c: &Candidate<'_>| scores.get(&c.item.id).map_or(0.0, |s| s.score);

        let tiers: [&dyn Fn(&ContentItem) -> bool; 3] = [
            &|hub| leaf.item.same_topic(hub) && leaf.item.same_country(hub),
            &|hub| leaf.item.same_topic(hub),
            &|hub| leaf.item.same_country(hub),
        ];

        let parent = tiers.iter().find_map(|in_tier| {
            eligible
                .iter()
                .filter(|c| in_tier(c.item))
                .min_by(|a, b| {
                    score_of(b)
                        .partial_cmp(&score_of(a))
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.item.id.cmp(&b.item.id))
                })
        })?;

        let base = score_of(parent);
        let shared_terms = scores
            .get(&parent.item.id)
            .map(|s| s.shared_terms.clone())
            .unwrap_or_default();

        Some(self.draft(
            leaf.item,
            parent.item,
            AnchorType::ExactMatch,
            LinkContext::LeafToHub,
            (base, self.boosted(leaf.item, parent.item, base), shared_terms),
            false,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use linkforge_common::types::ContentStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PLATFORM: u128 = 1000;
    const TRAVEL: &str = "<p>Lisbon trams, Lisbon pastries and Lisbon viewpoints for travellers.</p>";
    const PHYSICS: &str = "<p>Gluons, quarks, confinement and lattice computations.</p>";

    fn item(id: u128, title: &str, body: &str) -> ContentItem {
        ContentItem {
            id: Uuid::from_u128(id),
            platform_id: Uuid::from_u128(PLATFORM),
            title: title.into(),
            body: body.into(),
            language: "en".into(),
            country: None,
            topic: None,
            kind: ContentKind::Leaf,
            status: ContentStatus::Published,
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn travel(id: u128) -> ContentItem {
        item(id, "Lisbon travel guide", TRAVEL)
    }

    fn physics(id: u128) -> ContentItem {
        item(id, "Quantum chromodynamics", PHYSICS)
    }

    fn orchestrator() -> LinkSelectionOrchestrator {
        LinkSelectionOrchestrator::from_config(
            &EngineConfig::default(),
            Arc::new(TitleAnchorProvider::default()),
        )
    }

    struct Fixture {
        items: Vec<ContentItem>,
        vectors: Vec<TermVector>,
    }

    impl Fixture {
        fn new(items: Vec<ContentItem>) -> Self {
            let scorer = RelevanceScorer::default();
            let vectors = items.iter().map(|i| scorer.extract_terms(i)).collect();
            Self { items, vectors }
        }

        fn candidate(&self, i: usize) -> Candidate<'_> {
            Candidate::new(&self.items[i], &self.vectors[i])
        }

        /// Everything but the first item
        fn pool(&self) -> Vec<Candidate<'_>> {
            (1..self.items.len()).map(|i| self.candidate(i)).collect()
        }
    }

    fn targets(drafts: &[LinkDraft]) -> Vec<u128> {
        drafts.iter().map(|d| d.target_id.as_u128()).collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_pool_filtering() {
        let mut foreign = travel(2);
        foreign.language = "pt-BR".into();
        let mut draft = travel(3);
        draft.status = ContentStatus::Draft;
        let mut elsewhere = travel(4);
        elsewhere.platform_id = Uuid::from_u128(1);
        let mut regional = travel(5);
        regional.language = "EN-gb".into();

        let fixture = Fixture::new(vec![travel(1), foreign, draft, elsewhere, regional, travel(1)]);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            3,
            8,
            &mut rng(),
        );
        assert_eq!(targets(&drafts), vec![5]);
    }

    #[test]
    fn test_boosts_reorder_selection() {
        let mut source = travel(1);
        source.country = Some("PT".into());
        let mut hub = travel(9);
        hub.kind = ContentKind::Hub;
        let mut local = travel(8);
        local.country = Some("pt".into());

        let fixture = Fixture::new(vec![source, travel(2), local, hub, physics(3)]);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            0,
            8,
            &mut rng(),
        );

        assert_eq!(targets(&drafts), vec![9, 8, 2]);
        assert_eq!(drafts[0].context, LinkContext::LeafToHub);
        assert!((drafts[0].boosted_score - drafts[0].base_score - 20.0).abs() < 1e-9);
        assert!((drafts[1].boosted_score - drafts[1].base_score - 10.0).abs() < 1e-9);
        assert!(drafts.iter().all(|d| !d.backfilled));
    }

    #[test]
    fn test_minimum_guarantee_backfills_below_floor() {
        let fixture = Fixture::new(vec![travel(1), travel(2), physics(3), physics(4), physics(5)]);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            3,
            8,
            &mut rng(),
        );

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].target_id, Uuid::from_u128(2));
        assert!(!drafts[0].backfilled);
        assert_eq!(targets(&drafts[1..]), vec![3, 4]);
        assert!(drafts[1..].iter().all(|d| d.backfilled && d.base_score < 40.0));
    }

    #[test]
    fn test_minimum_guarantee_when_nothing_clears_floor() {
        let fixture = Fixture::new(vec![travel(1), physics(2), physics(3), physics(4)]);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            2,
            8,
            &mut rng(),
        );

        assert_eq!(drafts.len(), 2);
        assert_eq!(targets(&drafts), vec![2, 3]);
        assert!(drafts.iter().all(|d| d.backfilled && d.base_score < 40.0));
    }

    #[test]
    fn test_max_links_and_excluded_targets() {
        let items: Vec<ContentItem> = (1..=12).map(travel).collect();
        let fixture = Fixture::new(items);
        let excluded: HashSet<Uuid> = [Uuid::from_u128(2), Uuid::from_u128(3)].into();

        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &excluded,
            3,
            8,
            &mut rng(),
        );

        assert_eq!(drafts.len(), 8);
        assert_eq!(targets(&drafts), (4..=11).collect::<Vec<u128>>());
    }

    #[test]
    fn test_anchor_mix_follows_distribution() {
        let items: Vec<ContentItem> = (1..=12).map(travel).collect();
        let fixture = Fixture::new(items);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            3,
            8,
            &mut rng(),
        );

        let mut counts: BTreeMap<AnchorType, usize> = BTreeMap::new();
        for d in &drafts {
            *counts.entry(d.anchor_type).or_insert(0) += 1;
        }
        let expected = distribute(&EngineConfig::default().anchor_type_distribution, 8);
        assert_eq!(counts, expected);

        let again = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            3,
            8,
            &mut rng(),
        );
        assert_eq!(drafts, again);
    }

    #[test]
    fn test_context_tags() {
        let leaf = travel(1);
        let mut hub = travel(2);
        hub.kind = ContentKind::Hub;
        let mut topical = travel(3);
        topical.topic = Some("Travel".into());
        let mut source = travel(4);
        source.topic = Some("travel ".into());

        assert_eq!(context_for(&leaf, &hub), LinkContext::LeafToHub);
        assert_eq!(context_for(&hub, &leaf), LinkContext::HubToLeaf);
        assert_eq!(context_for(&source, &topical), LinkContext::SameTopic);
        assert_eq!(context_for(&leaf, &topical), LinkContext::Related);
    }

    #[test]
    fn test_hub_links_to_eligible_children() {
        let mut hub = travel(1);
        hub.kind = ContentKind::Hub;
        let mut other_hub = travel(4);
        other_hub.kind = ContentKind::Hub;
        let mut unpublished = travel(5);
        unpublished.status = ContentStatus::Archived;

        let fixture = Fixture::new(vec![hub, travel(3), travel(2), other_hub, unpublished, travel(6)]);
        let already: HashSet<Uuid> = [Uuid::from_u128(6)].into();
        let drafts = orchestrator().link_hub_to_children(fixture.candidate(0), &fixture.pool(), &already);

        assert_eq!(targets(&drafts), vec![2, 3]);
        assert!(drafts.iter().all(|d| d.context == LinkContext::HubToLeaf));
        assert!(drafts.iter().all(|d| d.anchor_text == "Lisbon travel guide"));
    }

    #[test]
    fn test_parent_hub_tiers() {
        let mut leaf = travel(1);
        leaf.topic = Some("travel".into());
        leaf.country = Some("PT".into());

        let hub = |id: u128, topic: Option<&str>, country: Option<&str>, body: &str| {
            let mut hub = item(id, "Hub", body);
            hub.kind = ContentKind::Hub;
            hub.topic = topic.map(Into::into);
            hub.country = country.map(Into::into);
            hub
        };

        let fixture = Fixture::new(vec![
            leaf.clone(),
            hub(2, Some("travel"), None, TRAVEL),
            hub(3, None, Some("PT"), TRAVEL),
            hub(4, Some("travel"), Some("PT"), PHYSICS),
        ]);
        let parent = orchestrator()
            .select_parent_hub(fixture.candidate(0), &fixture.pool())
            .unwrap();
        assert_eq!(parent.target_id, Uuid::from_u128(4));
        assert_eq!(parent.context, LinkContext::LeafToHub);

        let fixture = Fixture::new(vec![
            leaf.clone(),
            hub(3, None, Some("PT"), TRAVEL),
            hub(2, Some("travel"), None, PHYSICS),
        ]);
        let parent = orchestrator()
            .select_parent_hub(fixture.candidate(0), &fixture.pool())
            .unwrap();
        assert_eq!(parent.target_id, Uuid::from_u128(2));

        let fixture = Fixture::new(vec![leaf, hub(3, None, Some("ES"), TRAVEL)]);
        assert!(orchestrator()
            .select_parent_hub(fixture.candidate(0), &fixture.pool())
            .is_none());
    }

    #[test]
    fn test_draft_edge_stores_base_score() {
        let fixture = Fixture::new(vec![travel(1), travel(2)]);
        let drafts = orchestrator().select_candidates(
            fixture.candidate(0),
            &fixture.pool(),
            &HashSet::new(),
            1,
            1,
            &mut rng(),
        );
        let edge = drafts[0].to_edge(Uuid::from_u128(PLATFORM)).unwrap();
        assert_eq!(edge.relevance_score, drafts[0].base_score.round() as i32);
        assert!(edge.automatic);
    }
}
