//! Link placement inside markup
//!
//! Turns a requested number of links into exact byte offsets:
//! - Eligible zones skip excluded positions, short zones and zones that
//!   already carry `max_per_zone` links
//! - Requests are spread evenly over eligible zones, or packed in zone order
//!   when there are more requests than zones
//! - Inside a zone each target snaps to the nearest sentence boundary
//! - A bounded safety pass moves offsets out of tags and existing anchors
//!
//! `insert` applies the rendered links back to front so earlier offsets stay
//! valid.

use crate::structure::{tokenize, TokenKind, Zone, ZonePosition};
use linkforge_common::config::EngineConfig;
use linkforge_common::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

/// Bytes an offset may travel while searching for a safe position
const SEARCH_WINDOW: usize = 512;

/// Tag skips allowed per offset
const MAX_SAFETY_RETRIES: usize = 16;

/// Where one link goes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementPoint {
    pub zone_index: usize,
    pub offset: usize,
    pub position: ZonePosition,
}

/// A rendered link and its insertion offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub offset: usize,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRules {
    pub max_per_zone: usize,
    pub min_zone_words: usize,
    pub exclude_intro: bool,
    pub exclude_conclusion: bool,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            max_per_zone: 1,
            min_zone_words: 20,
            exclude_intro: true,
            exclude_conclusion: false,
        }
    }
}

impl From<&EngineConfig> for PlacementRules {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_per_zone: config.max_links_per_zone,
            min_zone_words: config.min_zone_words,
            exclude_intro: config.exclude_intro,
            exclude_conclusion: config.exclude_conclusion,
        }
    }
}

/// Tag and protected-element spans of one document
struct MarkupIndex {
    /// Tags, comments and declarations
    tags: Vec<Range<usize>>,

    /// Anchor elements and raw-text content
    protected: Vec<Range<usize>>,
}

impl MarkupIndex {
    fn build(markup: &str) -> Self {
        let mut tags = Vec::new();
        let mut protected = Vec::new();
        let mut open_anchor: Option<usize> = None;

        for token in tokenize(markup) {
            match &token.kind {
                TokenKind::Text => {}
                TokenKind::RawText => protected.push(token.span()),
                TokenKind::StartTag { name, .. } => {
                    if name == "a" && open_anchor.is_none() {
                        open_anchor = Some(token.start);
                    }
                    tags.push(token.span());
                }
                TokenKind::EndTag { name } => {
                    if name == "a" {
                        if let Some(start) = open_anchor.take() {
                            protected.push(start..token.end);
                        }
                    }
                    tags.push(token.span());
                }
                TokenKind::Comment | TokenKind::Declaration => tags.push(token.span()),
            }
        }
        if let Some(start) = open_anchor {
            protected.push(start..markup.len());
        }

        Self { tags, protected }
    }

    /// Whether `offset` falls strictly inside a tag
    fn inside_tag(&self, offset: usize) -> Option<usize> {
        let i = self.tags.partition_point(|span| span.start < offset);
        i.checked_sub(1)
            .map(|i| &self.tags[i])
            .filter(|span| offset < span.end)
            .map(|span| span.end)
    }

    /// End of the tag or protected element strictly containing `offset`
    fn blocking_end(&self, offset: usize) -> Option<usize> {
        self.inside_tag(offset).or_else(|| {
            self.protected
                .iter()
                .find(|span| span.start < offset && offset < span.end)
                .map(|span| span.end)
        })
    }
}

fn sentence_end() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?](\s+|$)").expect("valid sentence pattern"))
}

/// Computes placement points for one document
#[derive(Debug, Clone, Default)]
pub struct PlacementPlanner {
    rules: PlacementRules,
}

impl PlacementPlanner {
    pub fn new(rules: PlacementRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PlacementRules {
        &self.rules
    }

    /// Zones that may receive at least one more link
    pub fn eligible_zones<'z>(&self, zones: &'z [Zone]) -> Vec<&'z Zone> {
        zones
            .iter()
            .filter(|zone| !(self.rules.exclude_intro && zone.position == ZonePosition::Intro))
            .filter(|zone| {
                !(self.rules.exclude_conclusion && zone.position == ZonePosition::Conclusion)
            })
            .filter(|zone| zone.word_count >= self.rules.min_zone_words)
            .filter(|zone| zone.link_count < self.rules.max_per_zone)
            .collect()
    }

    /// Plan up to `requested` insertion points, ordered by offset.
    ///
    /// The plan is shorter than requested when zone capacity runs out; no
    /// eligible zone yields an empty plan.
    pub fn plan(&self, markup: &str, zones: &[Zone], requested: usize) -> Vec<PlacementPoint> {
        let eligible = self.eligible_zones(zones);
        if eligible.is_empty() || requested == 0 {
            return Vec::new();
        }

        let index = MarkupIndex::build(markup);
        let mut points = Vec::with_capacity(requested);

        for (zone, count) in self.distribute(&eligible, requested) {
            points.extend(self.place_in_zone(markup, &index, zone, count));
        }

        points.sort_by_key(|p| p.offset);
        points
    }

    /// Insertions per zone
    fn distribute<'z>(&self, eligible: &[&'z Zone], requested: usize) -> Vec<(&'z Zone, usize)> {
        let zone_count = eligible.len();

        if requested <= zone_count {
            return (0..requested)
                .map(|i| (eligible[i * zone_count / requested], 1))
                .collect();
        }

        let mut remaining = requested;
        let mut assignments = Vec::new();
        for &zone in eligible {
            if remaining == 0 {
                break;
            }
            let capacity = self.rules.max_per_zone.saturating_sub(zone.link_count);
            let take = capacity.min(remaining);
            if take > 0 {
                assignments.push((zone, take));
                remaining -= take;
            }
        }
        assignments
    }

    fn place_in_zone(
        &self,
        markup: &str,
        index: &MarkupIndex,
        zone: &Zone,
        count: usize,
    ) -> Vec<PlacementPoint> {
        let start = zone.content_start;
        let end = zone.content_end;
        if end <= start {
            return Vec::new();
        }

        let mut boundaries = sentence_boundaries(markup, index, start, end);
        let len = end - start;
        let mut points = Vec::with_capacity(count);

        for j in 0..count {
            let target = start + (j + 1) * len / (count + 1);

            let candidate = match nearest(&boundaries, target) {
                Some(i) => boundaries.remove(i),
                None => snap_to_whitespace(markup, target, end),
            };

            match make_safe(index, candidate, start, end) {
                Some(offset) => points.push(PlacementPoint {
                    zone_index: zone.index,
                    offset,
                    position: zone.position,
                }),
                None => {
                    tracing::debug!(zone = zone.index, offset = candidate, "Dropping unsafe placement");
                }
            }
        }

        points
    }
}

/// Offsets just after sentence-ending punctuation inside `start..end`
fn sentence_boundaries(markup: &str, index: &MarkupIndex, start: usize, end: usize) -> Vec<usize> {
    let content = &markup[start..end];

    sentence_end()
        .find_iter(content)
        .filter(|m| {
            m.end() == content.len()
                || content[m.end()..]
                    .chars()
                    .next()
                    .is_some_and(char::is_uppercase)
        })
        .map(|m| start + m.start() + 1)
        .filter(|&offset| index.blocking_end(offset).is_none())
        .collect()
}

/// Index of the boundary closest to `target`, lower offset on ties
fn nearest(boundaries: &[usize], target: usize) -> Option<usize> {
    boundaries
        .iter()
        .enumerate()
        .min_by_key(|&(_, &b)| (b.abs_diff(target), b))
        .map(|(i, _)| i)
}

/// First whitespace at or after `target` within the window, else `target`
fn snap_to_whitespace(markup: &str, target: usize, zone_end: usize) -> usize {
    let from = ceil_char_boundary(markup, target);
    let to = ceil_char_boundary(markup, (from + SEARCH_WINDOW).min(zone_end)).max(from);

    markup[from..to]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(from, |(i, _)| from + i)
}

/// Advance out of tags and anchors; `None` when the point cannot be made safe
fn make_safe(index: &MarkupIndex, offset: usize, zone_start: usize, zone_end: usize) -> Option<usize> {
    let mut current = offset;

    for _ in 0..MAX_SAFETY_RETRIES {
        match index.blocking_end(current) {
            None => {
                let in_zone = (zone_start..=zone_end).contains(&current);
                return (in_zone && current - offset <= SEARCH_WINDOW).then_some(current);
            }
            Some(next) => current = next,
        }
        if current - offset > SEARCH_WINDOW {
            return None;
        }
    }

    None
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Apply insertions.
///
/// Offsets must be within the markup, on a char boundary and outside tags.
/// Insertions at equal offsets keep their given order.
pub fn insert(markup: &str, insertions: &[Insertion]) -> Result<String> {
    let index = MarkupIndex::build(markup);

    for insertion in insertions {
        let offset = insertion.offset;
        if offset > markup.len() || !markup.is_char_boundary(offset) {
            return Err(AppError::Placement {
                message: format!("offset {} is not a valid position in {} bytes", offset, markup.len()),
            });
        }
        if index.inside_tag(offset).is_some() {
            return Err(AppError::Placement {
                message: format!("offset {} falls inside a tag", offset),
            });
        }
    }

    let mut order: Vec<usize> = (0..insertions.len()).collect();
    order.sort_by(|&a, &b| {
        insertions[b]
            .offset
            .cmp(&insertions[a].offset)
            .then_with(|| b.cmp(&a))
    });

    let extra: usize = insertions.iter().map(|i| i.markup.len()).sum();
    let mut out = String::with_capacity(markup.len() + extra);
    out.push_str(markup);
    for i in order {
        out.insert_str(insertions[i].offset, &insertions[i].markup);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::analyze;

    fn planner(max_per_zone: usize) -> PlacementPlanner {
        PlacementPlanner::new(PlacementRules {
            max_per_zone,
            min_zone_words: 0,
            exclude_intro: false,
            exclude_conclusion: false,
        })
    }

    fn paragraphs(count: usize) -> String {
        (0..count)
            .map(|i| format!("<p>Paragraph {} has words. And another sentence.</p>", i))
            .collect()
    }

    fn zones_of(points: &[PlacementPoint]) -> Vec<usize> {
        points.iter().map(|p| p.zone_index).collect()
    }

    fn assert_safe(markup: &str, points: &[PlacementPoint]) {
        let index = MarkupIndex::build(markup);
        for point in points {
            assert!(index.blocking_end(point.offset).is_none(), "unsafe offset {}", point.offset);
        }
    }

    #[test]
    fn test_spreads_requests_evenly() {
        let markup = paragraphs(5);
        let analysis = analyze(&markup);
        let points = planner(1).plan(&markup, &analysis.zones, 2);
        assert_eq!(zones_of(&points), vec![0, 2]);
    }

    #[test]
    fn test_equal_requests_use_every_zone() {
        let markup = paragraphs(4);
        let analysis = analyze(&markup);
        let points = planner(1).plan(&markup, &analysis.zones, 4);
        assert_eq!(zones_of(&points), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_packs_in_zone_order_when_oversubscribed() {
        let markup = paragraphs(3);
        let analysis = analyze(&markup);
        let points = planner(2).plan(&markup, &analysis.zones, 5);
        assert_eq!(zones_of(&points), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_plan_shorter_than_capacity() {
        let markup = paragraphs(2);
        let analysis = analyze(&markup);
        let points = planner(1).plan(&markup, &analysis.zones, 5);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_eligibility_rules() {
        let mut markup = paragraphs(10);
        markup.push_str("<p>Tiny.</p>");
        let analysis = analyze(&markup);
        let planner = PlacementPlanner::new(PlacementRules {
            max_per_zone: 1,
            min_zone_words: 3,
            exclude_intro: true,
            exclude_conclusion: true,
        });

        let eligible: Vec<usize> = planner
            .eligible_zones(&analysis.zones)
            .iter()
            .map(|z| z.index)
            .collect();
        // 11 zones: 0-2 intro, 9-10 conclusion
        assert_eq!(eligible, vec![3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_already_linked_zone_skipped() {
        let markup = "<p>Has a <a href=\"/x\">link</a> inside. More text.</p><p>Plain text. More text.</p>";
        let analysis = analyze(markup);
        let points = planner(1).plan(markup, &analysis.zones, 2);
        assert_eq!(zones_of(&points), vec![1]);
    }

    #[test]
    fn test_snaps_to_nearest_sentence_boundary() {
        let markup = "<p>Alpha beta gamma. Delta epsilon zeta. Eta theta iota.</p>";
        let analysis = analyze(markup);

        let one = planner(1).plan(markup, &analysis.zones, 1);
        assert!(markup[..one[0].offset].ends_with("gamma."));

        let two = planner(2).plan(markup, &analysis.zones, 2);
        assert!(markup[..two[0].offset].ends_with("gamma."));
        assert!(markup[..two[1].offset].ends_with("zeta."));
    }

    #[test]
    fn test_boundary_before_closing_tag() {
        let markup = "<p>only one sentence without capitals ends here.</p>";
        let analysis = analyze(markup);
        let points = planner(1).plan(markup, &analysis.zones, 1);
        assert_eq!(points[0].offset, markup.len() - "</p>".len());
    }

    #[test]
    fn test_fallback_snaps_to_whitespace() {
        let markup = "<p>one two three four five six</p>";
        let analysis = analyze(markup);
        let points = planner(1).plan(markup, &analysis.zones, 1);
        assert_eq!(points[0].offset, 16);
        assert_eq!(markup.as_bytes()[points[0].offset], b' ');
    }

    #[test]
    fn test_nested_tags_and_anchors_are_safe() {
        let markup = concat!(
            "<p>Intro words <a href=\"/x\">linked. Text</a> and ",
            "<span title=\"a. B\">more. Words</span> end</p>",
        );
        let analysis = analyze(markup);
        let points = planner(2).plan(markup, &analysis.zones, 1);
        assert_eq!(points.len(), 1);
        assert!(markup[..points[0].offset].ends_with("more."));
        assert_safe(markup, &points);
    }

    #[test]
    fn test_fallback_never_lands_in_tags() {
        let markup = "<p><b class=\"x\">aaaaaaaaaaaaaaaa</b><i>bbbbbbbbbbbbbbbb</i><em>cccccc</em></p>";
        let analysis = analyze(markup);
        for count in 1..=3 {
            let points = planner(3).plan(markup, &analysis.zones, count);
            assert_safe(markup, &points);
        }
    }

    #[test]
    fn test_no_eligible_zone_is_empty() {
        assert!(planner(1).plan("<div>none</div>", &[], 3).is_empty());
        let markup = paragraphs(2);
        let analysis = analyze(&markup);
        assert!(planner(1).plan(&markup, &analysis.zones, 0).is_empty());
    }

    #[test]
    fn test_insert_back_to_front() {
        let markup = "<p>One. Two. Three.</p>";
        let out = insert(
            markup,
            &[
                Insertion { offset: 7, markup: " [a]".into() },
                Insertion { offset: 12, markup: " [b]".into() },
                Insertion { offset: 12, markup: " [c]".into() },
            ],
        )
        .unwrap();
        assert_eq!(out, "<p>One. [a] Two. [b] [c] Three.</p>");
    }

    #[test]
    fn test_insert_rejects_invalid_offsets() {
        let markup = "<p>é</p>";
        let inside_tag = insert(markup, &[Insertion { offset: 1, markup: "x".into() }]);
        assert!(matches!(inside_tag, Err(AppError::Placement { .. })));

        let split_char = insert(markup, &[Insertion { offset: 4, markup: "x".into() }]);
        assert!(split_char.is_err());

        let past_end = insert(markup, &[Insertion { offset: 100, markup: "x".into() }]);
        assert!(past_end.is_err());
    }
}
