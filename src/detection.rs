//! Heuristic relationship inference between two nodes.
//!
//! [`RelationshipDetector::detect`] is a pure function over the two nodes'
//! text: it never touches the graph and always returns the same answer for
//! the same inputs. Precedence, first match wins:
//!
//! 1. **Conflict cues**: mutual-exclusion language in either description
//!    that references the other node's topic yields `ConflictsWith`.
//! 2. **Dependency cues**: dependency language in one description whose
//!    object overlaps the other node's title yields `Enables`, directed
//!    from the node *without* the dependency language.
//! 3. **Lexical similarity**: Jaccard overlap of `title + description`
//!    token sets against two thresholds yields `Synergistic`,
//!    `Reinforces`, or `Independent`.
//!
//! Thresholds live in an explicit [`DetectionConfig`] (never globals) so
//! test suites can calibrate them deterministically; they can also be
//! resolved from the environment like the rest of this crate's tunables.
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::detection::RelationshipDetector;
//! use goalgraph::node::NodeFactory;
//! use goalgraph::types::{Priority, RelationshipType};
//!
//! let mut factory = NodeFactory::new();
//! let research = factory.create_goal(
//!     "Research",
//!     "Research first",
//!     vec![],
//!     Priority::Normal,
//! );
//! let build = factory.create_goal(
//!     "Build",
//!     "Requires research to be completed",
//!     vec![],
//!     Priority::Normal,
//! );
//!
//! let detector = RelationshipDetector::default();
//! let detected = detector.detect_directed(&research, &build);
//! assert_eq!(detected.relationship, RelationshipType::Enables);
//! assert_eq!(detected.source_id, research.id);
//! ```

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::types::RelationshipType;

/// Mutual-exclusion markers checked against lowercased descriptions.
const CONFLICT_MARKERS: &[&str] = &["instead of", "alternative to", "versus", " vs ", "rather than"];

/// Dependency markers checked against lowercased descriptions.
const DEPENDENCY_MARKERS: &[&str] = &["requires", "depends on", "needs", "after"];

/// Similarity thresholds for the lexical fallback.
///
/// The exact cutoffs are an empirical tuning parameter, not a contract;
/// defaults were picked against hand-labeled plan text and can be overridden
/// per detector or via `GOALGRAPH_SYNERGY_THRESHOLD` /
/// `GOALGRAPH_REINFORCE_THRESHOLD`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// At or above this similarity (with no stronger cue): `Synergistic`.
    pub synergy_threshold: f64,
    /// At or above this similarity, below synergy: `Reinforces`.
    pub reinforce_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            synergy_threshold: 0.6,
            reinforce_threshold: 0.25,
        }
    }
}

impl DetectionConfig {
    /// Resolve thresholds from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let lookup = |key: &str, default: f64| {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            synergy_threshold: lookup("GOALGRAPH_SYNERGY_THRESHOLD", defaults.synergy_threshold),
            reinforce_threshold: lookup(
                "GOALGRAPH_REINFORCE_THRESHOLD",
                defaults.reinforce_threshold,
            ),
        }
    }
}

/// A classification plus the direction it implies.
///
/// For every relationship except `Enables` the direction is just the
/// argument order; for `Enables` the source is the prerequisite node.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedRelationship {
    pub relationship: RelationshipType,
    pub source_id: String,
    pub target_id: String,
}

/// Rule-based classifier inferring an edge type from node text.
#[derive(Clone, Debug, Default)]
pub struct RelationshipDetector {
    config: DetectionConfig,
}

impl RelationshipDetector {
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Classify the pair. Symmetric for every outcome except `Enables`,
    /// where [`detect_directed`](Self::detect_directed) carries direction.
    #[must_use]
    pub fn detect(&self, a: &Node, b: &Node) -> RelationshipType {
        self.detect_directed(a, b).relationship
    }

    /// Classify the pair and resolve edge direction.
    #[must_use]
    pub fn detect_directed(&self, a: &Node, b: &Node) -> DetectedRelationship {
        let a_title = tokenize(&a.title);
        let b_title = tokenize(&b.title);

        // 1. Conflict cues beat everything else.
        if (has_conflict_cue(&a.description) && references_topic(&a.description, &b_title))
            || (has_conflict_cue(&b.description) && references_topic(&b.description, &a_title))
        {
            return DetectedRelationship {
                relationship: RelationshipType::ConflictsWith,
                source_id: a.id.clone(),
                target_id: b.id.clone(),
            };
        }

        // 2. Dependency cues; the node without the cue is the prerequisite.
        //    Cues on both sides are ambiguous and fall through to similarity.
        let a_depends_on_b =
            has_dependency_cue(&a.description) && references_topic(&a.description, &b_title);
        let b_depends_on_a =
            has_dependency_cue(&b.description) && references_topic(&b.description, &a_title);
        if a_depends_on_b != b_depends_on_a {
            let (source, target) = if a_depends_on_b { (b, a) } else { (a, b) };
            return DetectedRelationship {
                relationship: RelationshipType::Enables,
                source_id: source.id.clone(),
                target_id: target.id.clone(),
            };
        }

        // 3. Lexical similarity fallback.
        let similarity = jaccard_similarity(
            &format!("{} {}", a.title, a.description),
            &format!("{} {}", b.title, b.description),
        );
        let relationship = if similarity >= self.config.synergy_threshold {
            RelationshipType::Synergistic
        } else if similarity >= self.config.reinforce_threshold {
            RelationshipType::Reinforces
        } else {
            RelationshipType::Independent
        };
        DetectedRelationship {
            relationship,
            source_id: a.id.clone(),
            target_id: b.id.clone(),
        }
    }
}

/// Lowercase and split on non-alphanumeric runs, discarding empty tokens.
#[must_use]
pub fn tokenize(text: &str) -> FxHashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard set-overlap of the two texts' token sets.
///
/// Symmetric, bounded in `[0, 1]`; identical non-empty text scores 1.0 and
/// two empty token sets score 0.0 so blank content never looks similar.
#[must_use]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

fn has_conflict_cue(description: &str) -> bool {
    let lower = description.to_lowercase();
    CONFLICT_MARKERS.iter().any(|marker| lower.contains(marker))
        || (lower.contains("either") && lower.contains(" or "))
}

fn has_dependency_cue(description: &str) -> bool {
    let lower = description.to_lowercase();
    DEPENDENCY_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether the description mentions any token of the other node's title.
fn references_topic(description: &str, title_tokens: &FxHashSet<String>) -> bool {
    if title_tokens.is_empty() {
        return false;
    }
    let description_tokens = tokenize(description);
    !description_tokens.is_disjoint(title_tokens)
}
