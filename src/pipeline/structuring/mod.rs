pub mod types;
pub mod labels;
pub mod amount;
pub mod name;
pub mod total;
pub mod components;
pub mod segment;
pub mod evidence;
pub mod bundle;
pub mod orchestrator;

pub use types::*;
pub use amount::{format_rupiah, line_amount, parse_amount, AmountToken};
pub use name::extract_name;
pub use total::{extract_total, TotalMatch};
pub use components::{amount_ceiling, extract_components};
pub use segment::{detect_episode_type, select_primary_episode, SelectedEpisode};
pub use evidence::{build_evidence, rank_snippets, EvidencePayload, ScoredSnippet};
pub use bundle::{assemble_bundle, BUNDLE_SCHEMA_VERSION};
pub use orchestrator::*;
