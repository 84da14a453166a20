//! Episode segmentation.
//!
//! One PDF may hold several billing episodes, and OCR of an image-only
//! document can repeat a header for the same episode. Segments are split at
//! episode headers, merged by billing identifier, and the group carrying the
//! strongest billing signal becomes the working text.

use super::components::{count_summary_markers, extract_components, found_count};
use super::labels::{contains_phrase, BILL_NUMBER_LABEL, EPISODE_HEADER};
use super::total::{extract_total, has_total_phrase};
use super::types::{EpisodeReport, EpisodeType};

/// Identifiers shorter than this are form numbers or OCR fragments.
const MIN_BILLING_ID_DIGITS: usize = 6;

/// Contiguous lines starting at an episode header.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSegment {
    pub lines: Vec<String>,
    pub billing_id: Option<String>,
}

/// Score tuple, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpisodeScore {
    pub has_total: bool,
    pub components_found: usize,
    /// Subtotal markers plus one when a total phrase is present.
    pub markers: usize,
}

/// The chosen working lines and how they were chosen.
#[derive(Debug, Clone)]
pub struct SelectedEpisode {
    pub lines: Vec<String>,
    pub report: EpisodeReport,
}

impl SelectedEpisode {
    /// More than one candidate group existed, so per-field whole-document
    /// fallback is meaningful.
    pub fn is_partial(&self) -> bool {
        self.report.group_count > 1
    }
}

/// Split at every episode header. Lines before the first header belong to
/// the first segment; without any header the whole document is one segment.
pub fn split_segments(lines: &[String]) -> Vec<EpisodeSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut seen_header = false;

    for line in lines {
        if EPISODE_HEADER.is_match(line) {
            if seen_header && !current.is_empty() {
                segments.push(make_segment(std::mem::take(&mut current)));
            }
            seen_header = true;
        }
        current.push(line.clone());
    }
    if !current.is_empty() {
        segments.push(make_segment(current));
    }

    segments
}

fn make_segment(lines: Vec<String>) -> EpisodeSegment {
    let billing_id = lines.iter().find_map(|l| billing_id_of(l));
    EpisodeSegment { lines, billing_id }
}

/// Digits of the token after a bill-number label, when long enough.
pub fn billing_id_of(line: &str) -> Option<String> {
    let label = BILL_NUMBER_LABEL.find(line)?;
    let rest = line[label.end()..].trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | '.' | '#' | '-')
    });
    let token = rest.split_whitespace().next()?;
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= MIN_BILLING_ID_DIGITS).then_some(digits)
}

/// Merge segments sharing a billing identifier, in first-seen order.
pub fn group_segments(segments: Vec<EpisodeSegment>) -> Vec<EpisodeSegment> {
    let mut groups: Vec<EpisodeSegment> = Vec::new();
    for segment in segments {
        let existing = segment
            .billing_id
            .as_ref()
            .and_then(|id| groups.iter_mut().find(|g| g.billing_id.as_ref() == Some(id)));
        match existing {
            Some(group) => group.lines.extend(segment.lines),
            None => groups.push(segment),
        }
    }
    groups
}

pub fn score_lines(lines: &[String]) -> EpisodeScore {
    let joined = lines.join("\n");
    let total = extract_total(&joined);
    let components = extract_components(lines, total.as_ref().map(|t| t.value));
    EpisodeScore {
        has_total: total.is_some(),
        components_found: found_count(&components),
        markers: count_summary_markers(lines) + usize::from(has_total_phrase(&joined)),
    }
}

/// Pick the primary episode. Ties keep the first-seen group.
pub fn select_primary_episode(lines: &[String]) -> SelectedEpisode {
    let segments = split_segments(lines);
    let segment_count = segments.len();
    let groups = group_segments(segments);

    if groups.len() <= 1 {
        let billing_id = groups.first().and_then(|g| g.billing_id.clone());
        return SelectedEpisode {
            lines: lines.to_vec(),
            report: EpisodeReport {
                segment_count,
                group_count: groups.len(),
                selected_group: 0,
                billing_id,
                line_count: lines.len(),
            },
        };
    }

    let mut best_index = 0;
    let mut best_score = score_lines(&groups[0].lines);
    for (index, group) in groups.iter().enumerate().skip(1) {
        let score = score_lines(&group.lines);
        tracing::debug!(group = index, ?score, "scored episode group");
        if score > best_score {
            best_index = index;
            best_score = score;
        }
    }

    let group_count = groups.len();
    let selected = groups.into_iter().nth(best_index).unwrap_or_else(|| EpisodeSegment {
        lines: lines.to_vec(),
        billing_id: None,
    });
    tracing::debug!(
        segments = segment_count,
        groups = group_count,
        selected = best_index,
        "selected primary episode"
    );

    SelectedEpisode {
        report: EpisodeReport {
            segment_count,
            group_count,
            selected_group: best_index,
            billing_id: selected.billing_id,
            line_count: selected.lines.len(),
        },
        lines: selected.lines,
    }
}

/// Care setting named in the text. Inpatient wins over emergency, which wins
/// over outpatient: an admission through IGD is still an inpatient episode.
pub fn detect_episode_type(text: &str) -> Option<EpisodeType> {
    let upper = text.to_uppercase();
    let any = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&upper, p));

    if any(&["RAWAT INAP", "RANAP", "INPATIENT", "R. INAP"]) {
        Some(EpisodeType::RawatInap)
    } else if any(&["IGD", "UGD", "GAWAT DARURAT", "EMERGENCY"]) {
        Some(EpisodeType::Igd)
    } else if any(&["RAWAT JALAN", "RAJAL", "POLIKLINIK", "OUTPATIENT"]) {
        Some(EpisodeType::RawatJalan)
    } else {
        None
    }
}
