use super::bundle::assemble_bundle;
use super::components::{extract_components, found_count};
use super::evidence::build_evidence;
use super::name::extract_name;
use super::segment::{detect_episode_type, select_primary_episode};
use super::total::extract_total;
use super::types::{BundleSummary, ComponentKey, ComponentMap, ParsedBillingFields};
use crate::pipeline::extraction::sanitize::{normalized_lines, sanitize_extracted_text};
use crate::pipeline_config::PipelineConfig;

/// Interpret acquired billing text:
/// sanitize → lines → primary episode → name / total / components →
/// evidence → bundle.
///
/// Pure with respect to `text` and `config`. Fields missing from the selected
/// episode fall back to the whole document when more than one episode group
/// was present.
pub fn interpret_billing_text(text: &str, config: &PipelineConfig) -> ParsedBillingFields {
    let clean = sanitize_extracted_text(text);
    let lines = normalized_lines(&clean);
    let whole_text = lines.join("\n");

    let episode = select_primary_episode(&lines);
    let segment_text = episode.lines.join("\n");
    let fallback = episode.is_partial();

    let name = extract_name(&segment_text)
        .or_else(|| fallback.then(|| extract_name(&whole_text)).flatten());
    let total = extract_total(&segment_text)
        .or_else(|| fallback.then(|| extract_total(&whole_text)).flatten());
    let total_int = total.as_ref().map(|t| t.value);

    let mut components = extract_components(&episode.lines, total_int);
    if fallback {
        fill_from_whole_document(&mut components, extract_components(&lines, total_int));
    }

    let episode_type = detect_episode_type(&segment_text).or_else(|| detect_episode_type(&whole_text));
    let evidence = build_evidence(&episode.lines, &components, total.as_ref(), config);

    let summary = BundleSummary {
        name: name.clone(),
        episode_type,
        total_raw: total.as_ref().map(|t| t.raw.clone()),
        total_int,
        billing_id: episode.report.billing_id.clone(),
        components: components.clone(),
    };
    let bundle = assemble_bundle(&whole_text, config.bundle_max_chars, summary, &evidence);

    tracing::info!(
        lines = lines.len(),
        groups = episode.report.group_count,
        name_found = name.is_some(),
        total = ?total_int,
        components_found = found_count(&components),
        amounts_resolved = resolved_amount_count(&components),
        "Billing text interpreted"
    );

    ParsedBillingFields {
        name,
        total_raw: total.map(|t| t.raw),
        total_int,
        components,
        payload: evidence.payload,
        field_status: evidence.field_status,
        episode: episode.report,
        bundle,
    }
}

/// Take the whole-document record for categories the episode left without
/// an amount.
fn fill_from_whole_document(components: &mut ComponentMap, whole: ComponentMap) {
    for (key, record) in whole {
        let Some(current) = components.get(&key) else {
            continue;
        };
        let better = current.amount.is_none()
            && (record.amount.is_some() || (!current.found && record.found));
        if better {
            tracing::debug!(category = key.as_str(), "component taken from whole document");
            components.insert(key, record);
        }
    }
}

/// Number of categories with an amount.
pub fn resolved_amount_count(components: &ComponentMap) -> usize {
    ComponentKey::ALL
        .iter()
        .filter(|k| components.get(k).is_some_and(|c| c.amount.is_some()))
        .count()
}
