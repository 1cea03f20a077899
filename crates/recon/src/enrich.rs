//! Builds the stage-2 lookup from a query export and/or scraper output.

use std::collections::HashMap;

use recongrid_core::RecordSet;

use crate::config::{Profile, RenameRule};
use crate::dates;
use crate::error::ReconError;
use crate::financial::{calculate, to_canonical, RebateRate};
use crate::model::RunContext;

/// Copy each `from` column into its canonical `to` column. Source columns
/// stay; an existing target only takes non-empty source values.
pub fn apply_renames(set: &mut RecordSet, rules: &[RenameRule]) {
    for rule in rules {
        if !set.has_column(&rule.from) || rule.from == rule.to {
            continue;
        }
        let existed = set.has_column(&rule.to);
        set.add_column(rule.to.clone());
        for row in set.rows_mut() {
            let value = row.get(&rule.from).clone();
            if !existed || !value.is_empty() {
                row.set(rule.to.clone(), value);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentSource {
    pub table: RecordSet,
    /// Query rows dropped because their amounts did not parse.
    pub financial_skipped: usize,
    pub date_unparsed: usize,
    pub fallback_dates: usize,
}

/// Normalize a query export. Raw exports (with the three source amount
/// columns) go through the calculator and date normalizer first.
pub fn normalize_query(
    query: &RecordSet,
    profile: &Profile,
    ctx: &mut RunContext,
) -> Result<EnrichmentSource, ReconError> {
    let raw = profile
        .financial
        .source_columns()
        .iter()
        .all(|c| query.has_column(c));

    if !raw {
        let mut table = query.clone();
        apply_renames(&mut table, &profile.enrichment.rename);
        return Ok(EnrichmentSource {
            table,
            ..EnrichmentSource::default()
        });
    }

    let rate = RebateRate::from_percent(profile.financial.rebate_percent)?;
    let calc = calculate(query, &profile.financial, rate)?;
    let mut calculated = calc.table;
    let date_outcome = dates::normalize(&mut calculated, &profile.dates);
    if !date_outcome.applied {
        ctx.warn(format!(
            "{}: neither '{}' nor '{}' found, appointment dates left blank",
            query.name(),
            profile.dates.primary,
            profile.dates.fallback
        ));
    }
    if !calc.dropped_rows.is_empty() {
        ctx.warn(format!(
            "{}: {} row(s) dropped from calculation (unparseable amounts)",
            query.name(),
            calc.dropped_rows.len()
        ));
    }

    let mut table = to_canonical(&calculated, profile);
    table.set_name(query.name());
    Ok(EnrichmentSource {
        table,
        financial_skipped: calc.dropped_rows.len(),
        date_unparsed: date_outcome.unparsed,
        fallback_dates: date_outcome.used_fallback,
    })
}

/// Left-join scraper fields onto the query table on `key`. Non-empty scraper
/// values win.
pub fn overlay_scraper(base: &mut RecordSet, scraper: &RecordSet, key: &str) {
    let mut lookup = HashMap::new();
    for (i, row) in scraper.rows().iter().enumerate() {
        let k = row.text(key);
        if !k.is_empty() {
            lookup.entry(k).or_insert(i);
        }
    }

    let fields: Vec<&String> = scraper.columns().iter().filter(|c| *c != key).collect();
    for col in &fields {
        base.add_column((*col).clone());
    }

    let mut hits = 0;
    for row in base.rows_mut() {
        let Some(&j) = lookup.get(&row.text(key)) else {
            continue;
        };
        hits += 1;
        let src = &scraper.rows()[j];
        for col in &fields {
            let value = src.get(col);
            if !value.is_empty() {
                row.set((*col).clone(), value.clone());
            }
        }
    }
    log::info!("scraper overlay: {hits} of {} query row(s) updated", base.len());
}

/// Assemble the enrichment set. With neither input the result is empty and
/// every stage-2 row ends up still unmatched.
pub fn build_enrichment(
    query: Option<&RecordSet>,
    scraper: Option<&RecordSet>,
    profile: &Profile,
    ctx: &mut RunContext,
) -> Result<EnrichmentSource, ReconError> {
    let scraper = scraper.map(|s| {
        let mut s = s.clone();
        apply_renames(&mut s, &profile.enrichment.rename);
        s
    });

    match (query, scraper) {
        (Some(q), scraped) => {
            let mut source = normalize_query(q, profile, ctx)?;
            if let Some(s) = scraped {
                let key = &profile.enrichment.scraper_key;
                if source.table.has_column(key) && s.has_column(key) {
                    overlay_scraper(&mut source.table, &s, key);
                } else {
                    ctx.warn(format!(
                        "scraper output not merged: '{key}' missing from query or scraper table"
                    ));
                }
            }
            Ok(source)
        }
        (None, Some(s)) => Ok(EnrichmentSource {
            table: s,
            ..EnrichmentSource::default()
        }),
        (None, None) => {
            ctx.warn("no enrichment source supplied; unmatched rows stay unmatched");
            Ok(EnrichmentSource::default())
        }
    }
}
