//! Output column order, computed from named column groups rather than from
//! whatever order the joins happened to add columns in.

use recongrid_core::RecordSet;

use crate::config::Profile;

/// Column groups that make up an output table, in layout order.
#[derive(Debug, Clone, Default)]
pub struct ColumnGroups<'a> {
    pub statement: &'a [String],
    pub attached: &'a [String],
    /// Columns introduced by stage-2 enrichment.
    pub enrichment: &'a [String],
}

fn push_unique(order: &mut Vec<String>, col: &str) {
    if !order.iter().any(|c| c == col) {
        order.push(col.to_string());
    }
}

fn default_order(table: &RecordSet, groups: &ColumnGroups<'_>, profile: &Profile, with_analysis: bool) -> Vec<String> {
    let mut trailing = vec![profile.dispute.disputed.as_str()];
    if with_analysis {
        trailing.push(profile.dispute.analysis.as_str());
    }
    trailing.push(profile.output.status_column.as_str());

    let mut order = Vec::with_capacity(table.columns().len());
    push_unique(&mut order, &profile.keys.common_column);
    let leading = groups
        .statement
        .iter()
        .chain(groups.attached)
        .chain(groups.enrichment)
        .chain(table.columns());
    for col in leading {
        if !trailing.contains(&col.as_str()) {
            push_unique(&mut order, col);
        }
    }
    for col in trailing {
        push_unique(&mut order, col);
    }
    order.retain(|c| table.has_column(c));
    order
}

/// `CommonID`, statement columns, attached estimate columns, then
/// `Disputed amount` and the status column.
pub fn initial_order(table: &RecordSet, groups: &ColumnGroups<'_>, profile: &Profile) -> Vec<String> {
    default_order(table, groups, profile, false)
}

/// Like [`initial_order`] with enrichment columns after the estimate
/// columns and `Dispute analysis` before the status column. An explicit
/// `output.columns` list goes first; `output.strict` drops the rest.
pub fn final_order(table: &RecordSet, groups: &ColumnGroups<'_>, profile: &Profile) -> Vec<String> {
    let base = default_order(table, groups, profile, true);
    let listed = &profile.output.columns;
    if listed.is_empty() {
        return base;
    }

    let mut order = Vec::with_capacity(base.len());
    for col in listed {
        if table.has_column(col) {
            push_unique(&mut order, col);
        }
    }
    if !profile.output.strict {
        for col in &base {
            push_unique(&mut order, col);
        }
    }
    order
}

/// Apply a computed order, dropping cells of columns left out.
pub fn apply(table: &mut RecordSet, order: &[String]) {
    *table = table.select(order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn table(names: &[&str]) -> RecordSet {
        RecordSet::new("t", cols(names))
    }

    #[test]
    fn initial_puts_status_last() {
        let t = table(&["CommonID", "PO", "Amount", "Match Status", "Payable Amount", "Disputed amount"]);
        let statement = cols(&["PO", "Amount"]);
        let attached = cols(&["Payable Amount"]);
        let groups = ColumnGroups { statement: &statement, attached: &attached, enrichment: &[] };
        assert_eq!(
            initial_order(&t, &groups, &Profile::default()),
            cols(&["CommonID", "PO", "Amount", "Payable Amount", "Disputed amount", "Match Status"])
        );
    }

    #[test]
    fn final_places_status_after_analysis() {
        let t = table(&[
            "CommonID", "PO", "Match Status", "Payable Amount", "Status in api",
            "Disputed amount", "Dispute analysis",
        ]);
        let statement = cols(&["PO"]);
        let attached = cols(&["Payable Amount"]);
        let enrichment = cols(&["Status in api"]);
        let groups = ColumnGroups { statement: &statement, attached: &attached, enrichment: &enrichment };
        let order = final_order(&t, &groups, &Profile::default());
        assert_eq!(
            order,
            cols(&[
                "CommonID", "PO", "Payable Amount", "Status in api",
                "Disputed amount", "Dispute analysis", "Match Status",
            ])
        );
    }

    #[test]
    fn explicit_columns_lead_and_strict_drops_rest() {
        let t = table(&["CommonID", "PO", "Amount", "Match Status"]);
        let statement = cols(&["PO", "Amount"]);
        let groups = ColumnGroups { statement: &statement, ..ColumnGroups::default() };
        let mut profile = Profile::default();
        profile.output.columns = cols(&["Match Status", "PO", "Missing"]);

        assert_eq!(
            final_order(&t, &groups, &profile),
            cols(&["Match Status", "PO", "CommonID", "Amount"])
        );

        profile.output.strict = true;
        let order = final_order(&t, &groups, &profile);
        assert_eq!(order, cols(&["Match Status", "PO"]));

        let mut t = t;
        apply(&mut t, &order);
        assert_eq!(t.columns(), order.as_slice());
    }

    #[test]
    fn columns_outside_groups_are_kept() {
        let t = table(&["CommonID", "Extra", "PO", "Match Status"]);
        let statement = cols(&["PO"]);
        let groups = ColumnGroups { statement: &statement, ..ColumnGroups::default() };
        assert_eq!(
            initial_order(&t, &groups, &Profile::default()),
            cols(&["CommonID", "PO", "Extra", "Match Status"])
        );
    }
}
