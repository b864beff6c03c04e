use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use adam_cli::pipeline::AdslRun;
use adam_core::ae_query::AeQueryResponse;
use adam_core::events::ResolvedEvents;
use adam_model::{Condition, EventRule};

const SUBJECT_PREVIEW: usize = 10;

pub fn print_adsl_summary(run: &AdslRun) {
    println!("Study folder: {}", run.study_folder.display());
    println!("Domains: {}", run.loaded.join(", "));
    match &run.output {
        Some(path) => println!("Output: {}", path.display()),
        None => println!("Output: (dry run)"),
    }
    println!(
        "Subjects: {}  treated: {}  with last alive date: {}  ({} ms)",
        run.build.data.height(),
        run.build.treatment.start.len(),
        run.build.last_alive.len(),
        run.elapsed_ms
    );
    println!();
    println!("Last alive date ({}):", run.build.last_alive.mode);
    println!("{}", rule_stats_table(&run.build.last_alive));
}

fn rule_stats_table(events: &ResolvedEvents) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Rule"),
        header_cell("Rows"),
        header_cell("Qualified"),
        header_cell("Bad dates"),
        header_cell("Candidates"),
        header_cell("Selected"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 0..7 {
        if index != 1 {
            align_column(&mut table, index, CellAlignment::Right);
        }
    }
    let selected = events.counts_by_rule();
    let mut total_selected = 0usize;
    for stats in &events.stats {
        let count = selected.get(stats.rule_id.as_str()).copied().unwrap_or(0);
        total_selected += count;
        table.add_row(vec![
            dim_cell(stats.event_nr),
            Cell::new(&stats.rule_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(stats.source_rows),
            Cell::new(stats.qualified),
            count_cell(stats.unusable_dates, Color::Yellow),
            Cell::new(stats.candidates),
            count_cell(count, Color::Green),
        ]);
    }
    table.add_row(vec![
        dim_cell("-"),
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        Cell::new(total_selected).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn print_ae_response(response: &AeQueryResponse) {
    let query = &response.parsed_query;
    if !response.question.is_empty() {
        println!("Question: {}", response.question);
    }
    let mut table = Table::new();
    apply_table_style(&mut table);
    table.set_header(vec![header_cell("Field"), header_cell("Value")]);
    table.add_row(vec![Cell::new("Target column"), Cell::new(&query.target_column)]);
    table.add_row(vec![Cell::new("Filter value"), Cell::new(&query.filter_value)]);
    table.add_row(vec![Cell::new("Match type"), Cell::new(query.match_type.as_str())]);
    table.add_row(vec![Cell::new("Reasoning"), Cell::new(&query.reasoning)]);
    table.add_row(vec![
        Cell::new("Unique subjects"),
        Cell::new(response.results.unique_subject_count).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("AE records"),
        Cell::new(response.results.total_records),
    ]);
    println!("{table}");

    let subjects = &response.results.subject_ids;
    if subjects.is_empty() {
        return;
    }
    println!("Subject IDs (first {SUBJECT_PREVIEW}):");
    for subject in subjects.iter().take(SUBJECT_PREVIEW) {
        println!("  - {subject}");
    }
    if subjects.len() > SUBJECT_PREVIEW {
        println!("  ... and {} more", subjects.len() - SUBJECT_PREVIEW);
    }
}

pub fn print_rules(rules: &[EventRule]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Rule"),
        header_cell("Source"),
        header_cell("Date"),
        header_cell("Condition"),
        header_cell("Order"),
        header_cell("Provenance"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (index, rule) in rules.iter().enumerate() {
        let provenance = match &rule.provenance.seq_column {
            Some(seq) => format!(
                "{} / {} / {}",
                rule.provenance.domain, seq, rule.provenance.variable
            ),
            None => format!("{} / - / {}", rule.provenance.domain, rule.provenance.variable),
        };
        let order = if rule.order.is_empty() {
            "-".to_string()
        } else {
            rule.order.join(", ")
        };
        table.add_row(vec![
            dim_cell(index + 1),
            Cell::new(&rule.id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(rule.source.label()),
            Cell::new(&rule.date_column),
            Cell::new(describe_condition(&rule.condition)),
            Cell::new(order),
            Cell::new(provenance),
        ]);
    }
    println!("{table}");
}

/// Short human rendering of a condition tree.
pub fn describe_condition(condition: &Condition) -> String {
    let join = |conditions: &[Condition], op: &str| {
        conditions
            .iter()
            .map(describe_condition)
            .collect::<Vec<_>>()
            .join(op)
    };
    match condition {
        Condition::Always => "-".to_string(),
        Condition::NotMissing { column } => format!("{column} present"),
        Condition::Equals { column, value } => format!("{column} = {value}"),
        Condition::NotEquals { column, value } => format!("{column} != {value}"),
        Condition::OneOf { column, values } => format!("{column} in [{}]", values.join(", ")),
        Condition::Contains { column, value } => format!("{column} contains {value}"),
        Condition::GreaterThan { column, threshold } => format!("{column} > {threshold}"),
        Condition::NumberEquals { column, value } => format!("{column} == {value}"),
        Condition::CompleteDate { column } => format!("{column} complete"),
        Condition::All { conditions } if conditions.is_empty() => "-".to_string(),
        Condition::All { conditions } => format!("({})", join(conditions, " and ")),
        Condition::Any { conditions } => format!("({})", join(conditions, " or ")),
        Condition::Not { condition } => format!("not {}", describe_condition(condition)),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
