use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use tariff_bill::{
    quantity::{cost::Cost, power::Kilowatts},
    report::{BillReport, ReportRow},
};

#[must_use]
pub fn build_report_table(report: &BillReport) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();

    let mut header = vec![Cell::new("Month"), Cell::new("Energy"), Cell::new("Energy cost")];
    for period in 0..report.n_demand_periods {
        header.push(Cell::new(format!("Peak #{period}")));
        header.push(Cell::new(format!("Demand #{period}")));
    }
    header.extend([
        Cell::new("Flat peak"),
        Cell::new("Flat demand"),
        Cell::new("Fixed"),
        Cell::new("Total"),
    ]);
    table.set_header(header);

    for (cycle, row) in &report.cycles {
        table.add_row(build_row(Cell::new(cycle), row));
    }
    table.add_row(
        build_row(Cell::new("Annual"), &report.annual)
            .into_iter()
            .map(|cell| cell.add_attribute(Attribute::Bold)),
    );
    table
}

fn build_row(label: Cell, row: &ReportRow) -> Vec<Cell> {
    let mut cells = vec![
        label,
        Cell::new(row.energy).set_alignment(CellAlignment::Right),
        cost_cell(row.energy_cost),
    ];
    for period in &row.demand {
        cells.push(peak_cell(period.peak));
        cells.push(cost_cell(period.cost));
    }
    cells.extend([
        peak_cell(row.flat_demand_peak),
        cost_cell(row.flat_demand_cost),
        cost_cell(row.fixed_cost),
        cost_cell(row.total).fg(Color::Cyan),
    ]);
    cells
}

fn cost_cell(cost: Cost) -> Cell {
    let cost = cost.round_to_cents();
    Cell::new(cost)
        .set_alignment(CellAlignment::Right)
        .fg(if cost > Cost::ZERO { Color::Reset } else { Color::DarkGrey })
}

fn peak_cell(peak: Option<Kilowatts>) -> Cell {
    match peak {
        Some(peak) => Cell::new(peak).set_alignment(CellAlignment::Right),
        None => Cell::new("n/a").set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim),
    }
}
