use std::io::Write;

use tabled::settings::{
    object::{Cell, Columns, Rows},
    style::On,
    Alignment, Border, Style,
};

use crate::{portfolio::render::RenderTable, util::rw::WriteHandle};

use super::model::{Error, OutputType, ReportWriter};

/// Renders tables as aligned ascii text.
pub struct TextWriter {
    w: WriteHandle,
}

impl TextWriter {
    pub fn new(w: WriteHandle) -> TextWriter {
        TextWriter { w }
    }
}

fn title(out_type: OutputType, name: &str) -> String {
    match out_type {
        OutputType::PortfolioSummary => "Portfolio Summary".to_string(),
        OutputType::Holdings => "Holdings".to_string(),
        OutputType::ValuationSeries => "Daily Portfolio Value".to_string(),
        OutputType::TopMovers => "Top Gainers and Losers".to_string(),
        OutputType::ConversionLog => "Currency Conversions".to_string(),
        OutputType::Issues => "Issues".to_string(),
        OutputType::Trades => format!("Trades for {}", name),
    }
}

#[derive(Clone, Copy)]
struct CellBorder {
    top: char,
    bottom: char,
    left: char,
    right: char,
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
}

impl CellBorder {
    fn to_border(self) -> Border<On, On, On, On> {
        Border::full(
            self.top,
            self.bottom,
            self.left,
            self.right,
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        )
    }

    fn blank() -> CellBorder {
        CellBorder {
            top: ' ',
            bottom: ' ',
            left: ' ',
            right: ' ',
            top_left: ' ',
            top_right: ' ',
            bottom_left: ' ',
            bottom_right: ' ',
        }
    }
}

impl Default for CellBorder {
    fn default() -> Self {
        CellBorder {
            top: '-',
            bottom: '-',
            left: '|',
            right: '|',
            top_left: '+',
            top_right: '+',
            bottom_left: '+',
            bottom_right: '+',
        }
    }
}

/// The header sits above an open-edged grid. A footer, when present, is
/// drawn as a detached row of boxed cells under the grid.
fn build_table(table_model: &RenderTable) -> tabled::Table {
    let n_cols = table_model.header.len();
    let n_rows = table_model.rows.len();

    let mut bldr = tabled::builder::Builder::default();
    bldr.push_record(table_model.header.iter().map(|h| h.to_uppercase()));
    for row in &table_model.rows {
        bldr.push_record(row.iter().cloned());
    }
    let has_footer = !table_model.footer.is_empty();
    if has_footer {
        bldr.push_record(vec![String::new(); table_model.footer.len()]);
        bldr.push_record(table_model.footer.iter().cloned());
    }

    let mut table = bldr.build();
    table.with(Style::ascii());
    table.modify(Rows::first(), Alignment::center());

    let open_top = CellBorder {
        top: ' ',
        top_left: ' ',
        top_right: ' ',
        ..Default::default()
    };
    table.modify(Rows::first(), open_top.to_border());
    table.modify(
        Columns::first(),
        CellBorder {
            left: ' ',
            top_left: '-',
            bottom_left: '-',
            ..Default::default()
        }
        .to_border(),
    );
    table.modify(
        Columns::last(),
        CellBorder {
            right: ' ',
            top_right: '-',
            bottom_right: '-',
            ..Default::default()
        }
        .to_border(),
    );
    table.modify(
        Cell::new(0, 0),
        CellBorder {
            left: ' ',
            bottom_left: '-',
            ..open_top
        }
        .to_border(),
    );
    table.modify(
        Cell::new(0, n_cols - 1),
        CellBorder {
            right: ' ',
            bottom_right: '-',
            ..open_top
        }
        .to_border(),
    );

    if has_footer {
        let sep_row = 1 + n_rows;
        let footer_row = sep_row + 1;
        table.modify(Rows::single(sep_row), Border::new().set_left(' ').set_right(' '));
        table.modify(Rows::single(footer_row), CellBorder::blank().to_border());
        for (col, cell) in table_model.footer.iter().enumerate() {
            if !cell.is_empty() {
                table.modify(Cell::new(sep_row, col), CellBorder::default().to_border());
                table.modify(Cell::new(footer_row, col), CellBorder::default().to_border());
            }
        }
    }
    table
}

impl ReportWriter for TextWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let map_write_err = |e: std::io::Error| e.to_string();

        for err in &table_model.errors {
            writeln!(self.w, "[!] {}", err).map_err(map_write_err)?;
        }
        writeln!(self.w, "{}", title(out_type, name)).map_err(map_write_err)?;

        if table_model.rows.is_empty() || table_model.header.is_empty() {
            writeln!(self.w, "  (none)").map_err(map_write_err)?;
        } else {
            writeln!(self.w, "{}", build_table(table_model)).map_err(map_write_err)?;
        }

        for note in &table_model.notes {
            writeln!(self.w, "{}", note).map_err(map_write_err)?;
        }
        writeln!(self.w).map_err(map_write_err)?;
        Ok(())
    }
}
