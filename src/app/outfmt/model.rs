use crate::portfolio::render::RenderTable;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OutputType {
    PortfolioSummary,
    Holdings,
    ValuationSeries,
    TopMovers,
    ConversionLog,
    Issues,
    /// Trade history of a single instrument
    Trades,
}

impl OutputType {
    /// Name of the table, without the instrument (if any).
    pub fn base_name(&self) -> &'static str {
        match self {
            OutputType::PortfolioSummary => "portfolio-summary",
            OutputType::Holdings => "holdings",
            OutputType::ValuationSeries => "valuation",
            OutputType::TopMovers => "top-movers",
            OutputType::ConversionLog => "conversion-log",
            OutputType::Issues => "issues",
            OutputType::Trades => "trades",
        }
    }
}

pub type Error = String;

pub trait ReportWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error>;

    fn finish(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}
