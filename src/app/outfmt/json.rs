use std::io::Write;

use serde_json::{Map, Value};

use crate::portfolio::render::RenderTable;
use crate::util::rw::WriteHandle;

use super::model::{Error, OutputType, ReportWriter};

/// Collects every table into a single JSON document, written on finish.
///
/// Top level keys are the table names. Per-instrument trade tables are
/// nested under "trades", keyed by instrument.
pub struct JsonWriter {
    w: WriteHandle,
    doc: Map<String, Value>,
    trades: Map<String, Value>,
}

impl JsonWriter {
    pub fn new(w: WriteHandle) -> JsonWriter {
        JsonWriter {
            w,
            doc: Map::new(),
            trades: Map::new(),
        }
    }
}

impl ReportWriter for JsonWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let value = serde_json::to_value(table_model).map_err(|e| e.to_string())?;
        match out_type {
            OutputType::Trades => self.trades.insert(name.to_string(), value),
            _ => self.doc.insert(out_type.base_name().to_string(), value),
        };
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), Error> {
        if !self.trades.is_empty() {
            let trades = std::mem::take(&mut self.trades);
            self.doc
                .insert(OutputType::Trades.base_name().to_string(), Value::Object(trades));
        }
        serde_json::to_writer_pretty(&mut self.w, &self.doc).map_err(|e| e.to_string())?;
        writeln!(self.w).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::{portfolio::render::RenderTable, util::rw::WriteHandle};

    use super::super::model::{OutputType, ReportWriter};
    use super::JsonWriter;

    #[test]
    fn test_json_writer() {
        let (handle, buff) = WriteHandle::string_buff_write_handle();
        let mut w = Box::new(JsonWriter::new(handle));
        let table = RenderTable {
            header: vec!["Date".to_string(), "Total Value".to_string()],
            rows: vec![vec!["2023-01-02".to_string(), "10.00".to_string()]],
            ..Default::default()
        };
        w.print_render_table(OutputType::ValuationSeries, "", &table).unwrap();
        w.print_render_table(OutputType::Trades, "FOO", &table).unwrap();
        w.finish().unwrap();

        let doc: serde_json::Value = serde_json::from_str(buff.borrow().as_str()).unwrap();
        assert_eq!(doc["valuation"]["rows"][0][1], "10.00");
        assert_eq!(doc["trades"]["FOO"]["header"][0], "Date");
    }
}
