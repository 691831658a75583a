use std::{fs::File, io, path::PathBuf};

use crate::portfolio::render::RenderTable;
use crate::util::os::mk_writable_dir;

use super::model::{Error, OutputType, ReportWriter};

/// Writes each table to its own CSV file in out_dir.
pub struct CsvWriter {
    out_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(out_dir: &str) -> Result<CsvWriter, io::Error> {
        let dir_path = PathBuf::from(out_dir);
        mk_writable_dir(&dir_path)?;
        Ok(CsvWriter { out_dir: dir_path })
    }

    pub fn file_name(out_type: OutputType, name: &str) -> String {
        match out_type {
            OutputType::Trades => format!(
                "{}-{}.csv",
                name.to_lowercase().replace([' ', '/'], "-"),
                out_type.base_name()
            ),
            _ => format!("{}.csv", out_type.base_name()),
        }
    }
}

impl ReportWriter for CsvWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let file_path = self.out_dir.join(CsvWriter::file_name(out_type, name));
        let fp = File::create(&file_path)
            .map_err(|e| format!("Failed to create {}: {}", file_path.display(), e))?;

        let mut csv_w = csv::WriterBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_writer(fp);
        let map_err = |e: csv::Error| format!("{}: {}", file_path.display(), e);

        csv_w.write_record(&table_model.header).map_err(map_err)?;
        for row in &table_model.rows {
            csv_w.write_record(row).map_err(map_err)?;
        }
        if !table_model.footer.is_empty() {
            csv_w.write_record(&table_model.footer).map_err(map_err)?;
        }

        // Notes and errors go in the first column, padded to the table width.
        let n_cols = table_model.header.len().max(1);
        for line in table_model.errors.iter().chain(table_model.notes.iter()) {
            let mut record = vec![String::new(); n_cols];
            record[0] = line.clone();
            csv_w.write_record(&record).map_err(map_err)?;
        }

        csv_w
            .flush()
            .map_err(|e| format!("{}: {}", file_path.display(), e))?;
        Ok(())
    }
}
