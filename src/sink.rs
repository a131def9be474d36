use crate::error::BfResult;
use crate::template::TemplateRecord;
use std::io::Write;
use tracing::debug;

/// Receives newly placed templates in acceptance order. Seeds and templates
/// restored from a checkpoint never reach a sink.
pub trait TemplateSink {
    fn emit(&mut self, record: &TemplateRecord) -> BfResult<()>;

    fn finish(&mut self) -> BfResult<()> {
        Ok(())
    }
}

impl TemplateSink for Vec<TemplateRecord> {
    fn emit(&mut self, record: &TemplateRecord) -> BfResult<()> {
        self.push(*record);
        Ok(())
    }
}

/// Streams templates as CSV rows.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn into_inner(self) -> BfResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

impl<W: Write> TemplateSink for CsvSink<W> {
    fn emit(&mut self, record: &TemplateRecord) -> BfResult<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn finish(&mut self) -> BfResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs each accepted template at debug level.
#[derive(Debug, Default)]
pub struct TracingSink {
    pub emitted: usize,
}

impl TemplateSink for TracingSink {
    fn emit(&mut self, record: &TemplateRecord) -> BfResult<()> {
        self.emitted += 1;
        debug!(
            "✅ #{} m1={:.4} m2={:.4} s1z={:.3} s2z={:.3} (best neighbor match {:.4})",
            record.sequence,
            record.mass1,
            record.mass2,
            record.spin1z,
            record.spin2z,
            record.accept_match
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_records;

    #[test]
    fn csv_sink_output_reads_back() {
        let rec = TemplateRecord {
            mass1: 1.5,
            mass2: 1.2,
            spin1z: 0.0,
            spin2z: 0.0,
            is_seed: false,
            sequence: 1,
            accept_match: 0.3,
        };
        let mut sink = CsvSink::new(Vec::new());
        sink.emit(&rec).unwrap();
        sink.finish().unwrap();
        let bytes = sink.into_inner().unwrap();
        assert_eq!(read_records(bytes.as_slice()).unwrap(), vec![rec]);
    }
}
