use chrono::Local;
use plkg::radio::{RecordKind, TrafficLog};
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Per-endpoint traffic persistence: one CSV with a `timestamp,type,data`
/// header and one row per recognized line.
pub struct CsvRecorder {
    writer: Mutex<BufWriter<File>>,
}

impl CsvRecorder {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<CsvRecorder> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "timestamp,type,data")?;

        Ok(CsvRecorder { writer: Mutex::new(writer) })
    }
}

impl TrafficLog for CsvRecorder {
    fn record(&self, kind: RecordKind, line: &str) {
        let kind = match kind {
            RecordKind::Csi => "CSI",
            RecordKind::Msg => "MSG",
        };

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let data = line.replace('"', "\"\"");

        let mut writer = self.writer.lock().expect("Recorder lock poisoned");
        // A failed row is not worth killing the session over.
        drop(writeln!(writer, "{},{},\"{}\"", timestamp, kind, data));
    }
}
