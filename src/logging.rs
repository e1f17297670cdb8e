use tracing_subscriber::fmt::MakeWriter;

/// Mirrors every formatted log line into a broadcast channel so the dashboard
/// can tail daemon logs over the `/api/logs` SSE stream.
#[derive(Clone)]
pub(crate) struct LogFanout {
    pub sender: tokio::sync::broadcast::Sender<String>,
}

impl<'a> MakeWriter<'a> for LogFanout {
    type Writer = LogFanoutWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogFanoutWriter {
            sender: self.sender.clone(),
        }
    }
}

pub(crate) struct LogFanoutWriter {
    sender: tokio::sync::broadcast::Sender<String>,
}

impl std::io::Write for LogFanoutWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(line); // Ignored if no receivers
        std::io::stdout().write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}
