//! Line-oriented delivery of streamed command output.

/// Receiver of complete output lines, without their terminator.
///
/// Implemented for closures, tokio unbounded senders and std senders, so a
/// caller can consume output inline or on another task/thread:
///
/// ```
/// use tavor::CommandOptions;
///
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
/// let options = CommandOptions::new()
///     .on_stdout(tx)
///     .on_stderr(|line: &str| eprintln!("[err] {}", line));
/// ```
pub trait OutputSink: Send {
    fn on_line(&mut self, line: &str);
}

impl<F> OutputSink for F
where
    F: FnMut(&str) + Send,
{
    fn on_line(&mut self, line: &str) {
        self(line)
    }
}

impl OutputSink for tokio::sync::mpsc::UnboundedSender<String> {
    fn on_line(&mut self, line: &str) {
        // Receiver gone means nobody is listening any more
        let _ = self.send(line.to_string());
    }
}

impl OutputSink for std::sync::mpsc::Sender<String> {
    fn on_line(&mut self, line: &str) {
        let _ = self.send(line.to_string());
    }
}

/// One output stream (stdout or stderr) of a running command.
///
/// Keeps the full accumulation for the final result and feeds the sink
/// whole lines only. A trailing partial line is held until its terminator
/// arrives, so every byte reaches the sink exactly once.
pub(crate) struct OutputStream {
    accumulated: String,
    partial: String,
    sink: Option<Box<dyn OutputSink>>,
    lines_delivered: usize,
}

impl OutputStream {
    pub(crate) fn new(sink: Option<Box<dyn OutputSink>>) -> Self {
        Self {
            accumulated: String::new(),
            partial: String::new(),
            sink,
            lines_delivered: 0,
        }
    }

    pub(crate) fn push(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.accumulated.push_str(fragment);

        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        self.partial.push_str(fragment);
        let mut consumed = 0;
        while let Some(offset) = self.partial[consumed..].find('\n') {
            let end = consumed + offset;
            let line = &self.partial[consumed..end];
            sink.on_line(line.strip_suffix('\r').unwrap_or(line));
            self.lines_delivered += 1;
            consumed = end + 1;
        }
        self.partial.drain(..consumed);
    }

    /// Deliver a held partial line once no more output can follow.
    pub(crate) fn flush(&mut self) {
        if self.partial.is_empty() {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            let line = std::mem::take(&mut self.partial);
            sink.on_line(line.strip_suffix('\r').unwrap_or(&line));
            self.lines_delivered += 1;
        }
    }

    pub(crate) fn take(&mut self) -> String {
        std::mem::take(&mut self.accumulated)
    }

    pub(crate) fn lines_delivered(&self) -> usize {
        self.lines_delivered
    }
}
