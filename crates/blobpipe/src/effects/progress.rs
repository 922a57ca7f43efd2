//! Progress reporting: the visual meter and the rate-limited event channel.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use tokio::sync::mpsc::UnboundedSender;

use crate::data::{BlobInfo, ProgressEvent, ProgressProperties};
use crate::effects::readers::SourceStream;

/// Count the raw bytes moved through `stream` on `bar`.
pub fn meter(stream: &mut SourceStream, bar: &ProgressBar) {
    let bar = bar.clone();
    stream.wrap(|r| Box::new(bar.wrap_read(r)));
}

struct Reporter {
    sender:   UnboundedSender<ProgressProperties>,
    artifact: BlobInfo,
    offset:   AtomicU64,
    reported: AtomicU64,
}

impl Reporter {
    fn send(&self, event: ProgressEvent) {
        let offset = self.offset.load(Ordering::Acquire);
        let previous = self.reported.swap(offset, Ordering::AcqRel);
        // A closed channel means nobody is listening any more.
        let _ = self.sender.send(ProgressProperties {
            event,
            artifact: self.artifact.clone(),
            offset,
            offset_update: offset.saturating_sub(previous),
        });
    }
}

/// Sends a `Read` event at most once per interval while bytes flow through.
pub struct ProgressReader<R> {
    reader:    R,
    reporter:  Arc<Reporter>,
    interval:  Duration,
    last_sent: Instant,
}

/// Progress notifications for one copy.
///
/// Sends `NewArtifact` when started and `Done` when dropped, so `Done` goes
/// out exactly once whichever way the copy ends.
pub struct ProgressSession {
    reporter: Arc<Reporter>,
}

impl ProgressSession {
    pub fn start(sender: UnboundedSender<ProgressProperties>, artifact: BlobInfo) -> Self {
        let reporter = Arc::new(Reporter {
            sender,
            artifact,
            offset: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        });
        reporter.send(ProgressEvent::NewArtifact);
        Self { reporter }
    }

    /// Count bytes read through `reader`, reporting at most once per `interval`.
    pub fn reader<R: Read>(&self, reader: R, interval: Duration) -> ProgressReader<R> {
        ProgressReader {
            reader,
            reporter: Arc::clone(&self.reporter),
            interval,
            last_sent: Instant::now(),
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.reporter.offset.fetch_add(n as u64, Ordering::AcqRel);
            if self.last_sent.elapsed() > self.interval {
                self.reporter.send(ProgressEvent::Read);
                self.last_sent = Instant::now();
            }
        }
        Ok(n)
    }
}

impl Drop for ProgressSession {
    fn drop(&mut self) { self.reporter.send(ProgressEvent::Done); }
}
