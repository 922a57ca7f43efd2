use std::fmt;

use super::blob_info::BlobInfo;

/// Kind of a [`ProgressProperties`] notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A new blob started streaming. Sent once, before any bytes are read.
    NewArtifact,

    /// More bytes were read since the previous notification.
    Read,

    /// The copy call is finished, successfully or not. Sent exactly once.
    Done,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::NewArtifact => write!(f, "NewArtifact"),
            ProgressEvent::Read => write!(f, "Read"),
            ProgressEvent::Done => write!(f, "Done"),
        }
    }
}

/// A progress notification sent on the copier's progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressProperties {
    pub event: ProgressEvent,

    /// The blob being copied, as declared by the source.
    pub artifact: BlobInfo,

    /// Total bytes handed to the sink so far.
    pub offset: u64,

    /// Bytes handed to the sink since the previous notification.
    pub offset_update: u64,
}

impl ProgressProperties {
    /// Percentage of the declared size read so far, if the size is known.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.artifact.size.map(|total| {
            if total == 0 {
                if self.event == ProgressEvent::Done { 100.0 } else { 0.0 }
            } else {
                (self.offset as f64 / total as f64) * 100.0
            }
        })
    }
}
