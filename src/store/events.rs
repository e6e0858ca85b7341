use crate::digest::Digest;

/// Handler to receive notifications for events during store
/// operations.
///
/// All methods are optional.
#[expect(unused_variables)]
pub trait EventHandler: Sync + 'static {
    /// A blob was streamed into the content-addressed directory.
    ///
    /// Content that was already stored under the same digest is not
    /// written again, but still reported here.
    fn blob_written(&self, digest: &Digest, size: u64) {}

    /// The manifest blob for an artifact was written.
    fn manifest_written(&self, digest: &Digest) {}

    /// The index was persisted. `entries` is the number of artifacts
    /// it now holds.
    fn index_persisted(&self, entries: usize) {}

    /// A layer was extracted to a file named by `title`.
    fn blob_extracted(&self, title: &str, bytes: u64) {}

    /// An unreferenced blob was removed by a prune.
    fn blob_pruned(&self, digest: &Digest, size: u64) {}
}

/// [`EventHandler`] instance to ignore all events.
pub struct NoEventHandler;

impl EventHandler for NoEventHandler {}
