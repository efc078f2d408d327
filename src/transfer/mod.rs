// ─── Chunked Transfer ───
// Splits oversized files into ordered parts, moves them through the
// hosting collaborator one at a time, and reassembles them byte-exact.

pub mod chunks;
pub mod client;

pub use chunks::{reassemble, split_into_parts, TransferPart};
pub use client::{DownloadResult, HostClient};
