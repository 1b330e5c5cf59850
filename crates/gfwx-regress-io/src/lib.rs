//! gfwx-regress-io: filesystem and process plumbing.
//!
//! Scans the image corpus, runs the codec tools as child processes,
//! prepares artifact directories and quarantines failing inputs. The
//! planning and verdict logic it drives lives in `gfwx-regress-pipeline`.

pub mod corpus;
pub mod error;
pub mod process;
pub mod session;
pub mod stages;
pub mod store;
pub mod toolchain;
pub mod triage;

pub use corpus::{CorpusScanner, Images};
pub use error::HarnessError;
pub use process::{ExitInfo, OutputMode, ProcessInvoker, ProcessStatus};
pub use session::Session;
pub use stages::ProcessExecutor;
pub use store::{ArtifactStore, DirStatus, ensure_container_exists};
pub use toolchain::Toolchain;
pub use triage::FailureTriage;
