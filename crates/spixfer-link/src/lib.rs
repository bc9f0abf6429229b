//! Link layer for spixfer
//!
//! This crate opens a bus and the readiness line that gates it from short
//! link strings and pairs them in a [`LinkHandle`]. The CLI only deals with
//! link strings and handles; the concrete backend crates stay behind
//! feature flags.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI (bin/spixfer)                      │
//! │  - Parses link strings, loads TransferConfig                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    spixfer-link (this crate)                 │
//! │  - LinkHandle: bus + readiness line                          │
//! │  - Registry: opens backends by name                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    spixfer-core          │   │  Backend crates          │
//! │  - Frame codec           │   │  - linux-spi (SpiBus)    │
//! │  - Transfer sequencer    │   │  - linux-gpio (ReadySig) │
//! │  - Wait primitive        │   │  - dummy (both)          │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spixfer_link::open_link;
//! use spixfer_core::{NoProgress, TransferConfig};
//!
//! let mut link = open_link("dummy", None)?;
//! let report = link.send_file("image.bin", TransferConfig::default(), None, &mut NoProgress)?;
//! println!("{} bytes in {} frames", report.bytes_sent, report.data_frames);
//! ```

mod handle;
mod registry;

pub use handle::LinkHandle;
pub use registry::{
    available_links, link_names_short, open_link, parse_link_params, LinkInfo, LinkKind,
    LinkParams,
};
