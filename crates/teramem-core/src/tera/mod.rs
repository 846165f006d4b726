//! Persistent-memory regions and root tracking for promoted objects.
//!
//! A [`TeraCache`] owns one mapped persistent space. Regions are carved
//! from it back to back and bump-allocated; nothing is ever freed in place.
//! Promoted objects that stay reachable from the heap are pushed onto a
//! LIFO [`RootStack`] so the collector can re-trace them later.
//!
//! ```text
//!  space start                                               space stop
//!  │ region 0 (closed)   │ region 1 (active)          │ unused          │
//!  │█████████████████░░░░│████████████▲░░░░░░░░░░░░░░░│                 │
//!                                     └ cursor
//! ```
//!
//! None of these types are synchronized. The collector must guarantee a
//! single writer during promotion and root draining; the `&mut self` API
//! makes that explicit.

mod backing;
mod cache;
mod region;
mod roots;

pub use backing::{HeapBacking, RegionBacking};
pub use cache::{TeraCache, TeraStats};
pub use region::Region;
pub use roots::RootStack;
