//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and [`crate::convert`] only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ sequence ──▶ dispatch ──▶ aggregate ──▶ compose
//! (dir)     (natural     (chunks on    (index       (lopdf, one
//!            sort)        blocking      order)       page per image)
//!                         workers)
//! ```
//!
//! 1. [`input`]     — enumerate supported files in the input directory
//! 2. [`sequence`]  — natural-sort and assign zero-based indices
//! 3. [`dispatch`]  — fixed-size chunks run in parallel via `spawn_blocking`;
//!    each item goes through [`transform`], which reads headers via
//!    [`metadata`]
//! 4. [`aggregate`] — collect unordered chunk reports, restore index order
//! 5. [`compose`]   — sequential page writing; the only stage that touches
//!    the document

pub mod aggregate;
pub mod compose;
pub mod dispatch;
pub mod input;
pub mod metadata;
pub mod sequence;
pub mod transform;
