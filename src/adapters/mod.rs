//! Port implementations.
//!
//! `live` talks to Supabase, `OpenAI`, Replicate and Google Drive. `recording`
//! wraps live adapters and appends every call to a cassette; `replaying` serves
//! those calls back offline.

pub mod live;
pub mod recording;
pub mod replaying;
