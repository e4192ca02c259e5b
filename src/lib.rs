//! Profile rendering server.
//!
//! Renders a third-party profile page in a headless browser, rewrites the
//! resulting HTML so embedded resources load through a local proxy, strips
//! login interstitials on the client, and serves the result.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod render;
pub mod rewrite;
pub mod script;
pub mod server;
pub mod transform;
pub mod validation;

pub use proxy::{FetchError, FetchedResource, HttpFetcher, ResourceFetcher};
pub use render::{RenderError, RenderOptions, Renderer};
pub use rewrite::Proxifier;
pub use transform::{Pass, Pipeline};
