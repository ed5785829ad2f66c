//! Build engine for assetsmith
//!
//! Turns a source tree of scripts, style sheets and templates into an output
//! tree, either once or incrementally in response to watch events.
//!
//! # Overview
//!
//! The engine consists of:
//! - **Path mapping**: source file -> artifact path, glob helpers
//! - **Discovery**: find entry points, honouring ignore rules
//! - **Builders**: compile entries and react to watch events, with
//!   family-specific strategies for style indexes and template variables
//!
//! # Example
//!
//! ```ignore
//! use assetsmith::build::{AssetBuilder, Builder};
//! use assetsmith::config::{load_config, CliOverrides, Family};
//!
//! let doc = load_config(None)?;
//! let config = doc.family_config(Family::Style, &CliOverrides::default())?;
//! let mut builder = AssetBuilder::from_config(config, doc.project_root())?;
//!
//! let result = builder.build_all()?;
//! println!("{}", result.summary());
//! ```

pub mod builder;
pub mod context;
pub mod discovery;
pub mod output;
pub mod path;
pub mod result;
pub mod script;
pub mod style;
pub mod template;

pub use builder::*;
pub use context::*;
pub use discovery::*;
pub use result::*;
