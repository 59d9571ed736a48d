//! Filter markup for the downstream retrieval service
//!
//! A compiled tree is rendered as nested elements inside one wrapper element.
//! The wrapper carries the filter name, the search scope and the match mode;
//! the repository list is mapped separately into a destination code.
//!
//! # Example
//!
//! ```text
//! <req:Expression name="filter" searchIn="HeadlineOnly" mode="Normal">
//!   <req:Or>
//!     <req:Organisation id="4295905573" label="Apple Inc"/>
//!     <req:Portfolio id="p-1" label="Tech">
//!       <req:Organisation id="4295907168" label="Microsoft Corp"/>
//!     </req:Portfolio>
//!   </req:Or>
//! </req:Expression>
//! ```
//!
//! Whitespace above is for reading only; the serializer emits none.

pub mod destination;
pub mod escape;
pub mod markup;

pub use destination::build_destination_value;
pub use escape::escape_attribute;
pub use markup::{FilterMode, FilterSerializer, SearchScope};

use crate::config::CompilerConfig;
use crate::error::Result;
use crate::token::Token;
use serde::Serialize;

/// Markup plus destination code, ready to embed in a request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterFragment {
    pub markup: String,
    pub destination: String,
    pub scope: SearchScope,
    pub mode: FilterMode,
}

/// Build both halves of a fragment from one configuration profile.
pub fn build_fragment<S: AsRef<str>>(
    config: &CompilerConfig,
    root: &Token,
    filter_name: &str,
    scope: SearchScope,
    mode: FilterMode,
    repositories: &[S],
) -> Result<FilterFragment> {
    let serializer = FilterSerializer::new(&config.markup, config.limits.tree())?;
    Ok(FilterFragment {
        markup: serializer.compile_filter(root, filter_name, scope, mode)?,
        destination: build_destination_value(repositories, &config.destinations)?,
        scope,
        mode,
    })
}
