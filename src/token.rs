//! Token model shared by every pipeline stage.

mod entities;
mod raw;

pub use entities::{
    Category, MAX_DEPTH_CEILING, OperatorKind, Token, TokenKind, TreeLimits, TreeNode, TreeShape,
    measure,
};
pub use raw::{RawToken, decode_forest};
