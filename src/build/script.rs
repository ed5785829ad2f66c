//! Script family: bundler glue only.
//!
//! Every non-entry script change falls through to a full rebuild, since import
//! resolution is left to the bundler.

use crate::build::builder::FamilyStrategy;

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptStrategy;

impl FamilyStrategy for ScriptStrategy {
    fn source_map_comment(&self, map_file_name: &str) -> Option<String> {
        Some(format!("//# sourceMappingURL={}", map_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_comment() {
        assert_eq!(
            ScriptStrategy.source_map_comment("app.js.map").as_deref(),
            Some("//# sourceMappingURL=app.js.map")
        );
    }
}
