use super::models::{CascadeDefinition, PlanDefinition, TapDefinition};
use crate::element::ElementKind;
use crate::error::{ServiceError, ServiceResult};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Element ids naming the head and tail sentinels in plan paths
pub const HEAD_KEYWORD: &str = "head";
pub const TAIL_KEYWORD: &str = "tail";

/// Parser for cascade and plan definition YAML files.
pub struct DefinitionParser;

impl DefinitionParser {
    /// Parse and validate a cascade from a file path.
    ///
    /// Relative paths in the definition resolve against the file's directory.
    pub fn cascade_from_file<P: AsRef<Path>>(path: P) -> ServiceResult<CascadeDefinition> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut definition = Self::parse_cascade(&content)?;
        definition.base_dir = path.parent().map(Path::to_path_buf);
        Ok(definition)
    }

    /// Parse and validate a cascade from a YAML string.
    pub fn parse_cascade(content: &str) -> ServiceResult<CascadeDefinition> {
        let definition: CascadeDefinition = serde_yaml::from_str(content)?;
        Self::validate_cascade(&definition)?;
        Ok(definition)
    }

    /// Validate a parsed cascade for semantic correctness.
    pub fn validate_cascade(definition: &CascadeDefinition) -> ServiceResult<()> {
        if definition.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Cascade name must not be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for flow in &definition.flows {
            if flow.name.trim().is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "Cascade '{}' has a flow without a name",
                    definition.name
                )));
            }

            if !names.insert(flow.name.as_str()) {
                return Err(ServiceError::DuplicateFlow(flow.name.clone()));
            }

            if flow.command.trim().is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "Flow '{}' has an empty command",
                    flow.name
                )));
            }

            for tap in flow.sources.iter().chain(flow.sinks.iter()) {
                let empty = match tap {
                    TapDefinition::Path(path) => path.as_os_str().is_empty(),
                    TapDefinition::Multi { multi } => {
                        multi.is_empty() || multi.iter().any(|p| p.as_os_str().is_empty())
                    }
                };
                if empty {
                    return Err(ServiceError::InvalidInput(format!(
                        "Flow '{}' has an empty tap path",
                        flow.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Parse and validate a plan from a file path.
    pub fn plan_from_file<P: AsRef<Path>>(path: P) -> ServiceResult<PlanDefinition> {
        let content = fs::read_to_string(path)?;
        Self::parse_plan(&content)
    }

    /// Parse and validate a plan from a YAML string.
    pub fn parse_plan(content: &str) -> ServiceResult<PlanDefinition> {
        let definition: PlanDefinition = serde_yaml::from_str(content)?;
        Self::validate_plan(&definition)?;
        Ok(definition)
    }

    /// Validate element ids and path references of a parsed plan.
    pub fn validate_plan(definition: &PlanDefinition) -> ServiceResult<()> {
        let mut known = HashSet::new();
        for element in &definition.elements {
            let id = element.id.as_str();
            if id == HEAD_KEYWORD || id == TAIL_KEYWORD {
                return Err(ServiceError::InvalidInput(format!(
                    "Element id '{}' is reserved for the sentinels",
                    id
                )));
            }
            if matches!(element.kind, ElementKind::Head | ElementKind::Tail) {
                return Err(ServiceError::InvalidInput(format!(
                    "Element '{}' cannot be declared as a sentinel",
                    id
                )));
            }
            if !known.insert(id) {
                return Err(ServiceError::InvalidInput(format!(
                    "Duplicate element id '{}'",
                    id
                )));
            }
        }

        let check_paths = |owner: &str, paths: &[Vec<crate::element::ElementId>]| {
            if paths.is_empty() || paths.iter().any(|path| path.is_empty()) {
                return Err(ServiceError::InvalidInput(format!(
                    "{} has an empty path",
                    owner
                )));
            }
            for id in paths.iter().flatten() {
                let id = id.as_str();
                if id != HEAD_KEYWORD && id != TAIL_KEYWORD && !known.contains(id) {
                    return Err(ServiceError::InvalidInput(format!(
                        "{} references unknown element '{}'",
                        owner, id
                    )));
                }
            }
            Ok(())
        };

        for (index, step) in definition.steps.iter().enumerate() {
            let owner = format!("Step {}", index + 1);
            check_paths(&owner, &step.paths)?;
            for (node_index, node) in step.nodes.iter().enumerate() {
                check_paths(&format!("{} node {}", owner, node_index + 1), &node.paths)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::models::SkipMode;
    use std::time::Duration;

    const NIGHTLY: &str = r#"
name: nightly
config:
  max_concurrent_flows: 2
  shutdown_grace_secs: 30
skip: sink-exists
env:
  LANG: C
flows:
  - name: clean
    command: tr a-z A-Z < raw.txt > clean.txt
    sources: [raw.txt]
    sinks: [clean.txt]
  - name: report
    command: cat clean.txt extra.txt > report.txt
    sources:
      - multi: [clean.txt, extra.txt]
    sinks: [report.txt]
"#;

    #[test]
    fn test_parse_cascade() {
        let definition = DefinitionParser::parse_cascade(NIGHTLY).unwrap();

        assert_eq!(definition.name, "nightly");
        assert_eq!(definition.config.max_concurrent_flows, Some(2));
        assert_eq!(definition.config.shutdown_grace, Duration::from_secs(30));
        assert_eq!(definition.skip, SkipMode::SinkExists);
        assert_eq!(definition.env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(definition.flows.len(), 2);
        assert!(matches!(
            &definition.flows[1].sources[0],
            TapDefinition::Multi { multi } if multi.len() == 2
        ));
        assert!(definition.base_dir.is_none());
    }

    #[test]
    fn test_cascade_defaults() {
        let definition = DefinitionParser::parse_cascade("name: empty\n").unwrap();

        assert!(definition.flows.is_empty());
        assert_eq!(definition.skip, SkipMode::SinkNotStale);
        assert_eq!(definition.config.max_concurrent_flows, None);
    }

    #[test]
    fn test_duplicate_flow_rejected() {
        let yaml = r#"
name: dup
flows:
  - { name: a, command: "true" }
  - { name: a, command: "false" }
"#;
        let err = DefinitionParser::parse_cascade(yaml).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateFlow(name) if name == "a"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let yaml = r#"
name: blank
flows:
  - { name: a, command: "  " }
"#;
        let err = DefinitionParser::parse_cascade(yaml).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = DefinitionParser::parse_cascade("name: [unclosed").unwrap_err();
        assert!(matches!(err, ServiceError::Parse(_)));
    }

    #[test]
    fn test_cascade_from_file_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.yml");
        std::fs::write(&path, NIGHTLY).unwrap();

        let definition = DefinitionParser::cascade_from_file(&path).unwrap();
        assert_eq!(definition.base_dir.as_deref(), Some(dir.path()));
    }

    const WORDCOUNT: &str = r#"
name: wordcount
elements:
  - { id: lines, name: lines, kind: tap }
  - { id: split, name: "Each(split)" }
  - { id: tmp, name: tmp, kind: boundary }
  - { id: count, name: "GroupBy(word)", kind: group }
  - { id: counts, name: counts, kind: tap }
steps:
  - paths: [[head, lines, split, tmp]]
  - paths: [[tmp, count, counts, tail]]
"#;

    #[test]
    fn test_parse_plan() {
        let plan = DefinitionParser::parse_plan(WORDCOUNT).unwrap();

        assert_eq!(plan.name, "wordcount");
        assert_eq!(plan.elements.len(), 5);
        assert_eq!(plan.elements[1].kind, ElementKind::Operation);
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].nodes.is_empty());
    }

    #[test]
    fn test_plan_unknown_element() {
        let yaml = r#"
name: broken
elements:
  - { id: a, name: a, kind: tap }
steps:
  - paths: [[head, a, b]]
"#;
        let err = DefinitionParser::parse_plan(yaml).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(msg) if msg.contains("'b'")));
    }

    #[test]
    fn test_plan_reserved_and_duplicate_ids() {
        let reserved = r#"
name: reserved
elements:
  - { id: head, name: head, kind: tap }
steps: []
"#;
        assert!(DefinitionParser::parse_plan(reserved).is_err());

        let duplicate = r#"
name: duplicate
elements:
  - { id: a, name: a, kind: tap }
  - { id: a, name: again, kind: tap }
steps: []
"#;
        assert!(DefinitionParser::parse_plan(duplicate).is_err());
    }
}
