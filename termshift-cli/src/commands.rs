use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{error, info, warn};

use termshift::loader::{
    load_catalog_from_file, load_changes_from_file, load_tree_from_file, write_changes_to_file,
    write_tree_to_file,
};
use termshift::{
    Applier, ApplyMode, KeyPath, MergeEngine, SourceKind, SubstitutionPlanner, TermCatalog, Tree,
};

use crate::config::ProjectConfig;

fn load_catalog(config: &ProjectConfig) -> Result<TermCatalog> {
    let path = config.dictionary_path();
    load_catalog_from_file(&path, config.business_type_codes())
        .with_context(|| format!("loading dictionary {}", path.display()))
}

pub fn catalog(config: &ProjectConfig) -> Result<()> {
    let catalog = load_catalog(config)?;

    println!("{} terms in {} categories", catalog.len(), catalog.categories().len());
    for (code, business_type) in &config.business_types {
        let missing = catalog.missing_replacements(code);
        println!(
            "  {} ({}): {} replacements",
            code,
            business_type.display_name,
            catalog.replacement_count(code)
        );
        if !missing.is_empty() {
            println!("    no replacement: {}", missing.join(", "));
        }
    }

    let inclusions = catalog.inclusions();
    if !inclusions.is_empty() {
        println!("overlapping phrases (longest wins):");
        for (outer, inner) in inclusions {
            println!("  {} ⊃ {}", outer, inner);
        }
    }
    Ok(())
}

pub fn scan(
    config: &ProjectConfig,
    language: Option<&str>,
    output: &Path,
    approve_all: bool,
    parallel: bool,
) -> Result<()> {
    let catalog = load_catalog(config)?;
    let (code, language) = config.language(language)?;
    let resource = config.resource_path(language);
    let tree = load_tree_from_file(&resource)
        .with_context(|| format!("loading resource {}", resource.display()))?;

    let entries = tree.entries(SourceKind::Json);
    let planner = SubstitutionPlanner::new(&catalog);
    let mut changes = if parallel {
        planner.plan_parallel(&entries, catalog.business_types())
    } else {
        planner.plan(&entries, catalog.business_types())
    };
    if approve_all {
        let approved = changes.approve_all_proposed();
        info!(approved, "approved proposals");
    }

    write_changes_to_file(output, &changes)
        .with_context(|| format!("writing plan {}", output.display()))?;

    println!(
        "{}: {} entries, {} change records -> {}",
        code,
        entries.len(),
        changes.len(),
        output.display()
    );
    for business_type in changes.business_types() {
        let records: Vec<_> = changes.for_business_type(business_type).collect();
        let detection_only = records.iter().filter(|r| r.is_detection_only()).count();
        println!(
            "  {}: {} records ({} without replacement)",
            business_type,
            records.len(),
            detection_only
        );
    }
    for (status, count) in changes.status_counts() {
        println!("  {}: {}", status, count);
    }
    Ok(())
}

pub fn apply(
    config: &ProjectConfig,
    plan: &Path,
    language: Option<&str>,
    mode: ApplyMode,
    only: &[String],
    output_dir: Option<&Path>,
) -> Result<()> {
    let (code, language) = config.language(language)?;
    let resource = config.resource_path(language);
    let tree = load_tree_from_file(&resource)
        .with_context(|| format!("loading resource {}", resource.display()))?;
    let changes =
        load_changes_from_file(plan).with_context(|| format!("loading plan {}", plan.display()))?;

    let business_types: Vec<&str> = if only.is_empty() {
        config.business_type_codes()
    } else {
        for requested in only {
            if !config.business_types.contains_key(requested) {
                bail!("business type '{}' is not declared in the config", requested);
            }
        }
        only.iter().map(String::as_str).collect()
    };

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => config.output_dir_for(language),
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let outputs = Applier::new(&tree).apply(&changes, &business_types, mode);
    let mut failed = Vec::new();
    for (business_type, result) in outputs {
        match result {
            Ok(output) => {
                let path = output_dir.join(config.output_file_name(language, &business_type)?);
                write_tree_to_file(&path, &output)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!(
                    "{} {}: {} leaves -> {}",
                    code,
                    business_type,
                    output.leaf_count(),
                    path.display()
                );
            }
            Err(err) => {
                error!(business_type = %business_type, "{}", err);
                failed.push(business_type);
            }
        }
    }

    if !failed.is_empty() {
        bail!("no output for: {} (re-run scan)", failed.join(", "));
    }
    Ok(())
}

pub fn merge(
    inputs: &[PathBuf],
    output: &Path,
    resolutions: Option<&Path>,
    nest: bool,
    json: bool,
) -> Result<()> {
    let mut engine = MergeEngine::new();
    for input in inputs {
        let tree = load_tree_from_file(input)
            .with_context(|| format!("loading {}", input.display()))?;
        let tree = if nest {
            let stem = input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .with_context(|| format!("{} has no usable file name", input.display()))?;
            tree.nest(stem)
        } else {
            tree
        };
        engine.add(&tree);
    }
    let outcome = engine.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.conflicts)?);
    } else {
        for conflict in &outcome.conflicts {
            let source = inputs
                .get(conflict.incoming_source_index)
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "conflict at {}: {} vs {} (from {})",
                conflict.key_path, conflict.existing, conflict.incoming, source
            );
        }
    }

    let resolutions = match resolutions {
        Some(path) => load_resolutions(path)?,
        None => Vec::new(),
    };
    if outcome.has_conflicts() && resolutions.is_empty() {
        warn!(conflicts = outcome.conflicts.len(), "merging without resolutions");
    }

    let tree: Tree = outcome
        .resolve(resolutions)
        .context("supply the missing values with --resolutions")?;
    write_tree_to_file(output, &tree).with_context(|| format!("writing {}", output.display()))?;
    if !json {
        println!("{} leaves -> {}", tree.leaf_count(), output.display());
    }
    Ok(())
}

/// Chosen values for conflicting paths, in one of two shapes:
/// `{"a.b": "value"}` with keys in display syntax, or
/// `[{"key_path": ["a", "b"], "value": "value"}]` for keys containing `.`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Resolutions {
    ByDisplayPath(BTreeMap<String, String>),
    BySegments(Vec<Resolution>),
}

#[derive(Debug, Deserialize)]
struct Resolution {
    key_path: KeyPath,
    value: String,
}

fn load_resolutions(path: &Path) -> Result<Vec<(KeyPath, String)>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_resolutions(&content).with_context(|| format!("parsing {}", path.display()))
}

fn parse_resolutions(content: &str) -> Result<Vec<(KeyPath, String)>> {
    let resolutions: Resolutions = serde_json::from_str(content).context(
        "expected an object of path to string, or a list of {\"key_path\", \"value\"} records",
    )?;
    match resolutions {
        Resolutions::ByDisplayPath(map) => map
            .into_iter()
            .map(|(key, value)| -> Result<(KeyPath, String)> {
                Ok((KeyPath::parse(&key)?, value))
            })
            .collect(),
        Resolutions::BySegments(records) => {
            for record in &records {
                if record.key_path.is_empty() {
                    bail!("resolution for '{}' has an empty key_path", record.value);
                }
            }
            Ok(records.into_iter().map(|r| (r.key_path, r.value)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolutions_by_display_path() {
        let parsed = parse_resolutions(r#"{"menu[1]": "簡介", "a.b": "x"}"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                (KeyPath::parse("a.b").unwrap(), "x".to_string()),
                (KeyPath::parse("menu[1]").unwrap(), "簡介".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_resolutions_by_segments() {
        let parsed =
            parse_resolutions(r#"[{"key_path": ["Save file.", "msgstr"], "value": "存檔"}]"#).unwrap();
        assert_eq!(
            parsed,
            vec![(
                KeyPath::from_segments(["Save file.", "msgstr"]),
                "存檔".to_string()
            )]
        );
    }

    #[test]
    fn test_parse_resolutions_rejects_bad_input() {
        assert!(parse_resolutions(r#"{"a": 3}"#).is_err());
        assert!(parse_resolutions(r#"{"a..b": "x"}"#).is_err());
        assert!(parse_resolutions(r#"[{"key_path": [], "value": "x"}]"#).is_err());
    }
}
