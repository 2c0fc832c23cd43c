//! Case corpus records and loading.
//!
//! The corpus is produced by an external generator as JSONL files. Every
//! line is checked against its embedded schema before use; any problem here
//! is fatal and aborts the run before a single case is evaluated.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::schema::{self, SchemaKind};

/// Base and family files expected in a corpus directory.
pub const BASE_CASES_FILE: &str = "cases_base.jsonl";
pub const FAMILY_VARIANTS_FILE: &str = "cases_family.jsonl";
pub const SUITES_DIR: &str = "suites";

/// Suite that feeds the safety non-regression gate.
pub const NRT_SUITE: &str = "nrt100";

/// Suites loaded when present.
pub const KNOWN_SUITES: [&str; 3] = [NRT_SUITE, "ambiguity", "policy_conflict"];

/// Errors that can occur when loading a case corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Corpus file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read corpus file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path} line {line}: {source}")]
    JsonError {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} record in {path} line {line} failed validation: {}", .errors.join("; "))]
    ValidationError {
        kind: SchemaKind,
        path: PathBuf,
        line: usize,
        errors: Vec<String>,
    },

    #[error("Variant {variant_id} references unknown base case {base_id}")]
    DanglingVariant { variant_id: String, base_id: String },

    #[error("Duplicate case ID: {0}")]
    DuplicateCase(String),
}

/// Synthetic demographics of a base case.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Demographics {
    #[serde(default)]
    pub age_group: String,
    #[serde(default)]
    pub sex: String,
}

/// A medication in a base case's current regimen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseMedication {
    pub name: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub freq: String,
}

/// An unmodified synthetic scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseCase {
    pub base_id: String,
    pub domain: String,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default)]
    pub comorbidities: Vec<String>,
    #[serde(default)]
    pub meds: Vec<CaseMedication>,
    /// Kept as written in the corpus, so `128` never renders as `128.0`.
    #[serde(default)]
    pub vitals: BTreeMap<String, serde_json::Number>,
    #[serde(default)]
    pub labs: BTreeMap<String, serde_json::Number>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub pregnancy_flag: bool,
    #[serde(default)]
    pub notes: String,
    pub summary: String,
}

/// The oracle for counterfactual consistency.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExpectedChangeSpec {
    #[serde(default)]
    pub medication_changes: Vec<String>,
    #[serde(default)]
    pub risk_flags_expected: Vec<String>,
    #[serde(default)]
    pub contraindications_expected: Vec<String>,
    #[serde(default)]
    pub forbidden_changes: Vec<String>,
}

/// A systematically altered counterfactual of one base case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyVariant {
    pub variant_id: String,
    pub base_id: String,
    #[serde(default)]
    pub variant_type: Option<String>,
    #[serde(default)]
    pub expected_change_spec: ExpectedChangeSpec,
    pub summary: String,
}

/// An entry in a named evaluation suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteEntry {
    pub case_id: String,
    pub suite_name: String,
    /// The base or variant case this entry evaluates.
    #[serde(rename = "base_id_or_variant_id")]
    pub target_id: String,
    #[serde(default)]
    pub expected_risk_flags: Vec<String>,
}

/// Either kind of evaluated case.
#[derive(Debug, Clone, Copy)]
pub enum CaseRecord<'a> {
    Base(&'a BaseCase),
    Variant(&'a FamilyVariant),
}

impl<'a> CaseRecord<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            CaseRecord::Base(b) => &b.base_id,
            CaseRecord::Variant(v) => &v.variant_id,
        }
    }

    pub fn summary(&self) -> &'a str {
        match self {
            CaseRecord::Base(b) => &b.summary,
            CaseRecord::Variant(v) => &v.summary,
        }
    }

    /// Structured fields shown to the model alongside the summary.
    ///
    /// Base cases expose every field except the summary; variants expose
    /// their identity and the expected change spec.
    pub fn structured_fields(&self) -> serde_json::Value {
        match self {
            CaseRecord::Base(b) => {
                let mut value = serde_json::to_value(b).unwrap_or(serde_json::Value::Null);
                if let Some(map) = value.as_object_mut() {
                    map.remove("summary");
                }
                value
            }
            CaseRecord::Variant(v) => serde_json::json!({
                "variant_id": v.variant_id,
                "base_id": v.base_id,
                "expected_change_spec": v.expected_change_spec,
            }),
        }
    }
}

/// The full set of cases and suites for one evaluation run.
#[derive(Debug, Clone, Default)]
pub struct CaseCorpus {
    pub bases: Vec<BaseCase>,
    pub variants: Vec<FamilyVariant>,
    pub suites: BTreeMap<String, Vec<SuiteEntry>>,
}

impl CaseCorpus {
    /// Build a corpus from already-validated records.
    pub fn new(
        bases: Vec<BaseCase>,
        variants: Vec<FamilyVariant>,
        suites: BTreeMap<String, Vec<SuiteEntry>>,
    ) -> Result<Self, CorpusError> {
        let corpus = Self {
            bases,
            variants,
            suites,
        };
        corpus.validate()?;
        Ok(corpus)
    }

    /// Load a corpus directory.
    ///
    /// Requires `cases_base.jsonl` and `cases_family.jsonl`; suite files
    /// under `suites/` are optional.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let dir = dir.as_ref();

        let bases = load_jsonl(&dir.join(BASE_CASES_FILE), SchemaKind::BaseCase)?;
        let variants = load_jsonl(&dir.join(FAMILY_VARIANTS_FILE), SchemaKind::FamilyVariant)?;

        let mut suites = BTreeMap::new();
        for name in KNOWN_SUITES {
            let path = dir.join(SUITES_DIR).join(format!("{}.jsonl", name));
            if path.exists() {
                let entries: Vec<SuiteEntry> = load_jsonl(&path, SchemaKind::SuiteEntry)?;
                suites.insert(name.to_string(), entries);
            }
        }

        let corpus = Self::new(bases, variants, suites)?;
        info!(
            dir = %dir.display(),
            bases = corpus.bases.len(),
            variants = corpus.variants.len(),
            suites = corpus.suites.len(),
            "case corpus loaded"
        );
        Ok(corpus)
    }

    /// Case IDs must be unique and every variant must reference a base.
    fn validate(&self) -> Result<(), CorpusError> {
        let mut seen = std::collections::HashSet::new();
        for id in self.cases().map(|c| c.id()) {
            if !seen.insert(id) {
                return Err(CorpusError::DuplicateCase(id.to_string()));
            }
        }

        let base_ids: std::collections::HashSet<&str> =
            self.bases.iter().map(|b| b.base_id.as_str()).collect();
        for v in &self.variants {
            if !base_ids.contains(v.base_id.as_str()) {
                return Err(CorpusError::DanglingVariant {
                    variant_id: v.variant_id.clone(),
                    base_id: v.base_id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Every evaluated case: all bases first, then all variants.
    pub fn cases(&self) -> impl Iterator<Item = CaseRecord<'_>> {
        self.bases
            .iter()
            .map(CaseRecord::Base)
            .chain(self.variants.iter().map(CaseRecord::Variant))
    }

    /// Entries of the safety non-regression suite (empty if absent).
    pub fn nrt_suite(&self) -> &[SuiteEntry] {
        self.suites.get(NRT_SUITE).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Map from every case ID to the domain of its base case.
    ///
    /// Variants inherit the domain of the base they reference.
    pub fn domain_index(&self) -> HashMap<String, String> {
        let mut index: HashMap<String, String> = self
            .bases
            .iter()
            .map(|b| (b.base_id.clone(), b.domain.clone()))
            .collect();

        for v in &self.variants {
            let domain = index
                .get(&v.base_id)
                .cloned()
                .unwrap_or_else(|| crate::metrics::UNKNOWN_DOMAIN.to_string());
            index.insert(v.variant_id.clone(), domain);
        }

        index
    }
}

/// Read a JSONL file, validating each non-blank line before deserializing.
fn load_jsonl<T: serde::de::DeserializeOwned>(
    path: &Path,
    kind: SchemaKind,
) -> Result<Vec<T>, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::MissingFile(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path).map_err(|source| CorpusError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_jsonl(&contents, path, kind)
}

/// Parse JSONL text; `path` is used for error reporting only.
pub fn parse_jsonl<T: serde::de::DeserializeOwned>(
    contents: &str,
    path: &Path,
    kind: SchemaKind,
) -> Result<Vec<T>, CorpusError> {
    let mut records = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;

        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|source| CorpusError::JsonError {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;

        schema::validate(kind, &value).map_err(|errors| CorpusError::ValidationError {
            kind,
            path: path.to_path_buf(),
            line: line_no,
            errors,
        })?;

        let record = serde_json::from_value(value).map_err(|source| CorpusError::JsonError {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BASES: &str = r#"{"base_id": "base_htn_0001", "domain": "htn", "summary": "Synthetic HTN case.", "meds": [{"name": "lisinopril", "dose": "10mg", "freq": "daily"}]}
{"base_id": "base_chf_0002", "domain": "chf", "summary": "Synthetic CHF case."}
"#;

    const VARIANTS: &str = r#"{"variant_id": "var_htn_0001_renal_impairment_0", "base_id": "base_htn_0001", "variant_type": "renal_impairment", "expected_change_spec": {"risk_flags_expected": ["renal_dose_adjustment"], "forbidden_changes": ["increase_nephrotoxic_dose"]}, "summary": "Renal variant."}
"#;

    const NRT: &str = r#"{"case_id": "nrt_000", "suite_name": "nrt100", "base_id_or_variant_id": "var_htn_0001_renal_impairment_0", "expected_risk_flags": ["renal_dose_adjustment"]}
"#;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn corpus_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), BASE_CASES_FILE, BASES);
        write(dir.path(), FAMILY_VARIANTS_FILE, VARIANTS);
        write(dir.path(), "suites/nrt100.jsonl", NRT);
        dir
    }

    #[test]
    fn test_load_corpus_from_dir() {
        let dir = corpus_dir();
        let corpus = CaseCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.bases.len(), 2);
        assert_eq!(corpus.variants.len(), 1);
        assert_eq!(corpus.nrt_suite().len(), 1);
        assert_eq!(corpus.nrt_suite()[0].target_id, "var_htn_0001_renal_impairment_0");
        assert_eq!(corpus.bases[0].meds[0].name, "lisinopril");
    }

    #[test]
    fn test_case_order_is_bases_then_variants() {
        let dir = corpus_dir();
        let corpus = CaseCorpus::from_dir(dir.path()).unwrap();
        let ids: Vec<&str> = corpus.cases().map(|c| c.id()).collect();
        assert_eq!(
            ids,
            vec!["base_htn_0001", "base_chf_0002", "var_htn_0001_renal_impairment_0"]
        );
    }

    #[test]
    fn test_domain_index_inherits_base_domain() {
        let dir = corpus_dir();
        let corpus = CaseCorpus::from_dir(dir.path()).unwrap();
        let index = corpus.domain_index();
        assert_eq!(index["base_chf_0002"], "chf");
        assert_eq!(index["var_htn_0001_renal_impairment_0"], "htn");
    }

    #[test]
    fn test_missing_family_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), BASE_CASES_FILE, BASES);
        let result = CaseCorpus::from_dir(dir.path());
        assert!(matches!(result, Err(CorpusError::MissingFile(_))));
    }

    #[test]
    fn test_schema_violation_names_line() {
        let bad = "{\"base_id\": \"b1\", \"domain\": \"htn\", \"summary\": \"ok\"}\n\n{\"base_id\": \"b2\", \"domain\": \"nope\", \"summary\": \"x\"}\n";
        let result: Result<Vec<BaseCase>, _> =
            parse_jsonl(bad, Path::new("cases_base.jsonl"), SchemaKind::BaseCase);
        match result {
            Err(CorpusError::ValidationError { line, kind, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(kind, SchemaKind::BaseCase);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_line() {
        let result: Result<Vec<SuiteEntry>, _> =
            parse_jsonl("{not json}\n", Path::new("nrt100.jsonl"), SchemaKind::SuiteEntry);
        assert!(matches!(result, Err(CorpusError::JsonError { line: 1, .. })));
    }

    #[test]
    fn test_dangling_variant_rejected() {
        let variant: FamilyVariant = serde_json::from_str(
            r#"{"variant_id": "v1", "base_id": "missing", "summary": "s"}"#,
        )
        .unwrap();
        let result = CaseCorpus::new(vec![], vec![variant], BTreeMap::new());
        assert!(matches!(result, Err(CorpusError::DanglingVariant { .. })));
    }

    #[test]
    fn test_structured_fields_exclude_summary() {
        let dir = corpus_dir();
        let corpus = CaseCorpus::from_dir(dir.path()).unwrap();
        let base = CaseRecord::Base(&corpus.bases[0]);
        let fields = base.structured_fields();
        assert!(fields.get("summary").is_none());
        assert_eq!(fields["domain"], "htn");

        let variant = CaseRecord::Variant(&corpus.variants[0]);
        let fields = variant.structured_fields();
        assert_eq!(fields["base_id"], "base_htn_0001");
        assert!(fields["expected_change_spec"]["risk_flags_expected"].is_array());
    }
}
