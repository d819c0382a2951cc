//! Desired repository state loaded from YAML.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use regex::Regex;
use tracing::debug;

use super::ruleset::RulesetSpec;
use crate::error::{OrgError, Result};
use crate::issues::{form_code_block, form_field};
use crate::workspace::{Workspace, owning_directory_name};

/// Repository visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

impl Visibility {
    /// The API spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

impl FromStr for Visibility {
    type Err = OrgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "internal" => Ok(Visibility::Internal),
            other => Err(OrgError::InvalidConfig(format!(
                "unknown visibility '{}', expected public, private or internal",
                other
            ))),
        }
    }
}

/// Dependabot settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecuritySpec {
    #[serde(
        rename = "enableVulnerabilityAlerts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vulnerability_alerts: Option<bool>,
    #[serde(
        rename = "enableAutomatedSecurityFixes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub automated_security_fixes: Option<bool>,
}

/// Desired state of one repository. Unset fields are not managed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// `owner/name` of a template repository used on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_issues: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_projects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_wiki: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_squash_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_merge_commit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rebase_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_auto_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_branch_on_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_update_branch: Option<bool>,
    /// An empty list leaves topics unmanaged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rulesets: Vec<RulesetSpec>,
}

impl RepositorySpec {
    /// Reject a spec whose name differs from the directory it lives in.
    pub fn check_name(&self, directory: &str) -> Result<()> {
        if self.name != directory {
            return Err(OrgError::InvalidConfig(format!(
                "repository name '{}' does not match directory '{}'; renames are not allowed",
                self.name, directory
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct RepositoryFile<'a> {
    repository: &'a RepositorySpec,
}

/// Merge `overlay` into `base`.
///
/// Mappings merge key by key; a null in the overlay never replaces a value;
/// anything else replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Read the `repository:` section of a YAML file.
///
/// A missing file or section yields an empty mapping.
pub fn read_repository_section(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    let content = fs::read_to_string(path)?;
    let document: Value = serde_yaml::from_str(&content).map_err(|source| OrgError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    match document.get("repository") {
        None | Some(Value::Null) => Ok(Value::Mapping(Mapping::new())),
        Some(section @ Value::Mapping(_)) => Ok(section.clone()),
        Some(_) => Err(OrgError::InvalidConfig(format!(
            "{}: 'repository' must be a mapping",
            path.display()
        ))),
    }
}

/// Merge overrides over defaults and type the result.
pub fn effective_spec(defaults: &Value, overrides: Value, origin: &Path) -> Result<RepositorySpec> {
    let mut merged = defaults.clone();
    deep_merge(&mut merged, overrides);
    serde_yaml::from_value(merged).map_err(|source| OrgError::Yaml {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load the effective spec for `repositories/<name>/repository.yml`.
///
/// When the per-repository file does not exist the defaults alone apply.
pub fn load_effective(workspace: &Workspace, name: &str) -> Result<RepositorySpec> {
    let defaults = read_repository_section(&workspace.default_repository_file())?;
    let path = workspace.repository_file(name);
    let mut overrides = read_repository_section(&path)?;

    if let Value::Mapping(map) = &mut overrides {
        let key = Value::String("name".into());
        if !map.contains_key(&key) {
            map.insert(key, Value::String(name.to_string()));
        }
    }

    let spec = effective_spec(&defaults, overrides, &path)?;
    spec.check_name(name)?;
    debug!(repository = name, "loaded effective repository spec");
    Ok(spec)
}

/// Load the effective spec for a `repositories/<name>/repository.yml` path.
pub fn load_from_path(workspace: &Workspace, path: &Path) -> Result<RepositorySpec> {
    let name = owning_directory_name(path).ok_or_else(|| {
        OrgError::InvalidConfig(format!("cannot infer repository name from {}", path.display()))
    })?;

    let defaults = read_repository_section(&workspace.default_repository_file())?;
    let overrides = read_repository_section(path)?;
    if overrides.get("name").is_none() {
        return Err(OrgError::InvalidConfig(format!(
            "{}: repository.name is required",
            path.display()
        )));
    }
    let spec = effective_spec(&defaults, overrides, path)?;
    spec.check_name(&name)?;
    Ok(spec)
}

/// Parameters of a repository creation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRepositoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub template: Option<String>,
    /// Further `repository:` settings; the fields above take precedence.
    pub settings: Mapping,
}

/// Check a name against the characters GitHub allows in repository names.
pub fn validate_repository_name(name: &str) -> Result<()> {
    let allowed = Regex::new(r"^[A-Za-z0-9._-]{1,100}$")?;
    if !allowed.is_match(name) || name == "." || name == ".." {
        return Err(OrgError::InvalidConfig(format!(
            "invalid repository name '{}': use up to 100 letters, digits, '.', '-' or '_'",
            name
        )));
    }
    Ok(())
}

/// Check a branch name against git's reference name rules.
pub fn validate_branch_name(branch: &str) -> Result<()> {
    let invalid = branch.is_empty()
        || branch == "@"
        || branch.starts_with(['/', '-', '.'])
        || branch.ends_with(['/', '.'])
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("//")
        || branch.contains("@{")
        || branch.contains("/.")
        || branch
            .chars()
            .any(|c| c.is_control() || " ~^:?*[\\".contains(c));
    if invalid {
        return Err(OrgError::InvalidConfig(format!(
            "invalid default branch '{}'",
            branch
        )));
    }
    Ok(())
}

/// Parse a repository request from a `/create_repo` issue form.
///
/// Reads the `Repository Name`, `Description`, `Visibility` and `Template`
/// fields, plus repository settings from the YAML block of the
/// `Configuration` section.
pub fn parse_repository_request(body: &str) -> Result<NewRepositoryRequest> {
    let name = form_field(body, "Repository Name")?.ok_or_else(|| {
        OrgError::InvalidConfig("repository request has no Repository Name".into())
    })?;
    validate_repository_name(&name)?;

    let visibility = form_field(body, "Visibility")?
        .map(|v| v.parse::<Visibility>())
        .transpose()?;

    let settings = match form_code_block(body, "Configuration") {
        None => Mapping::new(),
        Some(block) => {
            let document: Value = serde_yaml::from_str(&block).map_err(|e| {
                OrgError::InvalidConfig(format!("repository request configuration: {}", e))
            })?;
            match document.get("repository").unwrap_or(&document) {
                Value::Null => Mapping::new(),
                Value::Mapping(map) => map.clone(),
                _ => {
                    return Err(OrgError::InvalidConfig(
                        "repository request configuration must be a mapping".into(),
                    ));
                }
            }
        }
    };

    Ok(NewRepositoryRequest {
        name,
        description: form_field(body, "Description")?,
        visibility,
        template: form_field(body, "Template")?,
        settings,
    })
}

/// The desired spec of a repository that does not exist yet: the defaults
/// with the request's fields laid over them.
pub fn spec_for_new(workspace: &Workspace, request: &NewRepositoryRequest) -> Result<RepositorySpec> {
    validate_repository_name(&request.name)?;
    let defaults = read_repository_section(&workspace.default_repository_file())?;

    let mut overrides = request.settings.clone();
    overrides.insert("name".into(), request.name.clone().into());
    if let Some(description) = &request.description {
        overrides.insert("description".into(), description.clone().into());
    }
    if let Some(visibility) = request.visibility {
        overrides.insert("visibility".into(), visibility.as_str().into());
    }
    if let Some(template) = &request.template {
        overrides.insert("template".into(), template.clone().into());
    }

    let spec = effective_spec(
        &defaults,
        Value::Mapping(overrides),
        &workspace.default_repository_file(),
    )?;
    if let Some(branch) = &spec.default_branch {
        validate_branch_name(branch)?;
    }
    Ok(spec)
}

/// Write `repositories/<name>/repository.yml` for a spec.
pub fn write_repository_file(workspace: &Workspace, spec: &RepositorySpec) -> Result<PathBuf> {
    let path = workspace.repository_file(&spec.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(&RepositoryFile { repository: spec }).map_err(|source| {
        OrgError::Yaml {
            path: path.clone(),
            source,
        }
    })?;
    fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_deep_merge_recurses_and_ignores_null() {
        let mut base = yaml("a: 1\nnested:\n  x: true\n  y: false\nlist: [1, 2]\n");
        deep_merge(
            &mut base,
            yaml("a: ~\nnested:\n  y: true\nlist: [3]\nextra: hi\n"),
        );
        assert_eq!(
            base,
            yaml("a: 1\nnested:\n  x: true\n  y: true\nlist: [3]\nextra: hi\n")
        );
    }

    #[test]
    fn test_security_uses_camel_case_keys() {
        let spec: RepositorySpec = serde_yaml::from_str(
            "name: api\nsecurity:\n  enableVulnerabilityAlerts: true\n",
        )
        .unwrap();
        let security = spec.security.unwrap();
        assert_eq!(security.vulnerability_alerts, Some(true));
        assert_eq!(security.automated_security_fixes, None);
    }

    #[test]
    fn test_unknown_keys_are_tolerated() {
        let spec: RepositorySpec =
            serde_yaml::from_str("name: api\nowner_team: payments\n").unwrap();
        assert_eq!(spec.name, "api");
    }

    #[test]
    fn test_load_effective_merges_defaults() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        fs::write(
            ws.default_repository_file(),
            "repository:\n  has_wiki: false\n  visibility: private\n  security:\n    enableVulnerabilityAlerts: true\n",
        )
        .unwrap();
        fs::create_dir_all(ws.repository_file("api").parent().unwrap()).unwrap();
        fs::write(
            ws.repository_file("api"),
            "repository:\n  name: api\n  visibility: internal\n  topics: [rust]\n",
        )
        .unwrap();

        let spec = load_effective(&ws, "api").unwrap();
        assert_eq!(spec.visibility, Some(Visibility::Internal));
        assert_eq!(spec.has_wiki, Some(false));
        assert_eq!(spec.topics, vec!["rust"]);
        assert_eq!(spec.security.unwrap().vulnerability_alerts, Some(true));
    }

    #[test]
    fn test_defaults_alone_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        fs::write(ws.default_repository_file(), "repository:\n  has_issues: true\n").unwrap();

        let spec = load_effective(&ws, "web").unwrap();
        assert_eq!(spec.name, "web");
        assert_eq!(spec.has_issues, Some(true));
    }

    #[test]
    fn test_name_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let path = ws.repository_file("api");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "repository:\n  name: renamed\n").unwrap();

        let err = load_from_path(&ws, &path).unwrap_err();
        assert!(matches!(err, OrgError::InvalidConfig(_)));
    }

    #[test]
    fn test_type_mismatch_names_the_file() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let path = ws.repository_file("api");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "repository:\n  name: api\n  has_wiki: sometimes\n").unwrap();

        match load_from_path(&ws, &path).unwrap_err() {
            OrgError::Yaml { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spec_for_new_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        fs::write(
            ws.default_repository_file(),
            "repository:\n  name: placeholder\n  visibility: private\n  has_wiki: false\n",
        )
        .unwrap();

        let spec = spec_for_new(
            &ws,
            &NewRepositoryRequest {
                name: "billing".into(),
                visibility: Some(Visibility::Internal),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(spec.name, "billing");
        assert_eq!(spec.visibility, Some(Visibility::Internal));
        assert_eq!(spec.has_wiki, Some(false));
    }

    const FILLED_FORM: &str = "### Repository Name\nEnter repository name:\n\nbilling-api\n\n### Description\nEnter repository description:\n\nBilling HTTP API\n\n### Visibility\nSelect visibility:\n- [ ] private\n- [x] internal\n\n### Template\nTemplate repository (owner/name), if any:\n\n### Configuration\n```yaml\nrepository:\n  description: ignored in favour of the field\n  has_wiki: false\n  default_branch: trunk\n```\n";

    #[test]
    fn test_parse_filled_repository_form() {
        let request = parse_repository_request(FILLED_FORM).unwrap();
        assert_eq!(request.name, "billing-api");
        assert_eq!(request.description.as_deref(), Some("Billing HTTP API"));
        assert_eq!(request.visibility, Some(Visibility::Internal));
        assert_eq!(request.template, None);
        assert_eq!(request.settings.get("has_wiki"), Some(&Value::Bool(false)));
        assert_eq!(
            request.settings.get("default_branch"),
            Some(&Value::String("trunk".into()))
        );
    }

    #[test]
    fn test_form_fields_take_precedence_over_configuration() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let request = parse_repository_request(FILLED_FORM).unwrap();
        let spec = spec_for_new(&ws, &request).unwrap();
        assert_eq!(spec.description.as_deref(), Some("Billing HTTP API"));
        assert_eq!(spec.default_branch.as_deref(), Some("trunk"));
        assert_eq!(spec.has_wiki, Some(false));
    }

    #[test]
    fn test_unfilled_form_is_rejected() {
        let blank = "### Repository Name\nEnter repository name:\n\n### Visibility\n- [ ] private\n";
        assert!(matches!(
            parse_repository_request(blank),
            Err(OrgError::InvalidConfig(_))
        ));
        assert!(parse_repository_request("Repository Name: bad name!\n").is_err());
    }

    #[test]
    fn test_repository_name_rules() {
        assert!(validate_repository_name("payments-api.v2_x").is_ok());
        let long = "a".repeat(101);
        for bad in ["", ".", "..", "has space", "slash/name", long.as_str()] {
            assert!(validate_repository_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_branch_name_rules() {
        for good in ["main", "release/1.2", "feature/new-api"] {
            assert!(validate_branch_name(good).is_ok(), "{good}");
        }
        for bad in [
            "", "-main", "/main", "main/", "a..b", "a//b", "x.lock", "a b", "a~1", "a:b",
            "a@{1}", "dir/.hidden", "@",
        ] {
            assert!(validate_branch_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_invalid_default_branch_in_settings_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let mut settings = Mapping::new();
        settings.insert("default_branch".into(), "bad..branch".into());
        let request = NewRepositoryRequest {
            name: "billing".into(),
            settings,
            ..Default::default()
        };
        assert!(matches!(
            spec_for_new(&ws, &request),
            Err(OrgError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_write_repository_file() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let spec = RepositorySpec {
            name: "api".into(),
            has_wiki: Some(false),
            ..Default::default()
        };
        let path = write_repository_file(&ws, &spec).unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("repository:\n"));
        assert_eq!(load_effective(&ws, "api").unwrap(), spec);
    }
}
