pub mod diagnostics;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use serde::Deserializer;
use thiserror::Error;

pub use crate::diagnostics::DiagnosticSeverity;
pub use crate::diagnostics::DiagnosticsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Failed to read composer.json")]
    ComposerIo(#[from] std::io::Error),
    #[error("Failed to parse composer.json")]
    ComposerParse(#[from] serde_json::Error),
    #[error("Failed to convert extra.twls in composer.json")]
    ComposerSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Roots that plain template names are looked up under, relative to the
    /// project root.
    pub template_dirs: Vec<Utf8PathBuf>,
    /// `@Name/...` namespaces and the roots they map to.
    #[serde(deserialize_with = "one_or_many")]
    pub namespaces: BTreeMap<String, Vec<Utf8PathBuf>>,
    /// Template file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Gitignore-style patterns excluded from indexing.
    pub exclude: Vec<String>,
    pub log_file: Option<Utf8PathBuf>,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            template_dirs: vec![Utf8PathBuf::from("templates")],
            namespaces: BTreeMap::new(),
            extensions: vec!["twig".to_string()],
            exclude: Vec::new(),
            log_file: None,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Settings {
    pub fn new(project_root: &Path) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("org", "twls", "twls")
            .map(|proj_dirs| proj_dirs.config_dir().join("twls.toml"));

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    /// Whether `file_name` has one of the configured template extensions.
    #[must_use]
    pub fn is_template(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|extension| {
            file_name
                .strip_suffix(extension.as_str())
                .and_then(|stem| stem.strip_suffix('.'))
                .is_some_and(|stem| !stem.is_empty())
        })
    }

    fn load_from_paths(
        project_root: &Path,
        user_config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let composer_path = project_root.join("composer.json");
        if composer_path.exists() {
            let content = fs::read_to_string(&composer_path)?;
            let composer: serde_json::Value = serde_json::from_str(&content)?;

            if let Some(twls_table) = composer
                .pointer("/extra/twls")
                .and_then(serde_json::Value::as_object)
            {
                tracing::debug!(path = %composer_path.display(), "using extra.twls from composer.json");
                let twls_toml_string = toml::to_string(twls_table)?;
                builder = builder.add_source(File::from_str(&twls_toml_string, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            File::from(project_root.join(".twls.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        builder = builder.add_source(
            File::from(project_root.join("twls.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        let config = builder.build()?;
        let settings = config.try_deserialize()?;
        Ok(settings)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Utf8PathBuf),
    Many(Vec<Utf8PathBuf>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<Utf8PathBuf>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, OneOrMany>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(namespace, roots)| {
            let roots = match roots {
                OneOrMany::One(root) => vec![root],
                OneOrMany::Many(roots) => roots,
            };
            (namespace, roots)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn debug(debug: bool) -> Settings {
        Settings {
            debug,
            ..Settings::default()
        }
    }

    mod defaults {
        use super::*;

        #[test]
        fn test_load_no_files() {
            let dir = tempdir().unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.template_dirs, [Utf8PathBuf::from("templates")]);
            assert_eq!(settings.extensions, ["twig"]);
            assert!(settings.log_file.is_none());
        }

        #[test]
        fn test_is_template() {
            let settings = Settings {
                extensions: vec!["twig".to_string(), "html.twig".to_string()],
                ..Settings::default()
            };
            assert!(settings.is_template("base.twig"));
            assert!(settings.is_template("page.html.twig"));
            assert!(!settings.is_template("base.html"));
            assert!(!settings.is_template(".twig"));
            assert!(!settings.is_template("notatwig"));
        }
    }

    mod project_files {
        use super::*;

        #[test]
        fn test_load_twls_toml_only() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("twls.toml"), "debug = true").unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_load_dot_twls_toml_only() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join(".twls.toml"), "debug = true").unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_load_composer_json_only() {
            let dir = tempdir().unwrap();
            let content = r#"{
                "name": "acme/site",
                "extra": { "twls": { "debug": true, "template_dirs": ["views"] } }
            }"#;
            fs::write(dir.path().join("composer.json"), content).unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert!(settings.debug);
            assert_eq!(settings.template_dirs, [Utf8PathBuf::from("views")]);
        }

        #[test]
        fn test_composer_json_without_twls_section() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("composer.json"), r#"{"name": "acme/site"}"#).unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, Settings::default());
        }

        #[test]
        fn test_full_settings() {
            let dir = tempdir().unwrap();
            let content = r#"
                template_dirs = ["templates", "theme/templates"]
                extensions = ["twig", "html.twig"]
                exclude = ["node_modules/", "var/cache/"]
                log_file = "var/log/twls.log"

                [namespaces]
                admin = "admin/templates"
                shop = ["shop/templates", "vendor/shop/templates"]

                [diagnostics.severity]
                R100 = "hint"
                R101 = "off"
            "#;
            fs::write(dir.path().join("twls.toml"), content).unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();

            assert_eq!(settings.template_dirs.len(), 2);
            assert_eq!(settings.extensions, ["twig", "html.twig"]);
            assert_eq!(settings.exclude, ["node_modules/", "var/cache/"]);
            assert_eq!(settings.log_file, Some(Utf8PathBuf::from("var/log/twls.log")));
            assert_eq!(
                settings.namespaces.get("admin"),
                Some(&vec![Utf8PathBuf::from("admin/templates")])
            );
            assert_eq!(settings.namespaces.get("shop").map(Vec::len), Some(2));
            assert_eq!(
                settings.diagnostics.get_severity("R100"),
                Some(DiagnosticSeverity::Hint)
            );
            assert!(!settings.diagnostics.is_enabled("R101"));
        }
    }

    mod priority {
        use super::*;

        #[test]
        fn test_project_priority_twls_overrides_dot_twls() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join(".twls.toml"), "debug = false").unwrap();
            fs::write(dir.path().join("twls.toml"), "debug = true").unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_project_priority_dot_twls_overrides_composer() {
            let dir = tempdir().unwrap();
            let composer = r#"{"extra": {"twls": {"debug": false}}}"#;
            fs::write(dir.path().join("composer.json"), composer).unwrap();
            fs::write(dir.path().join(".twls.toml"), "debug = true").unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_project_priority_all_files_twls_wins() {
            let dir = tempdir().unwrap();
            let composer = r#"{"extra": {"twls": {"debug": false}}}"#;
            fs::write(dir.path().join("composer.json"), composer).unwrap();
            fs::write(dir.path().join(".twls.toml"), "debug = false").unwrap();
            fs::write(dir.path().join("twls.toml"), "debug = true").unwrap();
            let settings = Settings::load_from_paths(dir.path(), None).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_user_priority_project_overrides_user() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("twls.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();
            let composer = r#"{"extra": {"twls": {"debug": false}}}"#;
            fs::write(project_dir.path().join("composer.json"), composer).unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug(false));
        }

        #[test]
        fn test_user_keys_survive_project_overrides() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("twls.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();
            fs::write(
                project_dir.path().join("twls.toml"),
                r#"extensions = ["html.twig"]"#,
            )
            .unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert!(settings.debug);
            assert_eq!(settings.extensions, ["html.twig"]);
        }
    }

    mod user_config {
        use super::*;

        #[test]
        fn test_load_user_config_only() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("twls.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug(true));
        }

        #[test]
        fn test_no_user_config_file_present() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("twls.toml");
            fs::write(project_dir.path().join("twls.toml"), "debug = true").unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug(true));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn test_invalid_toml_content() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("twls.toml"), "debug = not_a_boolean").unwrap();
            let result = Settings::load_from_paths(dir.path(), None);
            assert!(matches!(result.unwrap_err(), ConfigError::Config(_)));
        }

        #[test]
        fn test_invalid_composer_json() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("composer.json"), "{ not json").unwrap();
            let result = Settings::load_from_paths(dir.path(), None);
            assert!(matches!(result.unwrap_err(), ConfigError::ComposerParse(_)));
        }

        #[test]
        fn test_unknown_severity() {
            let dir = tempdir().unwrap();
            let content = "[diagnostics.severity]\nR100 = \"loud\"\n";
            fs::write(dir.path().join("twls.toml"), content).unwrap();
            let result = Settings::load_from_paths(dir.path(), None);
            assert!(matches!(result.unwrap_err(), ConfigError::Config(_)));
        }
    }
}
