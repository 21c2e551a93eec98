use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use silo::err;
use silo::error::Result;
use silo::data::{Format, Schema, Sources, Toml};
use silo::enrich::Bucket;
use silo::generator::{DemoNiche, Options, Templates};
use silo::links::DEFAULT_BOUND;
use silo::output::Layout;
use silo::template::Mode;
use silo::url::UrlBuf;

#[derive(Debug)]
pub struct Config {
    /// The directory relative paths in `settings` were resolved against.
    pub root: PathBuf,
    pub settings: Settings,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: UrlBuf,
    pub output: PathBuf,
    pub localities: PathBuf,
    pub departments: PathBuf,
    pub niche: PathBuf,
    pub index_state: PathBuf,
    pub templates: TemplateSettings,
    pub page_prefix: String,
    pub clean_urls: bool,
    pub link_bound: usize,
    pub bucket: Bucket,
    pub strict: bool,
    pub jobs: Option<usize>,
    pub schema: SchemaSettings,
    pub niches: BTreeMap<String, NicheSettings>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub locality: Option<PathBuf>,
    pub department: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub demos: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// A built-in table, `v1` or `v2`. The default is `v1`.
    pub version: Option<String>,
    /// Extra sources per canonical field, consulted after the built-in ones.
    pub aliases: FxHashMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NicheSettings {
    pub domain: String,
    pub column: Option<String>,
    pub template: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: UrlBuf::from("https://agence-web-locale.fr"),
            output: "output".into(),
            localities: "villes.csv".into(),
            departments: "departements.json".into(),
            niche: "niche.json".into(),
            index_state: "indexing_state.json".into(),
            templates: TemplateSettings {
                locality: Some("templates/ville.html".into()),
                department: Some("templates/departement.html".into()),
                ..Default::default()
            },
            page_prefix: String::new(),
            clean_urls: true,
            link_bound: DEFAULT_BOUND,
            bucket: Bucket::default(),
            strict: true,
            jobs: None,
            schema: SchemaSettings::default(),
            niches: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Reads the configuration at `path`, or `silo.toml` in the working
    /// directory. Only an explicitly named file must exist.
    pub fn discover(path: Option<&Path>) -> Result<Config> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(crate::CONFIG_FILE), false),
        };

        let settings = match path.exists() {
            true => Toml::read(&path)?,
            false if required => return err!("configuration file not found", "path" => path.display()),
            false => {
                tracing::debug!(path = %path.display(), "no configuration file: using defaults");
                Settings::default()
            }
        };

        let root = path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        Ok(Config::new(root, settings))
    }

    /// Resolves the relative paths of `settings` against `root`.
    pub fn new(root: PathBuf, mut settings: Settings) -> Config {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };

        resolve(&mut settings.output);
        resolve(&mut settings.localities);
        resolve(&mut settings.departments);
        resolve(&mut settings.niche);
        resolve(&mut settings.index_state);

        let templates = &mut settings.templates;
        for path in [&mut templates.locality, &mut templates.department, &mut templates.home] {
            path.iter_mut().for_each(resolve);
        }

        templates.demos.values_mut().for_each(resolve);
        for niche in settings.niches.values_mut() {
            niche.template.iter_mut().for_each(resolve);
        }

        Config { root, settings }
    }

    pub fn sources(&self) -> Sources {
        Sources {
            localities: self.settings.localities.clone(),
            departments: self.settings.departments.clone(),
            niche: self.settings.niche.clone(),
        }
    }

    pub fn schema(&self) -> Result<Schema> {
        let base = match &self.settings.schema.version {
            Some(version) => match Schema::builtin(version) {
                Some(schema) => schema,
                None => return err!("unknown schema version", "version" => version, "expected" => "v1 or v2"),
            },
            None => Schema::standard(),
        };

        let mut extra: Vec<_> = self.settings.schema.aliases.iter().collect();
        extra.sort();
        Ok(base.with_aliases(extra.into_iter().map(|(k, v)| (k.as_str(), v.iter().map(|s| s.as_str())))))
    }

    pub fn options(&self) -> Options {
        let settings = &self.settings;
        Options {
            base_url: settings.base_url.clone(),
            layout: Layout { page_prefix: settings.page_prefix.clone(), clean_urls: settings.clean_urls },
            link_bound: settings.link_bound,
            bucket: settings.bucket,
            mode: Mode::from_strict(settings.strict),
            jobs: settings.jobs,
        }
    }

    /// Loads every configured template. Modes whose template is missing are
    /// skipped.
    pub fn templates(&self) -> Result<Templates> {
        let paths = &self.settings.templates;
        let mut templates = Templates {
            locality: Templates::load_optional("locality", paths.locality.as_deref())?,
            department: Templates::load_optional("department", paths.department.as_deref())?,
            home: Templates::load_optional("home", paths.home.as_deref())?,
            demos: vec![],
        };

        for (key, niche) in &self.settings.niches {
            if niche.domain.trim().is_empty() {
                return err!("demo niche has no domain", "niche" => key);
            }

            let path = niche.template.as_deref().or(paths.demos.get(key).map(|p| p.as_path()));
            let Some(template) = Templates::load_optional(&format!("demo:{key}"), path)? else {
                continue;
            };

            let demo = DemoNiche {
                key: key.clone(),
                domain: niche.domain.trim().to_string(),
                column: niche.column.clone().unwrap_or_else(|| key.clone()),
            };

            templates.demos.push((demo, template));
        }

        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Settings {
        Toml::from_str(toml).unwrap()
    }

    #[test]
    fn empty_files_are_valid() {
        let settings = parse("");
        assert_eq!(settings.link_bound, 12);
        assert!(settings.strict && settings.clean_urls);
        assert_eq!(settings.bucket, Bucket::Month);
    }

    #[test]
    fn paths_resolve_against_the_config_directory() {
        let settings = parse(r#"
            output = "public"
            localities = "/data/villes.json"
            bucket = "fortnight"

            [templates]
            locality = "t/ville.html"

            [niches.restaurant]
            domain = "sites-restaurants.fr"
            column = "resto"
            template = "t/resto.html"
        "#);

        let config = Config::new(PathBuf::from("site"), settings);
        assert_eq!(config.settings.output, Path::new("site/public"));
        assert_eq!(config.settings.localities, Path::new("/data/villes.json"));
        assert_eq!(config.settings.templates.locality.as_deref(), Some(Path::new("site/t/ville.html")));
        assert_eq!(config.settings.niches["restaurant"].template.as_deref(), Some(Path::new("site/t/resto.html")));
        assert_eq!(config.options().bucket, Bucket::Fortnight);
    }

    #[test]
    fn schema_aliases_extend_builtin_tables() {
        let settings = parse(r#"
            [schema]
            version = "v2"
            aliases = { ville = ["commune"], accroche_hero = ["Slogan"] }
        "#);

        let schema = Config::new(PathBuf::from("."), settings).schema().unwrap();
        let raw = [("commune", "Albi"), ("Slogan", "Vite")].into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let normalized = schema.normalize(&raw);
        assert_eq!(normalized["ville"], "Albi");
        assert_eq!(normalized["accroche_hero"], "Vite");

        let unknown = parse("schema.version = \"v9\"");
        assert!(Config::new(PathBuf::from("."), unknown).schema().is_err());
    }

    #[test]
    fn demo_templates_load_per_niche() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resto.html"), "{{demo_brand_name}}").unwrap();
        let settings = parse(r#"
            [templates]
            locality = "absent.html"
            demos = { restaurant = "resto.html" }

            [niches.restaurant]
            domain = "sites-restaurants.fr"

            [niches.sante]
            domain = "sites-sante.fr"
        "#);

        let templates = Config::new(dir.path().to_path_buf(), settings).templates().unwrap();
        assert!(templates.locality.is_none());
        assert_eq!(templates.demos.len(), 1);
        assert_eq!(templates.demos[0].0.column, "restaurant");
        assert_eq!(templates.demos[0].1.tokens(), ["demo_brand_name"]);
    }
}
