use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use crate::{models::target::RewriteRule, services::planner::relative_key};

const DEFAULT_BUCKET: &str = "slide-drive-demo";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ENTRY_POINT: &str = "examples/demo.html";

/// Files and directories uploaded after the entry point when no list is given.
pub const DEFAULT_BULK_PATHS: [&str; 14] = [
    "js",
    "css",
    "examples/demo-audio.mp3",
    "examples/demo-external-page.html",
    "external/deckjs",
    "external/jquery",
    "external/mediaelement/build/mediaelement-and-player.js",
    "external/modernizr",
    "external/butter/src/butter.js",
    "external/butter/css/butter.ui.css",
    "external/butter/css/butter.ui.deprecated.css",
    "external/butter/external/popcorn-js/modules/player/popcorn.player.js",
    "external/butter/external/popcorn-js/popcorn.js",
    "external/butter/external/require",
];

/// Access key pair handed to the storage client.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Everything needed to build a storage client.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub credentials: Option<Credentials>,
    pub region: String,
    pub endpoint: Option<String>,
}

/// Centralized application configuration.
/// Combines CLI arguments, environment variables and an optional manifest.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub bucket: String,
    pub root: PathBuf,
    pub entry_point: String,
    pub entry_key: String,
    pub rewrite: RewriteRule,
    pub bulk_paths: Vec<String>,
    pub concurrency: usize,
    pub open_browser: bool,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
}

/// Command-line configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Publish a static site to an S3 bucket")]
pub struct Args {
    /// Bucket to publish into (overrides PUBLISHER_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region (overrides PUBLISHER_REGION / AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides PUBLISHER_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Directory all local paths and keys are relative to (overrides PUBLISHER_ROOT)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Entry-point HTML file, relative to the root
    #[arg(long)]
    pub entry_point: Option<String>,

    /// Remote key for the entry point (defaults to its local path)
    #[arg(long)]
    pub entry_key: Option<String>,

    /// Base URL to strip from the entry point
    #[arg(long)]
    pub placeholder: Option<String>,

    /// Text substituted for the placeholder
    #[arg(long)]
    pub replacement: Option<String>,

    /// File or directory to upload; repeat to replace the default list
    #[arg(long = "path")]
    pub paths: Vec<String>,

    /// TOML manifest with bucket, entry point and path list
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Maximum bulk uploads in flight (overrides PUBLISHER_CONCURRENCY)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Do not open the published entry point in a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Print what would be uploaded and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON report of published objects to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// On-disk manifest. Every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub root: Option<PathBuf>,
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub entry_point: EntryPointManifest,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct EntryPointManifest {
    pub path: Option<String>,
    pub key: Option<String>,
    pub placeholder: Option<String>,
    pub replacement: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing manifest {}", path.display()))
    }
}

impl AppConfig {
    /// Parse CLI args and the process environment into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        let manifest = match &args.manifest {
            Some(path) => Manifest::load(path)?,
            None => Manifest::default(),
        };
        Self::merge(args, manifest, |name| env::var(name).ok())
    }

    /// Merge sources with precedence CLI > environment > manifest > default.
    pub fn merge(
        args: Args,
        manifest: Manifest,
        env_var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let credentials = match (
            env_var("AWS_ACCESS_KEY_ID"),
            env_var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        };

        let env_concurrency = match env_var("PUBLISHER_CONCURRENCY") {
            Some(value) => Some(
                value
                    .parse::<usize>()
                    .with_context(|| format!("parsing PUBLISHER_CONCURRENCY value `{}`", value))?,
            ),
            None => None,
        };

        let region = args
            .region
            .or_else(|| env_var("PUBLISHER_REGION"))
            .or_else(|| env_var("AWS_REGION"))
            .or(manifest.region)
            .unwrap_or_else(|| DEFAULT_REGION.into());
        let endpoint = args
            .endpoint
            .or_else(|| env_var("PUBLISHER_ENDPOINT"))
            .or(manifest.endpoint);

        let entry = manifest.entry_point;
        let entry_point = args
            .entry_point
            .or(entry.path)
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.into());
        let entry_key = match args.entry_key.or(entry.key) {
            Some(key) => key,
            None => relative_key(Path::new(&entry_point))
                .with_context(|| format!("deriving a key for entry point `{}`", entry_point))?,
        };
        let defaults = RewriteRule::default();
        let rewrite = RewriteRule::new(
            args.placeholder
                .or(entry.placeholder)
                .unwrap_or(defaults.placeholder),
            args.replacement
                .or(entry.replacement)
                .unwrap_or(defaults.replacement),
        );

        let bulk_paths = if !args.paths.is_empty() {
            args.paths
        } else {
            manifest
                .paths
                .unwrap_or_else(|| DEFAULT_BULK_PATHS.iter().map(|p| p.to_string()).collect())
        };

        Ok(Self {
            storage: StorageSettings {
                credentials,
                region,
                endpoint,
            },
            bucket: args
                .bucket
                .or_else(|| env_var("PUBLISHER_BUCKET"))
                .or(manifest.bucket)
                .unwrap_or_else(|| DEFAULT_BUCKET.into()),
            root: args
                .root
                .or_else(|| env_var("PUBLISHER_ROOT").map(PathBuf::from))
                .or(manifest.root)
                .unwrap_or_else(|| PathBuf::from(".")),
            entry_point,
            entry_key,
            rewrite,
            bulk_paths,
            concurrency: args.concurrency.or(env_concurrency).unwrap_or(1).max(1),
            open_browser: !args.no_browser,
            dry_run: args.dry_run,
            report: args.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_reproduce_the_demo_deployment() {
        let cfg = AppConfig::merge(Args::default(), Manifest::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.bucket, "slide-drive-demo");
        assert_eq!(cfg.entry_point, "examples/demo.html");
        assert_eq!(cfg.entry_key, "examples/demo.html");
        assert_eq!(cfg.rewrite, RewriteRule::new("http://localhost:8888/", "/"));
        assert_eq!(cfg.bulk_paths.len(), DEFAULT_BULK_PATHS.len());
        assert_eq!(cfg.root, PathBuf::from("."));
        assert_eq!(cfg.concurrency, 1);
        assert!(cfg.open_browser);
        assert!(cfg.storage.credentials.is_none());
    }

    #[test]
    fn credentials_need_both_variables() {
        let only_id = env_of(&[("AWS_ACCESS_KEY_ID", "AKIA")]);
        let cfg = AppConfig::merge(Args::default(), Manifest::default(), only_id).unwrap();
        assert!(cfg.storage.credentials.is_none());

        let both = env_of(&[("AWS_ACCESS_KEY_ID", "AKIA"), ("AWS_SECRET_ACCESS_KEY", "s3cr3t")]);
        let cfg = AppConfig::merge(Args::default(), Manifest::default(), both).unwrap();
        let creds = cfg.storage.credentials.unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
        assert!(!format!("{:?}", creds).contains("s3cr3t"));
    }

    #[test]
    fn cli_beats_env_beats_manifest() {
        let manifest: Manifest = toml::from_str(
            r#"
            bucket = "from-manifest"
            region = "eu-west-1"
            endpoint = "http://manifest:9000"
            paths = ["css"]

            [entry_point]
            path = "index.html"
            placeholder = "http://dev.local/"
            "#,
        )
        .unwrap();
        let args = Args {
            bucket: Some("from-cli".into()),
            ..Args::default()
        };
        let env = env_of(&[
            ("PUBLISHER_BUCKET", "from-env"),
            ("PUBLISHER_REGION", "us-west-2"),
        ]);

        let cfg = AppConfig::merge(args, manifest, env).unwrap();

        assert_eq!(cfg.bucket, "from-cli");
        assert_eq!(cfg.storage.region, "us-west-2");
        assert_eq!(cfg.storage.endpoint.as_deref(), Some("http://manifest:9000"));
        assert_eq!(cfg.bulk_paths, ["css"]);
        assert_eq!(cfg.entry_point, "index.html");
        assert_eq!(cfg.entry_key, "index.html");
        assert_eq!(cfg.rewrite, RewriteRule::new("http://dev.local/", "/"));
    }

    #[test]
    fn cli_paths_replace_the_list() {
        let args = Args {
            paths: vec!["a.txt".into(), "dir/".into()],
            ..Args::default()
        };
        let cfg = AppConfig::merge(args, Manifest::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.bulk_paths, ["a.txt", "dir/"]);
    }

    #[test]
    fn default_entry_key_is_normalized() {
        let args = Args {
            entry_point: Some("./examples/demo.html".into()),
            ..Args::default()
        };
        let cfg = AppConfig::merge(args, Manifest::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.entry_point, "./examples/demo.html");
        assert_eq!(cfg.entry_key, "examples/demo.html");
    }

    #[test]
    fn explicit_entry_key_is_kept() {
        let args = Args {
            entry_point: Some("./examples/demo.html".into()),
            entry_key: Some("index.html".into()),
            ..Args::default()
        };
        let cfg = AppConfig::merge(args, Manifest::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.entry_key, "index.html");
    }

    #[test]
    fn bad_concurrency_is_an_error() {
        let env = env_of(&[("PUBLISHER_CONCURRENCY", "many")]);
        assert!(AppConfig::merge(Args::default(), Manifest::default(), env).is_err());
    }

    #[test]
    fn manifest_rejects_unknown_fields() {
        assert!(toml::from_str::<Manifest>("buckt = \"typo\"").is_err());
    }
}
