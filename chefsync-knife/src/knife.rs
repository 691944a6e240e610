//! `knife` adapter: the source server client and the replica-local service.
//!
//! Every call appends the connection options of one Chef server
//! (`-s <url> -k <key> -u <client> [-c <config>]`). Downloads go through
//! `knife download` into a chef-repo layout, except historical cookbook
//! versions which use `knife cookbook download` and are renamed from
//! `<name>-<version>` to `<name>` so `knife cookbook upload -o` finds them.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use chefsync_core::{ArtifactKind, ArtifactName, ChefServer, CookbookVersion, VersionToken};
use chefsync_engine::{FetchRequest, LocalService, ReplicaError, SourceClient, SourceError};

use crate::command::Invocation;
use crate::error::{apply_err, io_err, ToolError};

/// Talks to one Chef server through the `knife` binary.
#[derive(Debug, Clone)]
pub struct KnifeClient {
    knife: PathBuf,
    server: ChefServer,
}

impl KnifeClient {
    pub fn new(knife: impl Into<PathBuf>, server: ChefServer) -> Self {
        Self {
            knife: knife.into(),
            server,
        }
    }

    pub fn server(&self) -> &ChefServer {
        &self.server
    }

    /// Connection options for this server.
    pub fn server_args(&self) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            self.server.url.clone(),
            "-k".to_string(),
            self.server.key.display().to_string(),
            "-u".to_string(),
            self.server.client.clone(),
        ];
        if let Some(config) = &self.server.knife_config {
            args.push("-c".to_string());
            args.push(config.display().to_string());
        }
        args
    }

    fn knife(&self) -> Invocation {
        Invocation::new(&self.knife)
    }

    // -----------------------------------------------------------------------
    // Command lines
    // -----------------------------------------------------------------------

    /// `knife <kind> list`
    pub fn list_command(&self, kind: ArtifactKind) -> Invocation {
        self.knife()
            .args(subcommand(kind).iter().copied())
            .arg("list")
            .args(self.server_args())
    }

    /// `knife cookbook show <name>`
    pub fn show_command(&self, cookbook: &ArtifactName) -> Invocation {
        self.knife()
            .args(["cookbook", "show"])
            .arg(cookbook.0.as_str())
            .args(self.server_args())
    }

    /// `knife download /<kind dir>/<item> --chef-repo-path <repo>`
    pub fn download_command(
        &self,
        kind: ArtifactKind,
        name: &ArtifactName,
        repo: &Path,
    ) -> Invocation {
        self.knife()
            .arg("download")
            .arg(remote_path(kind, name))
            .arg("--chef-repo-path")
            .arg(repo.display().to_string())
            .args(self.server_args())
    }

    /// `knife cookbook download <name> <version> -d <dir> --force`
    pub fn download_version_command(&self, cv: &CookbookVersion, dest: &Path) -> Invocation {
        self.knife()
            .args(["cookbook", "download"])
            .arg(cv.name.0.as_str())
            .arg(cv.version.0.as_str())
            .arg("-d")
            .arg(dest.display().to_string())
            .arg("--force")
            .args(self.server_args())
    }

    /// `knife upload /<kind dir> --chef-repo-path <repo>`
    pub fn upload_kind_command(&self, kind: ArtifactKind, repo: &Path) -> Invocation {
        self.knife()
            .arg("upload")
            .arg(format!("/{}", kind.repo_dir()))
            .arg("--chef-repo-path")
            .arg(repo.display().to_string())
            .args(self.server_args())
    }

    /// `knife cookbook upload <name> -o <dir>`
    pub fn upload_version_command(&self, cookbook: &ArtifactName, dir: &Path) -> Invocation {
        self.knife()
            .args(["cookbook", "upload"])
            .arg(cookbook.0.as_str())
            .arg("-o")
            .arg(dir.display().to_string())
            .args(self.server_args())
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    async fn show_versions(&self, cookbook: &ArtifactName) -> Result<Vec<VersionToken>, ToolError> {
        let stdout = self.show_command(cookbook).run().await?;
        Ok(parse_versions(cookbook, &stdout))
    }

    async fn download_version(&self, cv: &CookbookVersion, dest: &Path) -> Result<(), ToolError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| io_err(dest, e))?;
        self.download_version_command(cv, dest).run().await?;

        let downloaded = dest.join(format!("{}-{}", cv.name, cv.version));
        let target = dest.join(&cv.name.0);
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&target, err)),
        }
        tokio::fs::rename(&downloaded, &target)
            .await
            .map_err(|e| io_err(&downloaded, e))
    }
}

#[async_trait]
impl SourceClient for KnifeClient {
    async fn list_artifacts(&self, kind: ArtifactKind) -> Result<BTreeSet<ArtifactName>, SourceError> {
        let stdout = self.list_command(kind).run().await?;
        Ok(parse_list(&stdout))
    }

    async fn list_versions(&self, cookbook: &ArtifactName) -> Result<Vec<VersionToken>, SourceError> {
        Ok(self.show_versions(cookbook).await?)
    }

    async fn fetch(&self, request: &FetchRequest, dest: &Path) -> Result<(), SourceError> {
        match request {
            FetchRequest::Current { kind, name } => {
                self.download_command(*kind, name, dest).run().await?;
            }
            FetchRequest::Version(cv) => self.download_version(cv, dest).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl LocalService for KnifeClient {
    async fn upload_kind(&self, kind: ArtifactKind, repo_dir: &Path) -> Result<(), ReplicaError> {
        self.upload_kind_command(kind, repo_dir)
            .run()
            .await
            .map(|_| ())
            .map_err(apply_err)
    }

    async fn list_versions(&self, cookbook: &ArtifactName) -> Result<Vec<VersionToken>, ReplicaError> {
        match self.show_versions(cookbook).await {
            Ok(versions) => Ok(versions),
            // Never uploaded to this server yet.
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(apply_err(err)),
        }
    }

    async fn upload_version(
        &self,
        cookbook: &ArtifactName,
        _version: &VersionToken,
        cookbook_path: &Path,
    ) -> Result<(), ReplicaError> {
        self.upload_version_command(cookbook, cookbook_path)
            .run()
            .await
            .map(|_| ())
            .map_err(apply_err)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn subcommand(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        ArtifactKind::Cookbook => &["cookbook"],
        ArtifactKind::Environment => &["environment"],
        ArtifactKind::Role => &["role"],
        ArtifactKind::DataBag => &["data", "bag"],
    }
}

/// Server path of one item. Cookbooks and data bags are directories, the
/// other kinds single JSON documents.
pub fn remote_path(kind: ArtifactKind, name: &ArtifactName) -> String {
    match kind {
        ArtifactKind::Cookbook | ArtifactKind::DataBag => format!("/{}/{}", kind.repo_dir(), name),
        ArtifactKind::Environment | ArtifactKind::Role => {
            format!("/{}/{}.json", kind.repo_dir(), name)
        }
    }
}

/// Names from `knife <kind> list`. Cookbook listings carry the latest
/// version after the name; only the first column is kept.
pub fn parse_list(stdout: &str) -> BTreeSet<ArtifactName> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(ArtifactName::from)
        .collect()
}

/// Versions from `knife cookbook show <name>`, newest first as printed:
/// `nginx   2.1.0  2.0.0  1.9.0`.
pub fn parse_versions(cookbook: &ArtifactName, stdout: &str) -> Vec<VersionToken> {
    stdout
        .lines()
        .find_map(|line| {
            let mut columns = line.split_whitespace();
            (columns.next() == Some(cookbook.0.as_str())).then(|| {
                columns.map(VersionToken::from).collect::<Vec<_>>()
            })
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(knife_config: Option<&str>) -> KnifeClient {
        KnifeClient::new(
            "knife",
            ChefServer {
                url: "https://chef-master".to_string(),
                client: "admin".to_string(),
                key: PathBuf::from("/keys/master.pem"),
                knife_config: knife_config.map(PathBuf::from),
            },
        )
    }

    #[test]
    fn server_args_include_config_only_when_set() {
        assert_eq!(
            client(None).server_args(),
            vec!["-s", "https://chef-master", "-k", "/keys/master.pem", "-u", "admin"]
        );
        let args = client(Some("/knife/master.rb")).server_args();
        assert_eq!(&args[6..], &["-c", "/knife/master.rb"]);
    }

    #[test]
    fn data_bag_list_uses_two_word_subcommand() {
        let inv = client(None).list_command(ArtifactKind::DataBag);
        assert_eq!(&inv.args[..3], &["data", "bag", "list"]);
    }

    #[test]
    fn download_paths_by_kind() {
        let name = ArtifactName::from("prod");
        assert_eq!(remote_path(ArtifactKind::Environment, &name), "/environments/prod.json");
        assert_eq!(remote_path(ArtifactKind::DataBag, &name), "/data_bags/prod");
        assert_eq!(remote_path(ArtifactKind::Cookbook, &name), "/cookbooks/prod");
    }

    #[test]
    fn version_download_command_line() {
        let inv = client(None).download_version_command(
            &CookbookVersion::new("nginx", "2.0.0"),
            Path::new("/ws/versions/2.0.0"),
        );
        assert_eq!(
            inv.to_string(),
            "knife cookbook download nginx 2.0.0 -d /ws/versions/2.0.0 --force \
             -s https://chef-master -k /keys/master.pem -u admin"
        );
    }

    #[test]
    fn cookbook_list_keeps_first_column() {
        let names = parse_list("apache2   8.0.1\nnginx     2.1.0\n\n");
        let names: Vec<_> = names.into_iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["apache2", "nginx"]);
    }

    #[test]
    fn show_output_yields_versions_in_printed_order() {
        let nginx = ArtifactName::from("nginx");
        let versions = parse_versions(&nginx, "nginx   2.1.0  2.0.0  1.9.0\n");
        assert_eq!(
            versions,
            vec![
                VersionToken::from("2.1.0"),
                VersionToken::from("2.0.0"),
                VersionToken::from("1.9.0")
            ]
        );
        assert!(parse_versions(&nginx, "apache2 1.0\n").is_empty());
    }
}
