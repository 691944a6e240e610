//! KnifeClient against a stand-in `knife` shell script.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chefsync_core::{ArtifactKind, ArtifactName, ChefServer, CookbookVersion, VersionToken};
use chefsync_engine::{FetchRequest, LocalService, SourceClient, SourceError};
use chefsync_knife::KnifeClient;
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
case "$1 $2" in
  "cookbook list") printf 'apache2   8.0.1\nnginx     2.1.0\n' ;;
  "role list") printf 'base\nweb\n' ;;
  "cookbook show")
    if [ "$3" = "nginx" ]; then
      echo "nginx   2.1.0  2.0.0  1.9.0"
    else
      echo "ERROR: The object you are looking for could not be found" >&2
      echo "Response: 404 Not Found" >&2
      exit 100
    fi ;;
  "cookbook download")
    mkdir -p "$6/$3-$4/recipes"
    echo "$4" > "$6/$3-$4/metadata.rb" ;;
  "environment list")
    echo "ERROR: Connection refused" >&2
    exit 1 ;;
  *) echo "$@" >> "$(dirname "$0")/calls.log" ;;
esac
"#;

fn fake_knife(dir: &Path) -> PathBuf {
    let path = dir.join("knife");
    std::fs::write(&path, SCRIPT).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn client(bin: &Path) -> KnifeClient {
    KnifeClient::new(
        fake_knife(bin),
        ChefServer {
            url: "https://chef-master".to_string(),
            client: "admin".to_string(),
            key: PathBuf::from("/keys/master.pem"),
            knife_config: None,
        },
    )
}

#[tokio::test]
async fn lists_cookbooks_and_roles() {
    let bin = TempDir::new().unwrap();
    let knife = client(bin.path());

    let cookbooks = knife.list_artifacts(ArtifactKind::Cookbook).await.unwrap();
    assert!(cookbooks.contains(&ArtifactName::from("nginx")));
    assert_eq!(cookbooks.len(), 2);

    let roles = knife.list_artifacts(ArtifactKind::Role).await.unwrap();
    assert_eq!(roles.len(), 2);
}

#[tokio::test]
async fn failing_listing_is_unavailable() {
    let bin = TempDir::new().unwrap();
    let err = client(bin.path())
        .list_artifacts(ArtifactKind::Environment)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unavailable(_)));
}

#[tokio::test]
async fn unknown_cookbook_is_not_found_at_source_and_empty_locally() {
    let bin = TempDir::new().unwrap();
    let knife = client(bin.path());
    let ghost = ArtifactName::from("ghost");

    let err = SourceClient::list_versions(&knife, &ghost).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));

    let local = LocalService::list_versions(&knife, &ghost).await.unwrap();
    assert!(local.is_empty());
}

#[tokio::test]
async fn version_fetch_lands_under_the_cookbook_name() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    let knife = client(bin.path());
    let dest = ws.path().join("versions").join("2.0.0");

    knife
        .fetch(
            &FetchRequest::Version(CookbookVersion::new("nginx", "2.0.0")),
            &dest,
        )
        .await
        .unwrap();

    assert!(dest.join("nginx").join("metadata.rb").is_file());
    assert!(!dest.join("nginx-2.0.0").exists());

    let versions = SourceClient::list_versions(&knife, &ArtifactName::from("nginx"))
        .await
        .unwrap();
    assert_eq!(versions[1], VersionToken::from("2.0.0"));
}

#[tokio::test]
async fn uploads_pass_repo_and_version_paths() {
    let bin = TempDir::new().unwrap();
    let knife = client(bin.path());

    knife
        .upload_kind(ArtifactKind::Role, Path::new("/ws/repo"))
        .await
        .unwrap();
    knife
        .upload_version(
            &ArtifactName::from("nginx"),
            &VersionToken::from("2.0.0"),
            Path::new("/ws/versions/2.0.0"),
        )
        .await
        .unwrap();

    let calls = std::fs::read_to_string(bin.path().join("calls.log")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert!(calls[0].starts_with("upload /roles --chef-repo-path /ws/repo -s https://chef-master"));
    assert!(calls[1].starts_with("cookbook upload nginx -o /ws/versions/2.0.0"));
}
