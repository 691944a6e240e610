//! `chefsync master`: stage from the master server and distribute.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use chefsync_core::{ArtifactKind, ArtifactName, CookbookVersion, SyncConfig};
use chefsync_engine::{
    run_source, ReplicaTarget, RunOptions, RunRequest, RunStatus, SourceClient,
};
use chefsync_knife::{KnifeClient, RsyncReplica};

use super::output::{print_json, print_run_report};

#[derive(Subcommand, Debug)]
pub enum MasterCommand {
    /// Every configured kind, with cookbook history.
    All {
        /// Forget distribution history and stage every old version again.
        #[arg(long)]
        full_resync: bool,

        /// Emit the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Exact cookbook versions, given as `<name> <version>` pairs.
    Cookbook {
        #[arg(required = true, value_name = "NAME VERSION")]
        pairs: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Named environments.
    Environment(NamesArgs),

    /// Named roles.
    Role(NamesArgs),

    /// Named data bags.
    Databag(NamesArgs),
}

#[derive(Args, Debug)]
pub struct NamesArgs {
    #[arg(required = true)]
    pub names: Vec<String>,

    #[arg(long)]
    pub json: bool,
}

impl MasterCommand {
    fn into_request(self) -> Result<(RunRequest, RunOptions, bool)> {
        let named = |kind: ArtifactKind, args: NamesArgs| {
            (
                RunRequest::SyncKind {
                    kind,
                    names: args.names.into_iter().map(ArtifactName::from).collect(),
                },
                RunOptions::default(),
                args.json,
            )
        };

        Ok(match self {
            MasterCommand::All { full_resync, json } => {
                (RunRequest::SyncAll, RunOptions { full_resync }, json)
            }
            MasterCommand::Cookbook { pairs, json } => (
                RunRequest::SyncCookbookVersions(parse_pairs(&pairs)?),
                RunOptions::default(),
                json,
            ),
            MasterCommand::Environment(args) => named(ArtifactKind::Environment, args),
            MasterCommand::Role(args) => named(ArtifactKind::Role, args),
            MasterCommand::Databag(args) => named(ArtifactKind::DataBag, args),
        })
    }
}

pub async fn run(config: SyncConfig, command: MasterCommand) -> Result<RunStatus> {
    let (request, options, json) = command.into_request()?;
    let scope = request
        .scope()
        .context("replica requests cannot run in master mode")?;

    let config = Arc::new(config);
    let source: Arc<dyn SourceClient> = Arc::new(KnifeClient::new(
        &config.tools.knife,
        config.source.clone(),
    ));
    let replicas: Vec<Arc<dyn ReplicaTarget>> = config
        .replicas
        .iter()
        .map(|r| {
            Arc::new(RsyncReplica::new(r.clone(), config.tools.clone())) as Arc<dyn ReplicaTarget>
        })
        .collect();

    let report = run_source(Arc::clone(&config), source, &replicas, scope, options)
        .await
        .context("master run failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_run_report(&report);
    }
    Ok(report.status())
}

/// Pair up `<name> <version>` arguments.
fn parse_pairs(args: &[String]) -> Result<Vec<CookbookVersion>> {
    if args.len() % 2 != 0 {
        bail!(
            "cookbook arguments come in <name> <version> pairs; got {} value(s)",
            args.len()
        );
    }
    Ok(args
        .chunks(2)
        .map(|pair| CookbookVersion::new(pair[0].as_str(), pair[1].as_str()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pairs_are_read_in_order() {
        let pairs = parse_pairs(&strings(&["nginx", "1.9.0", "apache2", "8.0.1"])).unwrap();
        assert_eq!(
            pairs,
            vec![
                CookbookVersion::new("nginx", "1.9.0"),
                CookbookVersion::new("apache2", "8.0.1")
            ]
        );
    }

    #[test]
    fn odd_argument_count_is_rejected() {
        let err = parse_pairs(&strings(&["nginx", "1.9.0", "apache2"])).unwrap_err();
        assert!(err.to_string().contains("pairs"));
    }

    #[test]
    fn databag_command_maps_to_data_bag_kind() {
        let (request, _, json) = MasterCommand::Databag(NamesArgs {
            names: strings(&["users"]),
            json: true,
        })
        .into_request()
        .unwrap();
        assert!(json);
        assert_eq!(
            request,
            RunRequest::SyncKind {
                kind: ArtifactKind::DataBag,
                names: vec![ArtifactName::from("users")]
            }
        );
    }
}
