use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::auth::Token;
use crate::config::Config;
use crate::flow::{FlowManager, FlowStatus, TokenOutcome};
use crate::output::{self, CreationSummary, FlowProgress};
use crate::providers::{sse, JenkinsClient, LocalEventBus};

#[derive(Parser)]
#[command(name = "orgflow")]
#[command(
    author,
    version,
    about = "Create Jenkins pipelines for GitHub organizations",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Jenkins root URL, overrides the configuration file
    #[arg(short, long, global = true, env = "JENKINS_URL")]
    url: Option<String>,

    /// GitHub personal access token, used when Jenkins has no credential yet
    #[arg(short, long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List GitHub organizations visible through the Jenkins credential
    Organizations,

    /// List repositories that can still be added to an organization folder
    Repositories {
        #[arg(short, long)]
        org: String,
    },

    /// Create or update an organization folder and wait for its first scan
    Create {
        #[arg(short, long)]
        org: String,

        #[arg(
            short,
            long,
            required_unless_present = "auto_discover",
            conflicts_with = "auto_discover"
        )]
        repo: Option<String>,

        /// Scan every repository in the organization
        #[arg(short, long, default_value_t = false)]
        auto_discover: bool,
    },

    /// Write a configuration file with the default settings
    Init {
        path: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        if let Commands::Init { path, force } = &self.command {
            return execute_init(path.as_deref(), *force);
        }

        let config = self.load_config()?;
        let token = self
            .token
            .as_deref()
            .or(config.github.token.as_deref())
            .map(Token::from)
            .filter(|token| !token.is_empty());

        let (mut flow, pump) = connect(&config)?;
        let progress = (!self.json).then(|| FlowProgress::follow(flow.subscribe()));

        let result = self.run(&mut flow, token.as_ref()).await;
        debug!(
            "Flow stopped at {} (pending: {:?}, {} organizations cached)",
            flow.current_step().title(),
            flow.pending_steps(),
            flow.cache().len()
        );

        if let Some(progress) = progress {
            progress.finish(flow.status());
        }
        if let Some(pump) = pump {
            pump.abort();
        }

        if let Some(rendered) = result? {
            println!("{rendered}");
        }
        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(url) = &self.url {
            config.jenkins.base_url.clone_from(url);
        }
        info!("Using Jenkins at {}", config.jenkins.base_url);
        Ok(config)
    }

    /// Runs the selected command and returns what should be printed to stdout.
    async fn run(&self, flow: &mut FlowManager, token: Option<&Token>) -> Result<Option<String>> {
        start(flow, token).await?;

        match &self.command {
            Commands::Organizations => {
                if self.json {
                    return self.render_json(flow.organizations()).map(Some);
                }
                Ok(Some(output::organizations_table(flow.organizations()).to_string()))
            }
            Commands::Repositories { org } => {
                select_organization(flow, org)?;
                flow.select_discover(false).await?;
                if flow.status() == FlowStatus::RepositoriesError {
                    bail!("Failed to load repositories for {org}");
                }

                let repositories = flow.selectable_repositories();
                debug!(
                    "{} of {} repositories in {org} can be added",
                    repositories.len(),
                    flow.repositories().len()
                );
                if self.json {
                    return self.render_json(&repositories).map(Some);
                }
                Ok(Some(output::repositories_table(&repositories).to_string()))
            }
            Commands::Create {
                org,
                repo,
                auto_discover,
            } => {
                self.execute_create(flow, org, repo.as_deref(), *auto_discover)
                    .await
            }
            Commands::Init { .. } => Ok(None),
        }
    }

    async fn execute_create(
        &self,
        flow: &mut FlowManager,
        org: &str,
        repo: Option<&str>,
        auto_discover: bool,
    ) -> Result<Option<String>> {
        select_organization(flow, org)?;
        flow.select_discover(auto_discover).await?;

        match flow.status() {
            FlowStatus::AlreadyDiscover => {
                info!("{org} already discovers every repository, nothing to save");
                return Ok(None);
            }
            FlowStatus::RepositoriesError => bail!("Failed to load repositories for {org}"),
            FlowStatus::ConfirmDiscover => flow.save_auto_discover().await?,
            _ => {
                let repo = repo.context("--repo is required without --auto-discover")?;
                flow.select_repository(repo)
                    .with_context(|| format!("{repo} cannot be added to {org}"))?;
                flow.save_single_repo().await?;
            }
        }

        if flow.status() == FlowStatus::SaveError {
            bail!("Failed to save the organization folder for {org}");
        }

        let status = flow.wait_for_completion().await;
        if status == FlowStatus::EventTimeout && !self.json {
            // The folder exists even though its first scan was not observed.
            if let Some(summary) = creation_summary(flow, org) {
                eprintln!("{summary}");
            }
        }
        if status.is_error() || !status.is_terminal() {
            bail!("{}", output::status_message(status));
        }

        if self.json {
            return match flow.saved_org_folder() {
                Some(folder) => self.render_json(folder).map(Some),
                None => Ok(None),
            };
        }
        Ok(creation_summary(flow, org))
    }

    fn render_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }
}

/// Builds the flow over a Jenkins client and, when configured, starts
/// streaming job events into its bus.
fn connect(config: &Config) -> Result<(FlowManager, Option<JoinHandle<()>>)> {
    let mut client = JenkinsClient::new(
        &config.jenkins.base_url,
        &config.jenkins.organization,
        &config.github.api_url,
    )?;
    if let (Some(username), Some(api_token)) = (&config.jenkins.username, &config.jenkins.api_token)
    {
        client = client.with_basic_auth(username.clone(), Token::from(api_token.as_str()));
    }

    info!("Using Blue Ocean API at {}", client.organization_url());
    let client = Arc::new(client);
    let bus = LocalEventBus::new();

    let pump = match config.jenkins.events_url.clone() {
        Some(url) => {
            let client = Arc::clone(&client);
            let bus = Arc::clone(&bus);
            Some(tokio::spawn(async move {
                if let Err(err) = sse::pump_events(&client, &url, &bus).await {
                    warn!("Job event stream stopped: {err}");
                }
            }))
        }
        None => None,
    };

    let flow = FlowManager::with_settings(
        client.clone(),
        client,
        bus,
        config.flow.settings(),
    );
    if pump.is_none() {
        warn!(
            "No events-url configured, a save will wait {:?} and then time out",
            flow.settings().completion_timeout
        );
    }
    Ok((flow, pump))
}

fn creation_summary(flow: &FlowManager, org: &str) -> Option<String> {
    let folder = flow.saved_org_folder()?;
    let repository = if flow.selected_auto_discover() {
        None
    } else {
        flow.selected_repository().map(|repo| repo.name.as_str())
    };
    let summary = CreationSummary {
        organization: flow
            .selected_organization()
            .map_or(org, |selected| selected.name.as_str()),
        folder,
        repository,
        credential_id: flow.credential().map(|c| c.credential_id.as_str()),
        steps: flow.steps(),
        completion: flow.completion_state(),
    };
    Some(output::render_creation_summary(&summary))
}

async fn start(flow: &mut FlowManager, token: Option<&Token>) -> Result<()> {
    flow.start().await;

    if flow.status() == FlowStatus::AccessTokenEntry {
        let Some(token) = token else {
            bail!("Jenkins has no GitHub credential yet, pass --token or set GITHUB_TOKEN");
        };
        if let TokenOutcome::Rejected { detail } = flow.create_access_token(token).await {
            bail!("GitHub access token was rejected: {detail}");
        }
    }

    if flow.status() == FlowStatus::OrganizationsError {
        bail!("Failed to load organizations");
    }
    Ok(())
}

fn select_organization(flow: &mut FlowManager, name: &str) -> Result<()> {
    let organization = flow
        .find_organization(name)
        .cloned()
        .with_context(|| format!("Organization {name} is not visible to the credential"))?;
    flow.select_organization(organization);
    Ok(())
}

fn execute_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::user_config_path().unwrap_or_else(|| PathBuf::from("orgflow.toml")),
    };

    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    Config::default().save(&path)?;
    eprintln!("{} {}", output::dim("Wrote"), output::cyan(path.display()));
    Ok(())
}
