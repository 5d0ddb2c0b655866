use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;

use warden_rs::warden::appeal::AppealService;
use warden_rs::warden::audit::LogAudit;
use warden_rs::warden::clock::{Clock, SystemClock};
use warden_rs::warden::config::Config;
use warden_rs::warden::identity::StaticIdentity;
use warden_rs::warden::jobs;
use warden_rs::warden::notifier::LogNotifier;
use warden_rs::warden::policy::{PolicyFile, PolicyService};
use warden_rs::warden::provider::{HttpProvider, ProviderRegistry};
use warden_rs::warden::server::{serve, AppState};
use warden_rs::warden::store::{
    InMemoryAppealStore, InMemoryPolicyStore, InMemoryResourceStore, ResourceStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Path to the bootstrap config file
        #[arg(short, long, default_value = "warden.yaml")]
        config: String,
    },
    /// Validate a policy definition file
    Validate {
        /// Path to the policy YAML file
        #[arg(short, long)]
        file: String,
    },
    /// Revoke expired appeals once and exit
    Sweep {
        /// Path to the bootstrap config file
        #[arg(short, long, default_value = "warden.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { port, config } => {
            let state = bootstrap(&config).await?;
            serve(port, state).await?;
        }
        Commands::Validate { file } => {
            let definition = PolicyFile::load(&file)?;
            let clock = SystemClock;
            let policy = warden_rs::warden::domain::Policy {
                id: definition.id.clone(),
                version: 1,
                description: definition.description.clone(),
                steps: definition.steps.clone(),
                labels: definition.labels.clone(),
                created_at: clock.now(),
                updated_at: clock.now(),
            };
            policy.validate()?;
            println!("{} is valid ({} steps)", file, policy.steps.len());
        }
        Commands::Sweep { config } => {
            let state = bootstrap(&config).await?;
            let summary = jobs::revoke_expired_appeals(&state.appeals, &state.clock).await?;
            println!(
                "revoked {} appeal(s), {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            );
        }
    }

    Ok(())
}

async fn bootstrap(path: &str) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load(path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let policy_store = Arc::new(InMemoryPolicyStore::new());
    let policies = Arc::new(PolicyService::new(policy_store.clone(), clock.clone()));
    if let Some(dir) = &config.policies_dir {
        let loaded = policies.load_dir(dir).await?;
        log::info!("loaded {} policy file(s) from {}", loaded.len(), dir);
    }

    let resources = Arc::new(InMemoryResourceStore::new());
    for resource in config.resources {
        resources.upsert(resource).await?;
    }

    let identity = StaticIdentity::new();
    for (account_id, attributes) in config.identities {
        identity.insert(account_id, attributes).await;
    }

    let providers = ProviderRegistry::new();
    for p in config.providers {
        providers
            .register(Arc::new(HttpProvider::new(p.provider_type, &p.base_url)?))
            .await;
    }

    let appeals = Arc::new(AppealService::new(
        Arc::new(InMemoryAppealStore::new()),
        policy_store,
        resources,
        providers,
        Arc::new(identity),
        Arc::new(LogNotifier),
        Arc::new(LogAudit),
        clock.clone(),
        config.bindings,
    ));

    Ok(AppState {
        appeals,
        policies,
        clock,
    })
}
