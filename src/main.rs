mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Datelike;
use clap::Parser;
use comfy_table::Table;
use pa_auth::{
    Authenticator, CredentialResolver, KeyringSecretStore, MonidenumAuthenticator,
    MonidenumConfig, SecretStore, SessionCache, TerminalPrompter, UrssafAuthenticator,
    UrssafConfig,
};
use pa_docs::{Company, KbisClient, ScheduleClient, ScheduleSummary, find_company, save_document};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Action, Cli, Command, KbisArgs, UrssafArgs};

/// Keyring namespace prefix
const APP: &str = "paperasse";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store: Arc<dyn SecretStore> = Arc::new(KeyringSecretStore::new(APP));
    let credentials = CredentialResolver::new(store.clone(), Arc::new(TerminalPrompter));

    match cli.command {
        Command::Urssaf(args) => run_urssaf(args, &credentials).await,
        Command::Kbis(args) => run_kbis(args, &credentials, &SessionCache::new(store)).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_urssaf(args: UrssafArgs, credentials: &CredentialResolver) -> anyhow::Result<()> {
    if let Some(Action::Logout) = args.action {
        credentials.delete(UrssafAuthenticator::SERVICE).await?;
        println!("Identifiants URSSAF supprimés.");
        return Ok(());
    }

    let year = args.year.unwrap_or_else(|| chrono::Local::now().year());
    let auth = UrssafAuthenticator::new(UrssafConfig::production()?)?;
    let session = auth
        .login(credentials)
        .await
        .context("Connexion à l'URSSAF impossible")?;

    let entries = ScheduleClient::from_authenticator(&auth)?
        .fetch(&session, year)
        .await
        .with_context(|| format!("Échéancier {year} indisponible"))?;
    debug!(count = entries.len(), "Schedule fetched");

    let mut table = Table::new();
    table.set_header(vec!["Exigibilité", "Montant", "Payé", "Reste", "État"]);
    for entry in &entries {
        table.add_row(vec![
            entry.exigibilite.date_exigibilite.format("%d/%m/%Y").to_string(),
            euros(entry.montant_total),
            euros(entry.montant_paye()),
            euros(entry.montant_non_paye),
            entry.etat_echeance.clone().unwrap_or_default(),
        ]);
    }

    let summary = ScheduleSummary::from_entries(&entries);
    table.add_row(vec![
        format!("Total ({})", summary.count),
        euros(summary.montant_total),
        euros(summary.montant_paye),
        euros(summary.montant_non_paye),
        String::new(),
    ]);

    println!("Échéancier {year} - SIRET {}", session.account.siret);
    println!("{table}");
    Ok(())
}

async fn run_kbis(
    args: KbisArgs,
    credentials: &CredentialResolver,
    cache: &SessionCache,
) -> anyhow::Result<()> {
    let mut config = MonidenumConfig::production()?;
    config.session_ttl = args
        .session_ttl()
        .with_context(|| format!("Durée de session invalide : {} minutes", args.session_ttl))?;
    config.max_redirect_hops = args.max_hops;
    let auth = MonidenumAuthenticator::new(config)?;

    if let Some(Action::Logout) = args.action {
        auth.logout(credentials, cache).await?;
        println!("Identifiants et session monidenum supprimés.");
        return Ok(());
    }

    let session = auth
        .login(credentials, cache)
        .await
        .context("Connexion à monidenum impossible")?;

    let client = KbisClient::from_authenticator(&auth);
    let companies = client
        .list_companies(&session)
        .await
        .context("Liste des entreprises indisponible")?;

    let company = match (args.company.as_deref(), companies.as_slice()) {
        (Some(query), _) => match find_company(&companies, query) {
            Some(company) => company,
            None => {
                print_companies(&companies);
                bail!("Aucune entreprise ne correspond à « {query} »");
            }
        },
        (None, [only]) => only,
        (None, []) => bail!("Aucune entreprise rattachée à ce compte"),
        (None, _) => {
            print_companies(&companies);
            bail!("Plusieurs entreprises : précisez l'identifiant ou le SIREN");
        }
    };

    let bytes = client
        .fetch_document(&session, company)
        .await
        .with_context(|| format!("KBIS de {} indisponible", company.name))?;

    let dir = args.out.unwrap_or_else(default_output_dir);
    let path = save_document(&dir, company, &bytes).await?;
    println!("KBIS enregistré : {}", path.display());
    Ok(())
}

fn print_companies(companies: &[Company]) {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Raison sociale", "SIREN", "Forme"]);
    for company in companies {
        table.add_row(vec![
            company.id.as_str(),
            company.name.as_str(),
            company.identifier.as_str(),
            company.legal_form.as_str(),
        ]);
    }
    println!("{table}");
}

fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn euros(amount: f64) -> String {
    format!("{amount:.2} €")
}
