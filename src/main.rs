use std::process;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};

use casewatch::api::{ApiClient, ApiError, CaseAction, CaseActions, VisitSource};
use casewatch::config::{ClientConfig, ConfigError};
use casewatch::models::{CaseStatus, GeoPoint, NewVisit};
use casewatch::session::{FileSessionStore, SessionContext, SessionError, UserProfile};
use casewatch::tracking::display::{format_datetime, format_long, next_morning, stage_timestamp};
use casewatch::tracking::poller::{self, EtaCallback};
use casewatch::tracking::{
    filter_cases, filter_visits, load_case_progress, CaseBoard, CaseProgress, PollOptions, PollPolicy,
    PollState, Stage, StraightLineEstimator, VisitBoard, VisitFilter,
};

/// Follow emergency visits and cases on the operations backend.
#[derive(Parser)]
#[command(name = "casewatch", version, about = "Follow emergency visits and cases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session token issued by the backend
    Login {
        #[arg(long)]
        token: String,
        /// User code
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<i64>,
        #[arg(long)]
        division: Option<i64>,
    },

    /// Forget the stored session
    Logout,

    /// Poll a visit until it is finished
    Watch {
        visit_id: i64,
    },

    /// Show the progress stepper and reopen history of a case
    Case {
        case_id: String,
    },

    /// Close a case
    Close {
        case_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Reopen a finished or closed case
    Reopen {
        case_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Assign an emergency visit to a supervisor
    Dispatch(DispatchArgs),

    /// Users allowed to close and reopen cases
    Permissions,

    /// Let a user close and reopen cases
    Grant {
        user_id: i64,
    },

    /// Take the close/reopen permission away from a user
    Revoke {
        user_id: i64,
    },

    /// Case and visit tallies for a division
    Board {
        #[arg(long)]
        division: i64,
        /// Only cases in this state (e.g. "Cerrado")
        #[arg(long)]
        status: Option<CaseStatus>,
        /// Free-text search over store, assignee and numbers
        #[arg(long, default_value = "")]
        search: String,
        /// Only list overdue visits
        #[arg(long)]
        overdue: bool,
        /// Refresh at the polling interval until interrupted
        #[arg(long)]
        watch: bool,
    },
}

#[derive(clap::Args)]
struct DispatchArgs {
    /// Company code of the store
    #[arg(long)]
    company: String,
    /// Store code
    #[arg(long)]
    store: String,
    #[arg(long)]
    store_name: String,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    visit_type: i64,
    /// Store latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    /// Store longitude
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
    /// Supervisor's last known latitude
    #[arg(long, allow_hyphen_values = true, requires = "last_lng")]
    last_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "last_lat")]
    last_lng: Option<f64>,
    /// Supervisor user code
    #[arg(long)]
    assignee: String,
    #[arg(long)]
    assignee_name: String,
    #[arg(long = "case")]
    case_id: Option<String>,
    #[arg(long)]
    division: Option<i64>,
    #[arg(long)]
    comment: Option<String>,
    /// Schedule for 08:00 tomorrow instead of now
    #[arg(long)]
    tomorrow: bool,
}

impl DispatchArgs {
    fn into_visit(self, scheduled_at: DateTime<Utc>) -> NewVisit {
        let last_location = match (self.last_lat, self.last_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };
        NewVisit {
            company: self.company,
            store_code: self.store,
            store_name: self.store_name,
            store_address: self.address,
            visit_type_id: self.visit_type,
            last_location,
            destination: GeoPoint::new(self.lat, self.lng),
            comment: self.comment,
            scheduled_at,
            assignee_code: self.assignee,
            assignee_name: self.assignee_name,
            case_id: self.case_id,
            division: self.division,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not logged in. Run `casewatch login` first.")]
    NoSession,
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Api(e) if e.is_auth_failure() => 2,
            Self::NoSession => 2,
            _ => 1,
        }
    }
}

#[tokio::main]
async fn main() {
    casewatch::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}

async fn run(command: Commands) -> Result<(), CliError> {
    let store = FileSessionStore::default_location()?;
    let session = Arc::new(SessionContext::new(Box::new(store)));

    match command {
        Commands::Login {
            token,
            user,
            name,
            role,
            division,
        } => {
            let profile = UserProfile {
                user_code: user,
                name,
                role,
                division,
            };
            session.establish(token, profile)?;
            println!("Sesión iniciada");
            return Ok(());
        }
        Commands::Logout => {
            session.restore()?;
            session.clear();
            println!("Sesión cerrada");
            return Ok(());
        }
        _ => {}
    }

    if !session.restore()? {
        return Err(CliError::NoSession);
    }
    let config = ClientConfig::from_env()?;
    let client = Arc::new(ApiClient::new(&config, session)?);

    match command {
        Commands::Watch { visit_id } => watch_visit(client, visit_id, &config).await,
        Commands::Case { case_id } => show_case(&client, &case_id, config.display_offset).await,
        Commands::Close { case_id, reason } => {
            change_state(&client, &case_id, CaseAction::Close, &reason).await
        }
        Commands::Reopen { case_id, reason } => {
            change_state(&client, &case_id, CaseAction::Reopen, &reason).await
        }
        Commands::Dispatch(args) => dispatch(&client, args, config.display_offset).await,
        Commands::Permissions => show_permissions(&client, config.display_offset).await,
        Commands::Grant { user_id } => {
            let permission = client.grant_state_permission(user_id).await?;
            println!(
                "Permiso delegado al usuario {}",
                permission.user_id.unwrap_or(user_id)
            );
            Ok(())
        }
        Commands::Revoke { user_id } => {
            client.revoke_state_permission(user_id).await?;
            println!("Permiso quitado al usuario {user_id}");
            Ok(())
        }
        Commands::Board {
            division,
            status,
            search,
            overdue,
            watch,
        } => {
            let query = BoardQuery {
                division,
                status,
                search,
                overdue,
            };
            if !watch {
                return show_board(&client, &query, config.display_offset).await;
            }
            let mut ticker = tokio::time::interval(config.poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => show_board(&client, &query, config.display_offset).await?,
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                }
            }
        }
        Commands::Login { .. } | Commands::Logout => Ok(()),
    }
}

// ── watch ───────────────────────────────────────────────────

async fn watch_visit(client: Arc<ApiClient>, visit_id: i64, config: &ClientConfig) -> Result<(), CliError> {
    let on_eta: EtaCallback = Arc::new(|eta: String| println!("  ETA: {eta}"));
    let options = PollOptions {
        estimator: Some(Arc::new(StraightLineEstimator::default())),
        on_eta: Some(on_eta),
    };
    let source: Arc<dyn VisitSource> = client;
    let mut handle = poller::start(source, visit_id, PollPolicy::from(config), options);
    let mut updates = handle.subscribe();
    let mut printed_seq = 0;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.applied_seq > printed_seq {
                    printed_seq = state.applied_seq;
                    print_poll_state(&state, config.display_offset);
                }
                if state.stopped {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.stop();
                break;
            }
        }
    }

    let final_state = handle.join().await;
    match final_state.auth_failure {
        Some(failure) => Err(ApiError::Auth(failure).into()),
        None => Ok(()),
    }
}

fn print_poll_state(state: &PollState, offset: FixedOffset) {
    let Some(visit) = &state.snapshot else {
        return;
    };
    let banner = state.confirmation.map(|c| c.message()).unwrap_or_default();
    println!(
        "[{}] Visita {} · {} · {}",
        format_datetime(visit.updated_at, offset),
        visit.visit_id,
        visit.status,
        banner
    );
    if let Some(at) = state.last_location {
        println!("  Supervisor en {:.5}, {:.5}", at.latitude, at.longitude);
    }
}

// ── case ────────────────────────────────────────────────────

async fn show_case(client: &ApiClient, case_id: &str, offset: FixedOffset) -> Result<(), CliError> {
    let progress = load_case_progress(client, case_id).await?;
    print_progress(&progress, offset);

    let permission = client.fetch_state_permission().await?;
    let actions = CaseActions::for_case(progress.case.status, permission);
    let mut offered = Vec::new();
    if actions.can_close {
        offered.push("cerrar");
    }
    if actions.can_reopen {
        offered.push("reabrir");
    }
    if !offered.is_empty() {
        println!("\nAcciones: {}", offered.join(", "));
    }
    Ok(())
}

fn print_progress(progress: &CaseProgress, offset: FixedOffset) {
    let case = &progress.case;
    let number = case
        .correlative_number
        .map(|n| format!("#{n}"))
        .unwrap_or_else(|| case.case_id.clone());
    println!("Caso {number} · {}", case.status);
    if let Some(store) = &case.store_name {
        println!("Tienda: {store}");
    }

    println!();
    for view in &progress.stages.stages {
        let mark = if view.complete { "●" } else { "○" };
        println!("{mark} {:<14} {}", view.stage.label(), stage_timestamp(view, offset));
        if view.stage != Stage::CaseClosed {
            println!("{}", if view.connector_lit { "│" } else { "┊" });
        }
    }

    let reopen = &progress.reopen;
    if let Some(latest) = reopen.latest() {
        println!("\nReabierto: {}", latest.reason);
        if reopen.shows_history_badge() {
            println!("Historial ({} reaperturas):", reopen.count());
            for (n, event) in reopen.numbered() {
                println!("  {n}. {} · {}", format_long(event.reopened_at, offset), event.reason);
            }
        }
    }
}

// ── close / reopen ──────────────────────────────────────────

async fn change_state(
    client: &ApiClient,
    case_id: &str,
    action: CaseAction,
    reason: &str,
) -> Result<(), CliError> {
    let case = client.fetch_case(case_id).await?;
    let permission = client.fetch_state_permission().await?;
    CaseActions::for_case(case.status, permission).require(action)?;

    let updated = match action {
        CaseAction::Close => client.close_case(case_id, reason).await?,
        CaseAction::Reopen => client.reopen_case(case_id, reason).await?,
    };
    println!("Caso {} · {}", updated.case_id, updated.status);
    Ok(())
}

// ── dispatch ────────────────────────────────────────────────

async fn dispatch(client: &ApiClient, args: DispatchArgs, offset: FixedOffset) -> Result<(), CliError> {
    let now = Utc::now();
    let scheduled_at = if args.tomorrow {
        next_morning(now, offset).unwrap_or(now)
    } else {
        now
    };
    let created = client.create_visit(&args.into_visit(scheduled_at)).await?;
    println!(
        "Visita {} creada · {} · programada {}",
        created.visit_id,
        created.status,
        format_datetime(created.scheduled_at.or(Some(scheduled_at)), offset)
    );
    Ok(())
}

// ── permissions ─────────────────────────────────────────────

async fn show_permissions(client: &ApiClient, offset: FixedOffset) -> Result<(), CliError> {
    let grants = client.list_permission_grants().await?;
    if grants.is_empty() {
        println!("Ningún usuario tiene permiso delegado");
        return Ok(());
    }
    for grant in grants {
        println!(
            "{:>6}  {:<20}  {:<16}  {}",
            grant.user_id,
            grant.user_name.as_deref().unwrap_or(""),
            format_datetime(grant.granted_at, offset),
            grant.granted_by.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

// ── board ───────────────────────────────────────────────────

struct BoardQuery {
    division: i64,
    status: Option<CaseStatus>,
    search: String,
    overdue: bool,
}

async fn show_board(client: &ApiClient, query: &BoardQuery, offset: FixedOffset) -> Result<(), CliError> {
    let cases = client.list_cases_by_division(query.division).await?;
    let visits = client.list_visits().await?;
    let today = Utc::now().with_timezone(&offset).date_naive();

    let case_board = CaseBoard::from_cases(&cases);
    let visit_board = VisitBoard::from_rows(&visits, today, offset);
    println!(
        "Casos: {} (creados {}, en proceso {}, finalizados {}, cerrados {})",
        case_board.total(),
        case_board.created,
        case_board.in_process,
        case_board.finished,
        case_board.closed
    );
    println!(
        "Visitas: asignadas {}, confirmadas {}, en proceso {}, finalizadas {}, atrasadas {}",
        visit_board.assigned,
        visit_board.confirmed,
        visit_board.in_progress,
        visit_board.finished,
        visit_board.overdue
    );

    println!();
    for case in filter_cases(&cases, query.status, &query.search) {
        println!(
            "{:>8}  {:<11}  {}",
            case.correlative_number.map(|n| n.to_string()).unwrap_or_default(),
            case.status.as_str(),
            case.store_name.as_deref().unwrap_or("")
        );
    }

    let filter = if query.overdue {
        VisitFilter::Overdue
    } else {
        VisitFilter::All
    };
    println!();
    for row in filter_visits(&visits, filter, &query.search, today, offset) {
        println!(
            "{:>8}  {:<11}  {:<16}  {}",
            row.visit_id,
            row.status.as_str(),
            format_datetime(row.scheduled_at, offset),
            row.assignee_name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
