mod present;
mod prompt;
mod tui;

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use classroom_adapters::configuration;
use classroom_adapters::telemetry;
use classroom_adapters::{
    ClassroomClient, FileConfigRepository, FileTokenStore, GoogleOAuthProvider,
    LoopbackAuthorizer,
};
use classroom_core::config::Settings;
use classroom_core::entities::{Attachment, CourseRef, SubmissionUpdate};
use classroom_core::ports::ClassroomApi;
use classroom_core::use_cases::{
    active_courses, published_by_due_date, CredentialManager, GradeReport,
};
use classroom_core::{AuthError, Error};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use crate::present::{
    auth_status_line, course_subtitle, date_label, due_label, grade_label, headline,
    points_label, work_status,
};
use crate::prompt::TerminalPrompt;

type Credentials = CredentialManager<FileTokenStore, GoogleOAuthProvider>;
type Client = ClassroomClient<Credentials>;

#[derive(Parser)]
#[command(name = "gc-cli", author, version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Defaults to the interactive UI
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Remote(RemoteCommand),

    // --- Configuration commands ---
    /// Inspect or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

/// Commands that need an OAuth client registration
#[derive(Subcommand)]
enum RemoteCommand {
    // --- Authentication commands ---
    /// Manage the saved Google credential
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Shortcut for `auth login`
    Login {
        /// Print the URL instead of opening a browser
        #[arg(long, default_value = "false")]
        no_browser: bool,
    },

    // --- Classroom commands ---
    /// List your classes
    Courses {
        /// Include archived and provisioned classes
        #[arg(long, default_value = "false")]
        all: bool,

        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Show one class
    Course {
        id: String,

        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// List published classwork, earliest due first
    Coursework {
        /// Class id (defaults to classroom.course_id)
        #[arg(short, long)]
        course: Option<String>,

        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Show one piece of classwork
    Work {
        #[arg(short, long)]
        course: Option<String>,

        id: String,
    },
    /// List submissions for a piece of classwork
    Submissions {
        #[arg(short, long)]
        course: Option<String>,

        /// Classwork id
        #[arg(short, long)]
        assignment: String,
    },
    /// Show your grades in a class
    Grades {
        #[arg(short, long)]
        course: Option<String>,

        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// List announcements in a class
    Announcements {
        #[arg(short, long)]
        course: Option<String>,

        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Show one announcement in full
    Announcement {
        #[arg(short, long)]
        course: Option<String>,

        id: String,
    },
    /// Attach links or Drive files to your submission
    Submit {
        #[arg(short, long)]
        course: Option<String>,

        /// Classwork id
        #[arg(short, long)]
        assignment: String,

        /// URL to attach (repeatable)
        #[arg(long)]
        link: Vec<String>,

        /// Title shown for the attached links
        #[arg(long)]
        title: Option<String>,

        /// Drive file id to attach (repeatable)
        #[arg(long)]
        drive_file: Vec<String>,
    },

    /// Open the interactive UI
    Tui,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Authorize gc-cli with your Google account
    Login {
        /// Print the URL instead of opening a browser
        #[arg(long, default_value = "false")]
        no_browser: bool,
    },
    /// Show whether a usable credential is saved
    Status,
    /// Delete the saved credential
    Logout,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Save the class used when --course is omitted
    SetCourse { id: String },
    /// Forget the saved class
    ClearCourse,
}

/// Everything a command needs, built once from the settings.
struct App {
    settings: Settings,
    credentials: Arc<Credentials>,
    provider: Arc<GoogleOAuthProvider>,
    client: Arc<Client>,
    cancel: CancellationToken,
}

impl App {
    fn build(settings: Settings, cancel: CancellationToken) -> anyhow::Result<Self> {
        let token_path = settings
            .auth
            .token_file
            .clone()
            .unwrap_or_else(configuration::default_token_path);
        let store = Arc::new(FileTokenStore::new(token_path));
        let provider = Arc::new(GoogleOAuthProvider::new(&settings.auth)?);
        let credentials = Arc::new(CredentialManager::new(store, provider.clone()));
        let client = Arc::new(
            ClassroomClient::new(&settings.api, credentials.clone())?
                .with_cancellation(cancel.clone()),
        );

        Ok(Self {
            settings,
            credentials,
            provider,
            client,
            cancel,
        })
    }

    fn course_id(&self, flag: &Option<String>) -> anyhow::Result<String> {
        flag.clone()
            .or_else(|| self.settings.classroom.course_id.clone())
            .ok_or_else(|| {
                anyhow!("No class given. Pass --course <id> or run 'gc-cli config set-course <id>'.")
            })
    }

    async fn login(&self, no_browser: bool) -> anyhow::Result<()> {
        let authorizer = LoopbackAuthorizer::new(
            self.provider.clone(),
            Arc::new(TerminalPrompt),
            self.settings.auth.callback_timeout(),
        )
        .with_cancellation(self.cancel.clone())
        .open_browser(!no_browser);

        println!("Waiting for authorization in your browser (Ctrl-C to cancel)...");
        let credential = self.credentials.authorize(&authorizer).await?;
        println!("Login successful!");
        println!(
            "- Access token valid until {}",
            credential.expiry.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if !credential.can_refresh() {
            println!("- No refresh token was issued; you will need to log in again after expiry.");
        }
        Ok(())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn with_spinner<T>(message: &str, work: impl Future<Output = T>) -> T {
    let pb = spinner(message);
    let out = work.await;
    pb.finish_and_clear();
    out
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn console_level(command: &Option<Commands>, verbose: bool) -> Option<LevelFilter> {
    match command {
        None | Some(Commands::Remote(RemoteCommand::Tui)) => None,
        _ if verbose => Some(LevelFilter::INFO),
        _ => Some(LevelFilter::WARN),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match configuration::get_configuration() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(anyhow!("configuration loading failed"));
        }
    };

    let _guard = telemetry::init_subscriber(
        "gc-cli",
        &settings.log_level,
        console_level(&cli.command, cli.verbose),
    )?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let Err(e) = run(cli.command, settings, cancel).await else {
        return Ok(ExitCode::SUCCESS);
    };

    error!(error = %e, "command failed");
    match e.downcast_ref::<Error>() {
        Some(err) if err.requires_reauthentication() => {
            eprintln!("Error: {}", err);
            eprintln!("Please authenticate first using 'gc-cli auth login'");
            Ok(ExitCode::FAILURE)
        }
        Some(Error::Cancelled) | Some(Error::Auth(AuthError::UserCancelled)) => {
            eprintln!("Cancelled.");
            Ok(ExitCode::from(130))
        }
        _ => Err(e),
    }
}

async fn run(
    command: Option<Commands>,
    settings: Settings,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let command = match command {
        // Config commands work without an OAuth client registration
        Some(Commands::Config { action }) => return config_command(&action, &settings).await,
        Some(Commands::Remote(command)) => command,
        None => RemoteCommand::Tui,
    };

    let app = App::build(settings, cancel)?;

    match command {
        // --- Authentication commands ---
        RemoteCommand::Auth { action } => match action {
            AuthCommand::Login { no_browser } => app.login(no_browser).await?,
            AuthCommand::Status => {
                let status = app.credentials.status().await?;
                println!("{}", auth_status_line(&status));
            }
            AuthCommand::Logout => {
                app.credentials.logout().await?;
                println!("Logged out. Saved credential removed.");
            }
        },
        RemoteCommand::Login { no_browser } => app.login(no_browser).await?,

        // --- Classroom commands ---
        RemoteCommand::Courses { all, json } => {
            let courses = with_spinner("Fetching classes...", app.client.list_courses()).await?;
            let courses = if all {
                courses
            } else {
                active_courses(courses)
            };

            if json {
                return print_json(&courses);
            }
            if courses.is_empty() {
                println!("No classes found.");
            }
            for course in &courses {
                let subtitle = course_subtitle(course);
                if subtitle.is_empty() {
                    println!("{}  {}", course.id, course.name);
                } else {
                    println!("{}  {} ({})", course.id, course.name, subtitle);
                }
            }
        }
        RemoteCommand::Course { id, json } => {
            let course = with_spinner("Fetching class...", app.client.get_course(&id)).await?;
            if json {
                return print_json(&course);
            }
            println!("{}", course.name);
            println!("- Id: {}", course.id);
            let subtitle = course_subtitle(&course);
            if !subtitle.is_empty() {
                println!("- Section: {}", subtitle);
            }
            if let Some(state) = &course.course_state {
                println!("- State: {}", state);
            }
            if let Some(link) = &course.alternate_link {
                println!("- Link: {}", link);
            }
        }
        RemoteCommand::Coursework { course, json } => {
            let course_id = app.course_id(&course)?;
            let work = with_spinner(
                "Fetching classwork...",
                app.client.list_course_work(&course_id),
            )
            .await?;
            let work = published_by_due_date(work);

            if json {
                return print_json(&work);
            }
            if work.is_empty() {
                println!("No classwork found.");
            }
            let now = Utc::now();
            for item in &work {
                println!(
                    "{}  {}  [{}] due {} ({})",
                    item.id,
                    item.title,
                    work_status(item, now),
                    due_label(item),
                    points_label(item.max_points)
                );
            }
        }
        RemoteCommand::Work { course, id } => {
            let course_id = app.course_id(&course)?;
            let work = with_spinner(
                "Fetching classwork...",
                app.client.get_course_work(&course_id, &id),
            )
            .await?;

            println!("{}", work.title);
            println!("- Due: {}", due_label(&work));
            println!("- Status: {}", work_status(&work, Utc::now()));
            println!("- Points: {}", points_label(work.max_points));
            if let Some(link) = &work.alternate_link {
                println!("- Link: {}", link);
            }
            if let Some(description) = &work.description {
                println!("\n{}", description);
            }
        }
        RemoteCommand::Submissions { course, assignment } => {
            let course_id = app.course_id(&course)?;
            let submissions = with_spinner(
                "Fetching submissions...",
                app.client.list_submissions(&course_id, &assignment),
            )
            .await?;

            if submissions.is_empty() {
                println!("No submissions found.");
            }
            for submission in &submissions {
                let grade = submission
                    .effective_grade()
                    .map(present::points)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  grade {}{}  updated {}",
                    submission.id,
                    submission.state.as_deref().unwrap_or("UNKNOWN"),
                    grade,
                    if submission.late { "  (late)" } else { "" },
                    date_label(submission.update_time)
                );
            }
        }
        RemoteCommand::Grades { course, json } => {
            let course_id = app.course_id(&course)?;
            let report = GradeReport::new(app.client.clone());
            let grades = with_spinner("Fetching grades...", report.execute(&course_id)).await?;

            if json {
                return print_json(&grades);
            }
            if grades.is_empty() {
                println!("No graded work yet.");
            }
            for entry in &grades {
                println!(
                    "{}  {}  [{}]",
                    entry.assignment,
                    grade_label(entry),
                    entry.feedback
                );
            }
        }
        RemoteCommand::Announcements { course, json } => {
            let course_id = app.course_id(&course)?;
            let posts = with_spinner(
                "Fetching announcements...",
                app.client.list_announcements(&course_id),
            )
            .await?;

            if json {
                return print_json(&posts);
            }
            if posts.is_empty() {
                println!("No announcements.");
            }
            for post in &posts {
                println!(
                    "{}  {}  {}",
                    post.id,
                    date_label(post.creation_time),
                    headline(&post.text, 70)
                );
            }
        }
        RemoteCommand::Announcement { course, id } => {
            let course_id = app.course_id(&course)?;
            let post = with_spinner(
                "Fetching announcement...",
                app.client.get_announcement(&course_id, &id),
            )
            .await?;

            println!("Posted {}", date_label(post.creation_time));
            if let Some(link) = &post.alternate_link {
                println!("{}", link);
            }
            println!("\n{}", post.text);
        }
        RemoteCommand::Submit {
            course,
            assignment,
            link,
            title,
            drive_file,
        } => {
            let course_id = app.course_id(&course)?;
            let attachments: Vec<Attachment> = link
                .into_iter()
                .map(|url| Attachment::link(url, title.clone()))
                .chain(drive_file.into_iter().map(Attachment::drive_file))
                .collect();
            if attachments.is_empty() {
                return Err(anyhow!("Nothing to attach. Pass --link or --drive-file."));
            }

            let count = attachments.len();
            let submitted = with_spinner("Submitting...", async {
                let mine = app.client.get_my_submission(&course_id, &assignment).await?;
                app.client
                    .patch_submission(
                        &course_id,
                        &assignment,
                        &mine.id,
                        &SubmissionUpdate::with_attachments(attachments),
                    )
                    .await
            })
            .await?;

            info!(submission_id = %submitted.id, count, "attachments submitted");
            println!(
                "Attached {} item(s) to submission {} ({}).",
                count,
                submitted.id,
                submitted.state.as_deref().unwrap_or("UNKNOWN")
            );
        }

        RemoteCommand::Tui => {
            let authenticated = app.credentials.status().await?.is_usable();
            let course = match app.settings.classroom.course_id.clone() {
                Some(id) if authenticated => match app.client.get_course(&id).await {
                    Ok(course) => Some(CourseRef::from(&course)),
                    Err(e) => {
                        info!(error = %e, course_id = %id, "configured class unavailable");
                        None
                    }
                },
                _ => None,
            };
            let api: Arc<dyn ClassroomApi> = app.client.clone();
            tui::run(api, authenticated, course).await?;
        }
    }

    Ok(())
}

async fn config_command(action: &ConfigCommand, effective: &Settings) -> anyhow::Result<()> {
    let repo = FileConfigRepository::new(configuration::config_dir());

    match action {
        ConfigCommand::Show => {
            let mut shown = effective.clone();
            if shown.auth.client_secret.is_some() {
                shown.auth.client_secret = Some("<redacted>".to_string());
            }
            let token_file = shown
                .auth
                .token_file
                .get_or_insert_with(configuration::default_token_path)
                .display()
                .to_string();

            println!("Config file: {}", repo.config_path().display());
            println!("Credential:  {}", token_file);
            print_json(&shown)?;
        }
        ConfigCommand::SetCourse { id } => {
            repo.set_default_course(Some(id.clone()))
                .await
                .with_context(|| format!("saving {}", repo.config_path().display()))?;
            println!("Default class set to {}", id);
        }
        ConfigCommand::ClearCourse => {
            repo.set_default_course(None)
                .await
                .with_context(|| format!("saving {}", repo.config_path().display()))?;
            println!("Default class cleared");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_commands_are_separate_from_remote_ones() {
        let cli = Cli::try_parse_from(["gc-cli", "config", "set-course", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommand::SetCourse { ref id }
            }) if id == "42"
        ));

        let cli = Cli::try_parse_from(["gc-cli", "courses", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Remote(RemoteCommand::Courses { all: true, .. }))
        ));
    }

    #[test]
    fn test_console_level() {
        let tui = Cli::try_parse_from(["gc-cli", "tui"]).unwrap();
        assert_eq!(console_level(&tui.command, true), None);
        assert_eq!(console_level(&None, false), None);

        let status = Cli::try_parse_from(["gc-cli", "auth", "status"]).unwrap();
        assert_eq!(console_level(&status.command, false), Some(LevelFilter::WARN));
        assert_eq!(console_level(&status.command, true), Some(LevelFilter::INFO));
    }
}
