use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use apolomics::api::{
    ApiClient, AuthSession, Certificate, ExamAnswer, Id, SubmissionFile, TokenStore,
};
use apolomics::progression::{CourseProgression, ExamView, PollHandle, ProgressionError, SyncLayer};
use apolomics::{Config, Session};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "apolomics")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store credentials for the API
    Login {
        /// API token issued by the server
        #[arg(long)]
        token: String,
        /// Your user id
        #[arg(long)]
        user_id: Id,
        #[arg(long)]
        username: Option<String>,
    },
    /// Forget stored credentials
    Logout,
    /// Show where you stand in a course
    Status { course: Id },
    /// Report playback progress for a lecture
    Watch {
        course: Id,
        lecture: Id,
        /// Percentage of the video viewed
        #[arg(short, long)]
        percent: f64,
        /// Mark the lecture as finished regardless of percentage
        #[arg(long)]
        watched: bool,
    },
    /// Submit or resubmit the course assignment
    SubmitAssignment {
        course: Id,
        #[arg(short, long)]
        text: String,
        /// File to attach
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show the exam, or submit answers from a JSON file
    Exam {
        course: Id,
        /// JSON array of {"question_id", "selected_choice_id" | "answer_text"}
        #[arg(short, long)]
        answers: Option<PathBuf>,
    },
    /// Show the course certificate
    Certificate {
        course: Id,
        /// Keep checking until the certificate is issued
        #[arg(long)]
        wait: bool,
    },
    /// Wait for the instructor to review your assignment
    AwaitReview { course: Id },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apolomics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Login { token, user_id, username } => login(&token, user_id, username),
        Commands::Logout => logout(),
        Commands::Status { course } => {
            let progression = open_course(&config, course).await?;
            print_status(&progression);
            Ok(())
        }
        Commands::Watch { course, lecture, percent, watched } => {
            let mut progression = open_course(&config, course).await?;
            watch(&mut progression, lecture, percent, watched).await
        }
        Commands::SubmitAssignment { course, text, file } => {
            let mut progression = open_course(&config, course).await?;
            submit_assignment(&mut progression, text, file).await
        }
        Commands::Exam { course, answers } => {
            let mut progression = open_course(&config, course).await?;
            exam(&mut progression, answers).await
        }
        Commands::Certificate { course, wait } => {
            let mut progression = open_course(&config, course).await?;
            certificate(&mut progression, wait).await
        }
        Commands::AwaitReview { course } => {
            let mut progression = open_course(&config, course).await?;
            await_review(&mut progression).await
        }
    }
}

/// Wrap an engine error so the student-facing message is shown first
fn engine_error(err: ProgressionError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn login(token: &str, user_id: Id, username: Option<String>) -> Result<()> {
    TokenStore::set_token(token).context("Failed to store token in keyring")?;
    let session = Session { user_id: Some(user_id), username, current_course_id: None };
    session.save()?;
    println!("Signed in as user {} (token {})", user_id, TokenStore::mask_token(token));
    Ok(())
}

fn logout() -> Result<()> {
    TokenStore::delete_token().context("Failed to remove token from keyring")?;
    let mut session = Session::load()?;
    session.clear();
    session.save()?;
    println!("Signed out");
    Ok(())
}

async fn open_course(config: &Config, course: Id) -> Result<CourseProgression> {
    let mut session = Session::load()?;
    let user = session.identity().context("Not signed in. Run `apolomics login` first")?;
    let token = TokenStore::get_token().context("No stored token. Run `apolomics login` first")?;

    let auth = AuthSession::new(user.clone(), Some(token))
        .with_scheme(config.auth_scheme.as_str())
        .on_unauthorized(|e| tracing::warn!("Server rejected the session: {}", e));
    let client = ApiClient::new(config.api_base_url.as_str(), auth, config.request_timeout())?;
    let sync = SyncLayer::new(Arc::new(client), user.id);

    let progression = CourseProgression::load(sync, course, config.progression_settings())
        .await
        .map_err(engine_error)?;

    if session.current_course_id != Some(course) {
        session.current_course_id = Some(course);
        session.save()?;
    }
    Ok(progression)
}

fn print_status(progression: &CourseProgression) {
    let state = progression.state();
    let summary = progression.summary();

    println!("Course {} - current step: {}", progression.course_id(), state.stage);
    println!(
        "Videos: {}/{} watched ({:.0}%)",
        summary.watched, summary.total, summary.percent_complete
    );
    for (index, (lecture, lecture_state)) in
        progression.lectures().iter().zip(&state.lecture_states).enumerate()
    {
        let marker = if state.current_lecture_index == Some(index) { ">" } else { " " };
        println!(
            "{} {:>3}. {:<40} {:<12} [id {}]",
            marker,
            lecture.order,
            lecture.title,
            lecture_state.label(),
            lecture.id
        );
    }
    println!("Assignment: {:?}", state.assignment_stage);
    println!("Exam: {:?}", state.exam_stage);
    println!("Certificate: {:?}", state.certificate_stage);
}

async fn watch(
    progression: &mut CourseProgression,
    lecture: Id,
    percent: f64,
    watched: bool,
) -> Result<()> {
    let record = match progression.record_progress(lecture, percent, watched).await {
        Ok(record) => record,
        Err(ProgressionError::ProgressNotSynced { record, source }) => {
            tracing::warn!("Progress not synced: {}", source);
            eprintln!("Saved locally only; it will be sent with your next progress update.");
            record
        }
        Err(e) => return Err(engine_error(e)),
    };

    println!(
        "Lecture {}: {:.0}%{}",
        lecture,
        record.progress_percent,
        if record.watched { " (watched)" } else { "" }
    );

    if record.watched {
        let position = progression.lectures().iter().position(|l| l.id == lecture);
        if let Some(next) = position.and_then(|i| progression.lectures().get(i + 1)) {
            println!("Next up: {} [id {}]", next.title, next.id);
        } else {
            println!("All lectures done. Current step: {}", progression.pipeline().stage);
        }
    }
    Ok(())
}

async fn submit_assignment(
    progression: &mut CourseProgression,
    text: String,
    file: Option<PathBuf>,
) -> Result<()> {
    let file = match file {
        Some(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("submission")
                .to_string();
            Some(SubmissionFile { file_name, bytes })
        }
        None => None,
    };

    let submission = progression.submit_assignment(text, file).await.map_err(engine_error)?;
    println!("Submission {} is {}", submission.id, submission.status.label());
    println!("Run `apolomics await-review {}` to wait for the verdict", progression.course_id());
    Ok(())
}

async fn exam(progression: &mut CourseProgression, answers: Option<PathBuf>) -> Result<()> {
    match progression.exam_view() {
        ExamView::Locked { stage } => println!("The exam is locked. Current step: {}", stage),
        ExamView::Unavailable => println!("This course does not have an exam yet"),
        ExamView::Result { score, passed } => print_exam_result(score, passed),
        ExamView::Form(exam) => {
            let Some(path) = answers else {
                println!(
                    "{} ({} minutes, pass mark {}%)",
                    exam.title, exam.duration_minutes, exam.passing_score
                );
                println!("You have a single attempt.");
                for question in &exam.questions {
                    println!(
                        "[{}] {} ({:?}, {} pts)",
                        question.id, question.text, question.kind, question.score
                    );
                    for choice in &question.choices {
                        println!("      ({}) {}", choice.id, choice.choice_text);
                    }
                }
                return Ok(());
            };

            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let answers: Vec<ExamAnswer> =
                serde_json::from_str(&contents).with_context(|| "Failed to parse answers file")?;

            let result = progression.submit_exam(answers).await.map_err(engine_error)?;
            print_exam_result(Some(result.score), result.passed);
            match progression.certificate() {
                Some(certificate) => print_certificate(certificate),
                None if result.passed => println!("Your certificate is being prepared"),
                None => {}
            }
        }
    }
    Ok(())
}

fn print_exam_result(score: Option<f64>, passed: bool) {
    let score = score.map_or_else(|| "pending".to_string(), |s| format!("{:.1}%", s));
    println!("Exam score: {} - {}", score, if passed { "passed" } else { "not passed" });
}

fn print_certificate(certificate: &Certificate) {
    println!(
        "Certificate {} issued {}",
        certificate.certificate_id,
        certificate.issued_at.format("%Y-%m-%d")
    );
    if let Some(url) = &certificate.download_url {
        println!("Download: {}", url);
    }
}

async fn certificate(progression: &mut CourseProgression, wait: bool) -> Result<()> {
    if let Some(certificate) = progression.refresh_certificate().await.map_err(engine_error)? {
        print_certificate(certificate);
        return Ok(());
    }

    let handle = match progression.watch_certificate() {
        Some(handle) if wait => handle,
        _ => {
            println!("No certificate yet. Current step: {}", progression.pipeline().stage);
            return Ok(());
        }
    };

    println!("Waiting for the certificate (Ctrl-C to stop)...");
    follow(handle, |certificate| progression.apply_certificate(certificate)).await?;
    if let Some(certificate) = progression.certificate() {
        print_certificate(certificate);
    }
    Ok(())
}

async fn await_review(progression: &mut CourseProgression) -> Result<()> {
    let Some(handle) = progression.watch_review() else {
        println!("Assignment is {}", progression.assignment().status().label());
        return Ok(());
    };

    println!("Waiting for the review (Ctrl-C to stop)...");
    follow(handle, |status| progression.apply_assignment_status(status)).await?;

    let assignment = progression.assignment();
    println!("Assignment is {}", assignment.status().label());
    if let Some(feedback) = assignment.submission.as_ref().and_then(|s| s.feedback.as_deref()) {
        println!("Feedback: {}", feedback);
    }
    Ok(())
}

/// Feed poll results into `apply` until polling ends or Ctrl-C is pressed
async fn follow<T>(mut handle: PollHandle<T>, mut apply: impl FnMut(T)) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = handle.next() => match update {
                Some(Ok(value)) => apply(value),
                Some(Err(e)) if e.requires_reauth() => {
                    let message = "Session expired. Run `apolomics login` again";
                    return Err(anyhow::Error::new(e).context(message));
                }
                Some(Err(e)) => tracing::warn!("Status check failed, will retry: {}", e),
                None => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("Stopped waiting");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
